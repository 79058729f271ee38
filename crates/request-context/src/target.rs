//! Resolved facts about the target device.

use serde::{Deserialize, Serialize};

/// Device class of the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    #[serde(rename = "BIG-IP")]
    BigIp,
    #[serde(rename = "BIG-IQ")]
    BigIq,
    #[serde(rename = "Container")]
    Container,
}

impl DeviceType {
    /// Parse a product name as reported by the device.
    pub fn from_product(product: &str) -> Self {
        match product.to_ascii_uppercase().as_str() {
            "BIG-IQ" => DeviceType::BigIq,
            "CONTAINER" => DeviceType::Container,
            _ => DeviceType::BigIp,
        }
    }
}

/// One provisionable module and its level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedModule {
    pub name: String,
    pub level: String,
}

/// Target device facts resolved at the start of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetContext {
    pub host: String,
    pub port: u16,
    pub device_type: DeviceType,
    pub provisioned_modules: Vec<ProvisionedModule>,
    /// Device software version, e.g. `15.1.0`.
    pub tmos_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for TargetContext {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8100,
            device_type: DeviceType::BigIp,
            provisioned_modules: Vec::new(),
            tmos_version: "0.0.0".to_string(),
            token: None,
        }
    }
}

impl TargetContext {
    /// Whether the target is a BIG-IQ-class device.
    pub fn is_big_iq(&self) -> bool {
        self.device_type == DeviceType::BigIq
    }

    /// Whether the request addresses the device this process runs on.
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// Whether `module` is provisioned at any level other than `none`.
    pub fn is_provisioned(&self, module: &str) -> bool {
        self.provisioned_modules
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case(module) && !m.level.eq_ignore_ascii_case("none"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_with(modules: &[(&str, &str)]) -> TargetContext {
        TargetContext {
            provisioned_modules: modules
                .iter()
                .map(|(name, level)| ProvisionedModule {
                    name: name.to_string(),
                    level: level.to_string(),
                })
                .collect(),
            ..TargetContext::default()
        }
    }

    #[test]
    fn provisioned_ignores_level_none() {
        let target = target_with(&[("ltm", "nominal"), ("asm", "none")]);
        assert!(target.is_provisioned("ltm"));
        assert!(target.is_provisioned("LTM"));
        assert!(!target.is_provisioned("asm"));
        assert!(!target.is_provisioned("apm"));
    }

    #[test]
    fn default_target_is_local_big_ip() {
        let target = TargetContext::default();
        assert!(target.is_local());
        assert!(!target.is_big_iq());
    }

    #[test]
    fn device_type_serde_names() {
        assert_eq!(serde_json::to_string(&DeviceType::BigIq).unwrap(), "\"BIG-IQ\"");
        assert_eq!(DeviceType::from_product("big-iq"), DeviceType::BigIq);
        assert_eq!(DeviceType::from_product("BIG-IP"), DeviceType::BigIp);
    }
}
