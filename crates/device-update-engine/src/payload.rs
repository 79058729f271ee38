use device_rpc::RpcRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A rendered update, consumed once by [`crate::UpdateEngine::submit`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    /// Native configuration script.
    pub script: String,
    /// Device calls to make before the script is uploaded.
    #[serde(default)]
    pub pre_script_calls: Vec<RpcRequest>,
    /// Files the script reads, which must be on the device whitelist.
    #[serde(default)]
    pub whitelist_files: Vec<String>,
}

impl UpdatePayload {
    pub fn line_count(&self) -> usize {
        self.script.lines().count()
    }
}

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub dry_run: bool,
    pub line_count: usize,
    /// The diff, reported for dry runs at debug log level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_from_json() {
        let payload: UpdatePayload = serde_json::from_value(json!({
            "script": "cli script __appsvcs_update {\n}\n",
            "preScriptCalls": [{"path": "/mgmt/shared/file-transfer/uploads/a.xml", "method": "POST"}],
            "whitelistFiles": ["/var/config/rest/downloads/a.xml"]
        }))
        .unwrap();
        assert_eq!(payload.line_count(), 2);
        assert_eq!(payload.pre_script_calls.len(), 1);
    }

    #[test]
    fn outcome_omits_changes() {
        let outcome = UpdateOutcome {
            dry_run: true,
            line_count: 3,
            changes: None,
        };
        assert_eq!(serde_json::to_value(outcome).unwrap(), json!({"dryRun": true, "lineCount": 3}));
    }
}
