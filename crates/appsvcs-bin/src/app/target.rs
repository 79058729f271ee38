//! `host[:port]` command-line targets.

use std::fmt;
use std::str::FromStr;

/// Management port used when the target names none.
pub const DEFAULT_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub host: String,
    pub port: u16,
}

impl FromStr for DeviceTarget {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("target must not be empty".to_string());
        }

        // [v6-address]:port or bare [v6-address]
        if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("unterminated IPv6 address in {raw}"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(format!("unexpected text after address in {raw}")),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match raw.split_once(':') {
            // A second colon means an unbracketed IPv6 address without port.
            Some((_, rest)) if rest.contains(':') => Ok(Self {
                host: raw.to_string(),
                port: DEFAULT_PORT,
            }),
            Some((host, port)) => Ok(Self {
                host: host.to_string(),
                port: parse_port(port)?,
            }),
            None => Ok(Self {
                host: raw.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    raw.parse()
        .map_err(|_| format!("invalid port {raw:?}"))
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
