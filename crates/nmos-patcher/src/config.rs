//! Patcher configuration.
//!
//! Values come from an optional TOML file; command-line flags override them.
//!
//! ```toml
//! settle_delay_ms = 1500
//! request_timeout_ms = 5000
//! node_port = 80
//! connection_port = 8080
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::negotiate::DEFAULT_SETTLE_DELAY;

pub const DEFAULT_HTTP_PORT: u16 = 80;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatcherConfigInput {
    pub settle_delay_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    /// IS-04 node API port on the receiver, when it differs from the receiver address.
    pub node_port: Option<u16>,
    /// IS-05 connection API port on the receiver.
    pub connection_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatcherConfig {
    pub settle_delay: Duration,
    pub request_timeout: Option<Duration>,
    pub node_port: Option<u16>,
    pub connection_port: Option<u16>,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            request_timeout: None,
            node_port: None,
            connection_port: None,
        }
    }
}

impl PatcherConfigInput {
    pub fn resolve(self) -> Result<PatcherConfig, String> {
        let request_timeout = match self.request_timeout_ms {
            Some(0) => return Err("request_timeout_ms must be greater than zero".into()),
            other => other.map(Duration::from_millis),
        };
        if self.node_port == Some(0) || self.connection_port == Some(0) {
            return Err("ports must be non-zero".into());
        }

        Ok(PatcherConfig {
            settle_delay: self
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SETTLE_DELAY),
            request_timeout,
            node_port: self.node_port,
            connection_port: self.connection_port,
        })
    }
}

impl PatcherConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, String> {
        if input.trim().is_empty() {
            return Ok(PatcherConfig::default());
        }
        let parsed: PatcherConfigInput =
            toml::from_str(input).map_err(|e| format!("Invalid config TOML: {}", e))?;
        parsed.resolve()
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
        Self::from_toml_str(&text)
    }
}

// ── Endpoints ───────────────────────────────────────────────────────

/// `host[:port]` as given on the command line; the port defaults to 80.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    /// `http://host:port` with `port` overriding the parsed one when given.
    pub fn root_url(&self, port: Option<u16>) -> String {
        format!("http://{}:{}", self.host, port.unwrap_or(self.port))
    }
}

impl FromStr for HostPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = match s.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| format!("invalid port in {s:?}: {e}"))?;
                (host, port)
            }
            None => (s, DEFAULT_HTTP_PORT),
        };
        if host.is_empty() {
            return Err(format!("missing host in {s:?}"));
        }
        Ok(HostPort {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
