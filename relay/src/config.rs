//! Configuration file parser for the relay
//!
//! Loads snipeek.yml: listen address, timeouts, extraction settings and the
//! host name routes.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use snipeek::ExtractConfig;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address to accept TLS connections on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// How long a client may take to send its ClientHello
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,

    /// How long to wait for a backend connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Backend for unmatched names and for connections without a usable SNI
    pub default_backend: Option<String>,

    /// ClientHello parsing settings
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Host name routes
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Single route definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Exact host name, or `*.example.com` for any subdomain
    pub host: String,

    /// Backend address as host:port
    pub backend: String,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 443))
}

fn default_handshake_timeout() -> u64 {
    10_000
}

fn default_connect_timeout() -> u64 {
    5_000
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: RelayConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.routes.is_empty() && self.default_backend.is_none() {
            anyhow::bail!("No routes or default backend defined in configuration");
        }

        if let Some(backend) = &self.default_backend {
            if backend.is_empty() {
                anyhow::bail!("Default backend cannot be empty");
            }
        }

        for route in &self.routes {
            if route.host.is_empty() || route.host == "*." {
                anyhow::bail!("Route host cannot be empty");
            }
            if route.backend.is_empty() {
                anyhow::bail!("Backend cannot be empty for route '{}'", route.host);
            }
        }

        Ok(())
    }
}
