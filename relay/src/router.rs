//! Host name routing for the relay

use std::collections::HashMap;

use crate::config::RelayConfig;

/// Router for mapping SNI host names to backends
pub struct HostRouter {
    exact: HashMap<String, String>,
    /// `.suffix` -> backend, longest suffix first
    wildcards: Vec<(String, String)>,
    default: Option<String>,
}

impl HostRouter {
    pub fn new(default: Option<String>) -> Self {
        Self {
            exact: HashMap::new(),
            wildcards: Vec::new(),
            default,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        let mut router = Self::new(config.default_backend.clone());
        for route in &config.routes {
            router.add_route(&route.host, route.backend.clone());
        }
        router
    }

    /// Add a route. `*.example.com` matches any name below example.com.
    pub fn add_route(&mut self, host: &str, backend: String) {
        let host = normalize(host);
        if let Some(suffix) = host.strip_prefix("*.") {
            self.wildcards.push((format!(".{suffix}"), backend));
            self.wildcards.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            return;
        }
        self.exact.insert(host, backend);
    }

    /// Backend for `hostname`: exact route, then the longest wildcard, then
    /// the default backend.
    pub fn resolve(&self, hostname: &str) -> Option<&str> {
        let host = normalize(hostname);
        if let Some(backend) = self.exact.get(&host) {
            return Some(backend.as_str());
        }
        self.wildcards
            .iter()
            .find(|(suffix, _)| host.len() > suffix.len() && host.ends_with(suffix.as_str()))
            .map(|(_, backend)| backend.as_str())
            .or(self.default.as_deref())
    }

    pub fn default_backend(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

fn normalize(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}
