//! Coordinator configuration.

use std::time::Duration;

/// Coordinator configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Interface to bind both listeners on
    pub hostname: String,
    /// Port for the worker stream protocol
    pub stream_port: u16,
    /// Port for the client REST API
    pub http_port: u16,
    /// How often the dispatch loop tries to assign a pending job
    pub dispatch_interval: Duration,
    /// How often the timeout loop scans for silent nodes
    pub timeout_check_interval: Duration,
    /// Heartbeat age after which a node is considered gone
    pub node_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            stream_port: 8080,
            http_port: 8081,
            dispatch_interval: Duration::from_secs(1),
            timeout_check_interval: Duration::from_secs(1),
            node_timeout: Duration::from_secs(15),
        }
    }
}

impl CoordinatorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hostname: std::env::var("SERVER_HOSTNAME").unwrap_or(defaults.hostname),
            stream_port: std::env::var("SERVER_PORT_STREAM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stream_port),
            http_port: std::env::var("SERVER_PORT_HTTP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.http_port),
            dispatch_interval: Duration::from_millis(
                std::env::var("DISPATCH_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            timeout_check_interval: Duration::from_millis(
                std::env::var("TIMEOUT_CHECK_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            node_timeout: Duration::from_secs(
                std::env::var("NODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
        }
    }

    pub fn stream_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.stream_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.stream_addr(), "localhost:8080");
        assert_eq!(config.http_addr(), "localhost:8081");
        assert_eq!(config.node_timeout, Duration::from_secs(15));
        assert_eq!(config.dispatch_interval, Duration::from_secs(1));
    }
}
