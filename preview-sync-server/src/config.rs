//! Server configuration module
//!
//! Only the HTTP side lives here; the synchronizer reads its own variables.

use std::net::SocketAddr;

/// What a successful sync request answers with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// `200` with the JSON summary report
    #[default]
    Summary,
    /// `204 No Content`
    Empty,
}

impl ResponseMode {
    /// Parse `SYNC_RESPONSE`; unknown values fall back to the summary.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "empty" | "none" => Self::Empty,
            _ => Self::Summary,
        }
    }
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Request timeout in seconds (default: 300)
    pub timeout_secs: u64,
    /// Response body of a successful sync (default: summary)
    pub response_mode: ResponseMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            timeout_secs: 300,
            response_mode: ResponseMode::Summary,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let host = lookup("HOST")
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let timeout_secs = lookup("SYNC_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(defaults.timeout_secs);

        let response_mode = lookup("SYNC_RESPONSE")
            .map(|v| ResponseMode::parse(&v))
            .unwrap_or_default();

        Self {
            port,
            host,
            timeout_secs,
            response_mode,
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.response_mode, ResponseMode::Summary);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("HOST", "0.0.0.0"),
            ("SYNC_RESPONSE", "Empty"),
            ("SYNC_TIMEOUT_SECS", "60"),
        ]);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.response_mode, ResponseMode::Empty);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[("PORT", "http"), ("SYNC_TIMEOUT_SECS", "0"), ("SYNC_RESPONSE", "xml")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.response_mode, ResponseMode::Summary);
    }
}
