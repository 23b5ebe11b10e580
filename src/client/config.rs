//! Client configuration.

use serde::{Deserialize, Serialize};

/// Settings used by [`Client::with_config`](crate::Client::with_config).
///
/// Every field has a default, so partial configurations deserialize cleanly:
///
/// ```
/// use streamline_http::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(
///     r#"{ "base_url": "https://api.example.com", "max_concurrent_requests": 8 }"#,
/// ).unwrap();
/// assert_eq!(config.max_concurrent_requests, 8);
/// assert!(config.request_timeout_ms.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Absolute URL every request path is joined onto.
    pub base_url: String,

    /// Overall timeout applied by the base transport to each exchange.
    pub request_timeout_ms: Option<u64>,

    /// Timeout for establishing connections.
    pub connect_timeout_ms: Option<u64>,

    /// How long idle pooled connections are kept.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,

    /// In-flight request cap; `0` disables the limiter.
    pub max_concurrent_requests: usize,

    /// Install the structured-logging interceptor.
    pub enable_logging: bool,

    /// `User-Agent` sent with every request.
    pub user_agent: Option<String>,

    /// Proxy for all traffic; empty means none.
    pub proxy_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_ms: None,
            connect_timeout_ms: Some(10_000),
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            max_concurrent_requests: 0,
            enable_logging: false,
            user_agent: Some(concat!("streamline-http/", env!("CARGO_PKG_VERSION")).to_string()),
            proxy_url: String::new(),
        }
    }
}

impl ClientConfig {
    /// Default settings for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.pool_idle_timeout_secs, 90);
        assert_eq!(config.max_concurrent_requests, 0);
        assert!(!config.enable_logging);
        assert!(config.proxy_url.is_empty());
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = ClientConfig {
            enable_logging: true,
            request_timeout_ms: Some(2_500),
            ..ClientConfig::new("http://localhost:8080")
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
