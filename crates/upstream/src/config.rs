use std::time::Duration;

/// Transport settings shared by every backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Service-to-service credential sent as `X-API-Key` when present.
    pub api_key: Option<String>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Delay between retries.
    pub retry_delay: Duration,
    /// Timeout for liveness probes.
    pub health_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: Duration::from_millis(10_000),
            retry_delay: Duration::from_millis(500),
            health_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Base URLs of the backend services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub user: String,
    pub permission: String,
    pub audit: String,
    pub admin: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            user: "http://localhost:8082".to_string(),
            permission: "http://localhost:8083".to_string(),
            audit: "http://localhost:8084".to_string(),
            admin: "http://localhost:8085".to_string(),
        }
    }
}
