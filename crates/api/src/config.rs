//! Gateway configuration: optional TOML file, then `CHATGATE_*` environment variables.

use std::{path::Path, time::Duration};

use chatgate_auth::IdentityMode;
use chatgate_observability::LogFormat;
use chatgate_upstream::{RetryPolicy, ServiceUrls, UpstreamConfig};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "CHATGATE";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,

    pub user_service_url: String,
    pub permission_service_url: String,
    pub audit_service_url: String,
    pub admin_service_url: String,
    /// Sent as `X-API-Key`; omitted when empty.
    pub services_api_key: String,
    pub services_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub health_timeout_ms: u64,

    /// Trust token claims only; never consult the legacy identity store.
    pub use_external_auth: bool,

    pub audit_grace_period_ms: u64,
    pub audit_max_retries: u32,
    pub audit_retry_delay_ms: u64,

    pub log_format: LogFormat,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let urls = ServiceUrls::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            user_service_url: urls.user,
            permission_service_url: urls.permission,
            audit_service_url: urls.audit,
            admin_service_url: urls.admin,
            services_api_key: String::new(),
            services_timeout_ms: 10_000,
            retry_delay_ms: 500,
            health_timeout_ms: 5_000,
            use_external_auth: false,
            audit_grace_period_ms: 5_000,
            audit_max_retries: 2,
            audit_retry_delay_ms: 250,
            log_format: LogFormat::Json,
        }
    }
}

impl GatewayConfig {
    /// Load from `path` (if it exists) and the environment. Env wins.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig {
            api_key: Some(self.services_api_key.clone()).filter(|k| !k.is_empty()),
            timeout: Duration::from_millis(self.services_timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            health_timeout: Duration::from_millis(self.health_timeout_ms),
        }
    }

    pub fn services(&self) -> ServiceUrls {
        ServiceUrls {
            user: self.user_service_url.clone(),
            permission: self.permission_service_url.clone(),
            audit: self.audit_service_url.clone(),
            admin: self.admin_service_url.clone(),
        }
    }

    pub fn identity_mode(&self) -> IdentityMode {
        if self.use_external_auth {
            IdentityMode::ExternalOnly
        } else {
            IdentityMode::Reconciling
        }
    }

    /// Delivery policy for audit records: exponential, capped at 8x the base delay.
    pub fn audit_retry(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.audit_retry_delay_ms);
        RetryPolicy::exponential(self.audit_max_retries, base, base.saturating_mul(8))
    }

    pub fn audit_grace_period(&self) -> Duration {
        Duration::from_millis(self.audit_grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert!(cfg.uses_default_secret());
        assert_eq!(cfg.upstream(), UpstreamConfig::default());
        assert_eq!(cfg.services(), ServiceUrls::default());
        assert_eq!(cfg.identity_mode(), IdentityMode::Reconciling);
        assert_eq!(cfg.audit_retry().max_retries, 2);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = std::env::temp_dir().join(format!("chatgate-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "port = 9090\nservices_api_key = \"k\"\nuse_external_auth = true\nlog_format = \"pretty\""
        )
        .unwrap();

        let cfg = GatewayConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.upstream().api_key.as_deref(), Some("k"));
        assert_eq!(cfg.identity_mode(), IdentityMode::ExternalOnly);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.audit_service_url, "http://localhost:8084");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let cfg = GatewayConfig::load(Some(Path::new("/nonexistent/chatgate.toml"))).unwrap();
        assert_eq!(cfg.port, 8080);
    }
}
