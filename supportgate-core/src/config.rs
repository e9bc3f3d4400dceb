//! Process-wide configuration (§5, §6, §7).
//!
//! Uses `figment` for layered configuration: defaults -> `config.toml` ->
//! environment, mirroring the teacher's `AgentConfig` loader. Construction
//! fails closed per §7 ConfigError: a missing encryption key, a weak admin
//! key, or a wildcard CORS origin in production all refuse startup rather
//! than degrade silently.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const COMMON_PASSWORDS: [&str; 6] = [
    "password", "admin", "changeme", "letmein", "123456", "admin123",
];

/// Deployment environment, distinct from a tenant's own `Environment` (§3)
/// though the values overlap; this is the process-wide environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessEnvironment {
    Production,
    Staging,
    Development,
}

impl Default for ProcessEnvironment {
    fn default() -> Self {
        ProcessEnvironment::Development
    }
}

/// Recognized environment options (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayProcessConfig {
    #[serde(default)]
    pub environment: ProcessEnvironment,
    #[serde(default)]
    pub database_url: String,
    #[serde(default)]
    pub redis_url: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub enable_cache: bool,
    /// Base64 of 32 random bytes. Never logged.
    #[serde(default)]
    pub encryption_key: String,
    pub admin_key: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_rate_limit_minute")]
    pub rate_limit_minute: u32,
    #[serde(default = "default_rate_limit_hour")]
    pub rate_limit_hour: u32,
    #[serde(default)]
    pub use_consolidated_mcp_tools: bool,
    #[serde(default)]
    pub enable_sales_sync: bool,
    #[serde(default)]
    pub sales_sync_hour: Option<u32>,
    #[serde(default)]
    pub sync_on_startup: bool,
    #[serde(default)]
    pub enable_prometheus_metrics: bool,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cache_ttl() -> u64 {
    3600
}
fn default_true() -> bool {
    true
}
fn default_rate_limit_minute() -> u32 {
    100
}
fn default_rate_limit_hour() -> u32 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewayProcessConfig {
    fn default() -> Self {
        Self {
            environment: ProcessEnvironment::default(),
            database_url: String::new(),
            redis_url: String::new(),
            cache_ttl_secs: default_cache_ttl(),
            enable_cache: true,
            encryption_key: String::new(),
            admin_key: String::new(),
            allowed_origins: Vec::new(),
            rate_limit_minute: default_rate_limit_minute(),
            rate_limit_hour: default_rate_limit_hour(),
            use_consolidated_mcp_tools: false,
            enable_sales_sync: false,
            sales_sync_hour: None,
            sync_on_startup: false,
            enable_prometheus_metrics: false,
            json_logs: false,
            log_level: default_log_level(),
        }
    }
}

impl GatewayProcessConfig {
    /// Load configuration from defaults -> `config.toml` (if present) ->
    /// environment variables, then validate (§7 ConfigError).
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config: GatewayProcessConfig = Figment::new()
            .merge(Serialized::defaults(GatewayProcessConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::raw().only(&[
                "DATABASE_URL",
                "REDIS_URL",
                "CACHE_TTL",
                "ENABLE_CACHE",
                "ENCRYPTION_KEY",
                "ADMIN_KEY",
                "ALLOWED_ORIGINS",
                "RATE_LIMIT_MINUTE",
                "RATE_LIMIT_HOUR",
                "USE_CONSOLIDATED_MCP_TOOLS",
                "ENABLE_SALES_SYNC",
                "SALES_SYNC_HOUR",
                "SYNC_ON_STARTUP",
                "ENABLE_PROMETHEUS_METRICS",
                "JSON_LOGS",
                "LOG_LEVEL",
                "ENVIRONMENT",
            ]))
            .extract()
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate startup-refusal rules (§5, §7).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_key.len() < 16
            || COMMON_PASSWORDS
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&self.admin_key))
        {
            return Err(ConfigError::WeakAdminKey);
        }

        let key_bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &self.encryption_key,
        )
        .map_err(|_| ConfigError::InvalidEncryptionKey)?;
        if key_bytes.len() != 32 {
            return Err(ConfigError::InvalidEncryptionKey);
        }

        if self.environment == ProcessEnvironment::Production
            && self.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(ConfigError::WildcardCorsInProduction);
        }

        Ok(())
    }

    /// The 32-byte encryption key, decoded. Only callable after `validate`.
    pub fn encryption_key_bytes(&self) -> [u8; 32] {
        let decoded = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &self.encryption_key,
        )
        .expect("validated at load time");
        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [7u8; 32])
    }

    fn base_config() -> GatewayProcessConfig {
        GatewayProcessConfig {
            admin_key: "a-sufficiently-long-admin-key".into(),
            encryption_key: valid_key(),
            ..GatewayProcessConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_short_admin_key_rejected() {
        let mut c = base_config();
        c.admin_key = "short".into();
        assert!(matches!(c.validate(), Err(ConfigError::WeakAdminKey)));
    }

    #[test]
    fn test_common_password_admin_key_rejected() {
        let mut c = base_config();
        c.admin_key = "changeme".into();
        assert!(matches!(c.validate(), Err(ConfigError::WeakAdminKey)));
    }

    #[test]
    fn test_missing_encryption_key_rejected() {
        let mut c = base_config();
        c.encryption_key = String::new();
        assert!(matches!(c.validate(), Err(ConfigError::InvalidEncryptionKey)));
    }

    #[test]
    fn test_wrong_length_encryption_key_rejected() {
        let mut c = base_config();
        c.encryption_key =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [1u8; 16]);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidEncryptionKey)));
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut c = base_config();
        c.environment = ProcessEnvironment::Production;
        c.allowed_origins = vec!["*".to_string()];
        assert!(matches!(
            c.validate(),
            Err(ConfigError::WildcardCorsInProduction)
        ));
    }

    #[test]
    fn test_wildcard_cors_allowed_outside_production() {
        let mut c = base_config();
        c.environment = ProcessEnvironment::Development;
        c.allowed_origins = vec!["*".to_string()];
        assert!(c.validate().is_ok());
    }
}
