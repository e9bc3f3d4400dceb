//! Error types for the support intelligence gateway core.
//!
//! Uses `thiserror` for structured error variants covering tenant
//! resolution, webhook verification, cache, analytics, and scoring
//! concerns. Mirrors the composition of the top-level error enum over
//! per-domain error enums via `#[from]`.

/// Top-level error type for `supportgate-core`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("tenant error: {0}")]
    Tenant(#[from] TenantError),

    #[error("webhook verification error: {0}")]
    Webhook(#[from] WebhookError),

    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the tenant registry (C1).
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("tenant not found: {0}")]
    NotFound(String),

    #[error("tenant is not active: {0}")]
    Inactive(String),

    #[error("slug already in use: {0}")]
    SlugTaken(String),

    #[error("failed to decrypt CRM config: {message}")]
    ConfigDecryptFailed { message: String },

    #[error("encryption key is missing or malformed")]
    MissingEncryptionKey,
}

/// Errors from the webhook verifier (C3).
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("missing webhook secret")]
    MissingSecret,

    #[error("signature encoding was invalid: {0}")]
    InvalidEncoding(String),

    #[error("signature did not match")]
    Mismatch,
}

/// Errors from analytics access (C6) and the customer resolver (C7).
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    #[error("customer could not be identified from the webhook payload")]
    Unidentified,

    #[error("phone lookup service unavailable: {0}")]
    PhoneLookupUnavailable(String),
}

/// Errors from process configuration (§5, §6, §7 ConfigError).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}")]
    EnvVarMissing { var: String },

    #[error("ADMIN_KEY is missing, too short, or a common password")]
    WeakAdminKey,

    #[error("ENCRYPTION_KEY is missing or not 32 bytes of base64")]
    InvalidEncryptionKey,

    #[error("wildcard CORS origin is forbidden when ENVIRONMENT=production")]
    WildcardCorsInProduction,

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A type alias for results using the top-level `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_tenant() {
        let err = CoreError::Tenant(TenantError::NotFound("quiltco".into()));
        assert_eq!(err.to_string(), "tenant error: tenant not found: quiltco");
    }

    #[test]
    fn test_error_display_webhook() {
        let err = CoreError::Webhook(WebhookError::Mismatch);
        assert_eq!(
            err.to_string(),
            "webhook verification error: signature did not match"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = CoreError::Config(ConfigError::WeakAdminKey);
        assert_eq!(
            err.to_string(),
            "configuration error: ADMIN_KEY is missing, too short, or a common password"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: CoreError = serde_err.into();
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
