//! Uniform error model for the public API surface (C13, §4.13, §7).
//!
//! Every error response takes the shape `{error:{code,message,details?}}`
//! with one of the eight stable machine codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            ApiError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            ApiError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::UpstreamFailure(_) => "UPSTREAM_FAILURE",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::TicketNotFound(_) | ApiError::CustomerNotFound(_) | ApiError::TenantNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs }))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorPayload {
                code: self.code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<supportgate_tickets::TicketError> for ApiError {
    fn from(err: supportgate_tickets::TicketError) -> Self {
        use supportgate_tickets::TicketError as E;
        match err {
            E::NotFound(id) => ApiError::TicketNotFound(id),
            E::DuplicateTicketNumber(n) => ApiError::Conflict(format!("ticket number {n} already exists")),
            E::Validation(msg) => ApiError::Validation(msg),
            E::CustomerUnidentified => ApiError::Validation("customer could not be identified".into()),
            E::UpstreamFailure(msg) => ApiError::UpstreamFailure(msg),
            E::WriteBackFailed(msg) => ApiError::UpstreamFailure(msg),
            E::Analytics(inner) => inner.into(),
        }
    }
}

impl From<supportgate_core::error::TenantError> for ApiError {
    fn from(err: supportgate_core::error::TenantError) -> Self {
        use supportgate_core::error::TenantError as E;
        match err {
            E::NotFound(id) => ApiError::TenantNotFound(id),
            E::Inactive(id) => ApiError::Forbidden(format!("tenant {id} is not active")),
            E::SlugTaken(slug) => ApiError::Conflict(format!("slug already in use: {slug}")),
            E::ConfigDecryptFailed { .. } => ApiError::Internal("failed to decrypt tenant configuration".into()),
            E::MissingEncryptionKey => ApiError::Internal("encryption key is not configured".into()),
        }
    }
}

impl From<supportgate_core::error::WebhookError> for ApiError {
    fn from(err: supportgate_core::error::WebhookError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<supportgate_core::error::AnalyticsError> for ApiError {
    fn from(err: supportgate_core::error::AnalyticsError) -> Self {
        use supportgate_core::error::AnalyticsError as E;
        match err {
            E::CustomerNotFound(id) => ApiError::CustomerNotFound(id),
            E::Unidentified => ApiError::Validation("customer could not be identified".into()),
            E::PhoneLookupUnavailable(msg) => ApiError::UpstreamFailure(msg),
        }
    }
}

impl From<supportgate_mcp::error::RouterError> for ApiError {
    fn from(err: supportgate_mcp::error::RouterError) -> Self {
        use supportgate_mcp::error::RouterError as E;
        match err {
            E::UnknownTool { tool_name } => ApiError::Validation(format!("unknown tool: {tool_name}")),
            E::InvalidParams { tool_name, message } => {
                ApiError::Validation(format!("invalid parameters for {tool_name}: {message}"))
            }
            E::DispatchFailed { message } => ApiError::UpstreamFailure(message),
        }
    }
}
