//! Tenant Router middleware (C4, §4.4).
//!
//! State machine per request: `Start -> RateChecked -> Identified|Anonymous
//! -> HandlerDone -> ContextCleared`. The "context" is stored as a request
//! `Extension`, which axum drops with the request on every exit path
//! (normal return, error, or panic unwound by the service layer) — that
//! drop is what discharges the "always clear the context" requirement, with
//! no separate teardown step to forget.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use supportgate_core::model::Provider;
use supportgate_core::tenant::hash_api_key;

use crate::error::ApiError;
use crate::state::AppState;

const RESERVED_SUBDOMAINS: [&str; 5] = ["api", "www", "staging", "production", "admin"];
const WEBHOOK_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Bound into a request extension once C4 identifies a tenant (§4.4 step 3).
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

fn is_public_path(path: &str) -> bool {
    path == "/health"
        || path.starts_with("/health/")
        || path == "/metrics"
        || path == "/docs"
        || path.starts_with("/docs/")
        || path == "/openapi.json"
        || path.starts_with("/api/admin/")
}

fn is_webhook_path(path: &str) -> Option<Provider> {
    if path == "/api/gorgias/webhook" {
        return Some(Provider::Gorgias);
    }
    path.strip_prefix("/api/webhooks/").and_then(|rest| match rest {
        "gorgias" => Some(Provider::Gorgias),
        "zendesk" => Some(Provider::Zendesk),
        "salesforce" => Some(Provider::Salesforce),
        "helpshift" => Some(Provider::Helpshift),
        "intercom" => Some(Provider::Intercom),
        "freshdesk" => Some(Provider::Freshdesk),
        _ => None,
    })
}

/// Inbound correlation id, honoring `X-Correlation-ID` then `X-Request-ID`
/// (§4.13, §6). `None` when the caller sent neither.
fn inbound_correlation_id(headers: &HeaderMap) -> Option<HeaderValue> {
    headers
        .get("x-correlation-id")
        .or_else(|| headers.get("x-request-id"))
        .cloned()
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Subdomain identification (§4.4 step 2, bullet 1).
fn subdomain_slug(headers: &HeaderMap) -> Option<String> {
    let host = headers.get("host")?.to_str().ok()?;
    let host = host.split(':').next().unwrap_or(host);
    if host == "localhost" || host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 {
        return None;
    }
    let first = labels[0].to_lowercase();
    if RESERVED_SUBDOMAINS.contains(&first.as_str()) {
        return None;
    }
    Some(first)
}

/// Provider-specific identifier field per §4.4 step 2, bullet 3.
fn webhook_identifier_field(provider: Provider) -> (&'static str, &'static [&'static str]) {
    match provider {
        Provider::Gorgias => ("gorgias_domain", &["account", "domain"]),
        Provider::Zendesk => ("zendesk_subdomain", &["account", "subdomain"]),
        Provider::Salesforce => ("salesforce_org_id", &["organizationId"]),
        Provider::Helpshift => ("helpshift_app_id", &["app_id"]),
        Provider::Intercom => ("intercom_workspace_id", &["data", "workspace_id"]),
        Provider::Freshdesk => ("freshdesk_domain", &["domain"]),
    }
}

fn dig(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_str().map(|s| s.to_string())
}

/// Consume the request body, returning it reconstructed so downstream
/// handlers can read it again (§4.4 step 2: "re-attach the body").
async fn buffer_body(req: Request) -> Result<(Request, bytes::Bytes), ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, WEBHOOK_BODY_LIMIT)
        .await
        .map_err(|e| ApiError::Validation(format!("could not read request body: {e}")))?;
    let rebuilt = Request::from_parts(parts, Body::from(bytes.clone()));
    Ok((rebuilt, bytes))
}

async fn identify_webhook_tenant(
    state: &AppState,
    provider: Provider,
    headers: &HeaderMap,
    body: &[u8],
    full_url: &str,
) -> Result<Uuid, ApiError> {
    let payload: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("invalid webhook payload: {e}")))?;
    let (key, path) = webhook_identifier_field(provider);
    let value = dig(&payload, path).ok_or_else(|| ApiError::Unauthorized("missing tenant identifier in payload".into()))?;

    let tenant = state
        .tenant_registry
        .find_by_webhook_identifier(key, &value)
        .await
        .map_err(|_| ApiError::Unauthorized("no tenant matches this webhook identifier".into()))?;

    let config = supportgate_core::tenant::decrypt_crm_config(&tenant, &state.encryptor)
        .map_err(|_| ApiError::Internal("failed to decrypt tenant configuration".into()))?;

    let signature = headers
        .get(provider.signature_header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    supportgate_core::webhook_verify::verify(provider, &config.webhook_secret, signature, body, full_url)?;

    Ok(tenant.id)
}

async fn identify_tenant(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    req: Request,
) -> Result<(Request, Option<Uuid>), ApiError> {
    if let Some(slug) = subdomain_slug(headers) {
        if let Ok(tenant) = state.tenant_registry.get_by_slug(&slug).await {
            return Ok((req, Some(tenant.id)));
        }
    }

    if let Some(api_key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let hash = hash_api_key(api_key);
        if let Ok(tenant) = state.tenant_registry.get_by_api_key_hash(&hash).await {
            return Ok((req, Some(tenant.id)));
        }
    }

    if let Some(provider) = is_webhook_path(path) {
        let full_url = path.to_string();
        let (req, body) = buffer_body(req).await?;
        let headers = req.headers().clone();
        let tenant_id = identify_webhook_tenant(state, provider, &headers, &body, &full_url).await?;
        return Ok((req, Some(tenant_id)));
    }

    Ok((req, None))
}

/// Attach the rate-limit and correlation-id headers common to every
/// response this middleware produces (§4.13: echoed correlation id, and
/// rate-limit headers on every authenticated response).
fn finish(mut response: Response, correlation_id: Option<HeaderValue>, remaining: Option<(usize, usize, usize, usize)>) -> Response {
    if let Some(id) = correlation_id {
        response.headers_mut().insert("x-correlation-id", id);
    }
    if let Some((minute_limit, minute_remaining, hour_limit, hour_remaining)) = remaining {
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit-minute", HeaderValue::from(minute_limit as u64));
        headers.insert("x-ratelimit-remaining-minute", HeaderValue::from(minute_remaining as u64));
        headers.insert("x-ratelimit-limit-hour", HeaderValue::from(hour_limit as u64));
        headers.insert("x-ratelimit-remaining-hour", HeaderValue::from(hour_remaining as u64));
    }
    response
}

/// C4's request-scoped middleware (§4.4).
pub async fn tenant_router_middleware(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let correlation_id = inbound_correlation_id(req.headers());

    if is_public_path(&path) {
        let response = next.run(req).await;
        return finish(response, correlation_id, None);
    }

    let ip = client_ip(req.headers());
    let (allowed, retry_after) = state.rate_limiter.allow(&ip);
    if !allowed {
        let response = ApiError::RateLimited {
            retry_after_secs: retry_after.map(|d| d.as_secs()).unwrap_or(60),
        }
        .into_response();
        return finish(response, correlation_id, None);
    }
    let (minute_remaining, hour_remaining) = state.rate_limiter.remaining(&ip);
    let remaining = Some((
        state.rate_limiter.minute_limit(),
        minute_remaining,
        state.rate_limiter.hour_limit(),
        hour_remaining,
    ));

    let headers = req.headers().clone();
    let (mut req, tenant_id) = match identify_tenant(&state, &headers, &path, req).await {
        Ok(result) => result,
        Err(err) => return finish(err.into_response(), correlation_id, remaining),
    };

    if let Some(tenant_id) = tenant_id {
        req.extensions_mut().insert(TenantContext { tenant_id });
    }

    let response = next.run(req).await;
    finish(response, correlation_id, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths_bypass() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/health/ready"));
        assert!(is_public_path("/metrics"));
        assert!(is_public_path("/api/admin/tenants"));
        assert!(!is_public_path("/api/tickets"));
    }

    #[test]
    fn test_webhook_path_maps_provider() {
        assert_eq!(is_webhook_path("/api/gorgias/webhook"), Some(Provider::Gorgias));
        assert_eq!(is_webhook_path("/api/webhooks/zendesk"), Some(Provider::Zendesk));
        assert_eq!(is_webhook_path("/api/tickets"), None);
    }

    #[test]
    fn test_inbound_correlation_id_prefers_correlation_over_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", "corr-1".parse().unwrap());
        headers.insert("x-request-id", "req-1".parse().unwrap());
        assert_eq!(inbound_correlation_id(&headers).unwrap(), "corr-1");

        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "req-1".parse().unwrap());
        assert_eq!(inbound_correlation_id(&headers).unwrap(), "req-1");

        assert!(inbound_correlation_id(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_subdomain_rejects_reserved_and_bare_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "api.example.com".parse().unwrap());
        assert_eq!(subdomain_slug(&headers), None, "reserved first label");

        let mut headers = HeaderMap::new();
        headers.insert("host", "quiltco.example.com".parse().unwrap());
        assert_eq!(subdomain_slug(&headers), Some("quiltco".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert("host", "localhost".parse().unwrap());
        assert_eq!(subdomain_slug(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("host", "quiltco.example.com:8080".parse().unwrap());
        assert_eq!(subdomain_slug(&headers), Some("quiltco".to_string()));
    }

    #[test]
    fn test_dig_nested_field() {
        let value = serde_json::json!({"account": {"domain": "quiltco"}});
        assert_eq!(dig(&value, &["account", "domain"]), Some("quiltco".to_string()));
        assert_eq!(dig(&value, &["account", "missing"]), None);
    }
}
