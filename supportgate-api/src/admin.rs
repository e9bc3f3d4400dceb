//! Provisioning endpoints guarded by `X-Admin-Key` (§6 "privileged ops").
//!
//! This is the HTTP surface `supportgate-cli` drives: create a tenant,
//! rotate its encrypted CRM config, and read rate-limiter/cache counters.
//! No endpoint here is tenant-scoped; the tenant router middleware's
//! public-path bypass list includes everything under `/api/admin`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use supportgate_core::model::Provider;
use supportgate_core::tenant::NewTenant;

use crate::error::ApiError;
use crate::handlers::parse_provider;
use crate::state::AppState;

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-Admin-Key".into()))?;
    if constant_time_eq(provided, &state.config.admin_key) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid X-Admin-Key".into()))
    }
}

#[derive(Serialize)]
struct TenantSummary {
    id: Uuid,
    slug: String,
    name: String,
    crm_provider: Provider,
    is_active: bool,
}

impl From<supportgate_core::model::Tenant> for TenantSummary {
    fn from(t: supportgate_core::model::Tenant) -> Self {
        TenantSummary { id: t.id, slug: t.slug, name: t.name, crm_provider: t.crm_provider, is_active: t.is_active }
    }
}

pub async fn list_tenants(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &headers)?;
    let tenants: Vec<TenantSummary> = state.tenant_admin.list_all().await?.into_iter().map(Into::into).collect();
    Ok(Json(tenants))
}

#[derive(Deserialize)]
pub struct CreateTenantBody {
    slug: String,
    name: String,
    crm_provider: String,
    /// Plaintext provider credentials, including `webhook_secret`; encrypted
    /// here before ever touching the tenant store.
    crm_config: supportgate_core::model::CrmConfig,
    #[serde(default)]
    webhook_identifiers: std::collections::HashMap<String, String>,
    api_key: String,
    #[serde(default)]
    environment: supportgate_core::config::ProcessEnvironment,
}

#[derive(Serialize)]
pub struct CreateTenantResponse {
    tenant: TenantSummary,
    /// Returned once; the registry only ever stores the hash.
    api_key: String,
}

pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateTenantBody>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &headers)?;
    let crm_provider = parse_provider(&body.crm_provider)?;
    let plaintext = serde_json::to_vec(&body.crm_config)
        .map_err(|e| ApiError::Validation(format!("invalid crm_config: {e}")))?;
    let ciphertext = state.encryptor.encrypt(&plaintext)?;
    let input = NewTenant {
        slug: body.slug,
        name: body.name,
        crm_provider,
        crm_config_ciphertext: ciphertext,
        webhook_identifiers: body.webhook_identifiers,
        api_key_hash: supportgate_core::tenant::hash_api_key(&body.api_key),
        environment: match body.environment {
            supportgate_core::config::ProcessEnvironment::Production => supportgate_core::model::Environment::Production,
            supportgate_core::config::ProcessEnvironment::Staging => supportgate_core::model::Environment::Staging,
            supportgate_core::config::ProcessEnvironment::Development => supportgate_core::model::Environment::Development,
        },
    };
    let tenant = state.tenant_admin.create_tenant(input).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreateTenantResponse { tenant: tenant.into(), api_key: body.api_key }),
    ))
}

#[derive(Deserialize)]
pub struct RotateCrmConfigBody {
    crm_config: supportgate_core::model::CrmConfig,
}

pub async fn rotate_crm_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<Uuid>,
    Json(body): Json<RotateCrmConfigBody>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &headers)?;
    let plaintext = serde_json::to_vec(&body.crm_config)
        .map_err(|e| ApiError::Validation(format!("invalid crm_config: {e}")))?;
    let ciphertext = state.encryptor.encrypt(&plaintext)?;
    let tenant = state.tenant_admin.rotate_crm_config(tenant_id, ciphertext).await?;
    Ok(Json(TenantSummary::from(tenant)))
}

#[derive(Serialize)]
pub struct CountersBody {
    cache_hit_rate: f64,
    rate_limiter_tracked_keys: usize,
}

pub async fn counters(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(CountersBody {
        cache_hit_rate: state.cache.metrics().hit_rate(),
        rate_limiter_tracked_keys: state.rate_limiter.tracked_key_count(),
    }))
}
