//! Route wiring (C13, §6): binds every public endpoint to its handler and
//! layers in the tenant-routing middleware, CORS, and request tracing.
//!
//! `tower_http::cors` is not something the original gateway reached for;
//! this crate's CORS layer is grounded on the allow-listed-origin pattern
//! used by another pack gateway (`sx9-gateway-primary`), since wildcard
//! origins are rejected at config load time (§7 ConfigError) and the
//! allow-list needs to be enforced somewhere in the HTTP stack.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::handlers;
use crate::state::AppState;
use crate::tenant_router::tenant_router_middleware;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-correlation-id"),
            HeaderName::from_static("x-admin-key"),
        ])
        .allow_origin(origins)
        .max_age(Duration::from_secs(3600))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let tickets = Router::new()
        .route("/", get(handlers::list_tickets).post(handlers::create_ticket))
        .route("/{id_or_number}", get(handlers::get_ticket).patch(handlers::update_ticket))
        .route("/{id_or_number}/messages", post(handlers::append_message))
        .route("/{id_or_number}/notes", get(handlers::list_notes).post(handlers::add_note))
        .route("/{id_or_number}/score-breakdown", get(handlers::score_breakdown))
        .route("/{id_or_number}/reset-conversation", post(handlers::reset_conversation));

    let ai = Router::new()
        .route("/tickets/{id_or_number}/recommendation", get(handlers::get_recommendation))
        .route("/tickets/{id_or_number}/draft-response", get(handlers::get_draft_response))
        .route(
            "/tickets/{id_or_number}/draft-response/regenerate",
            post(handlers::regenerate_draft_response),
        )
        .route(
            "/tickets/{id_or_number}/recommendation/actions/{action_index}",
            patch(handlers::mark_action_completed),
        );

    let mcp = Router::new()
        .route("/query", post(handlers::mcp_query))
        .route("/query/natural-language", get(handlers::mcp_query_natural_language));

    let admin = Router::new()
        .route("/tenants", get(admin::list_tenants).post(admin::create_tenant))
        .route("/tenants/{tenant_id}/crm-config", patch(admin::rotate_crm_config))
        .route("/counters", get(admin::counters));

    let api = Router::new()
        .route("/gorgias/webhook", post(handlers::gorgias_webhook))
        .route("/webhooks/{provider}", post(handlers::webhook))
        .nest("/tickets", tickets)
        .nest("/ai", ai)
        .nest("/mcp", mcp)
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::health_ready))
        .route("/health/live", get(handlers::health_live))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), tenant_router_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_from_empty_origins() {
        let _ = cors_layer(&[]);
    }

    #[test]
    fn test_cors_layer_builds_from_configured_origins() {
        let _ = cors_layer(&["https://app.example.com".to_string()]);
    }
}
