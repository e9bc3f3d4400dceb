//! Public HTTP handlers (C13, §4.13, §6).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use supportgate_core::model::{Priority, Provider, Ticket, TicketStatus};
use supportgate_tickets::ingestion::{self, IngestionPipeline};
use supportgate_tickets::service::{Pagination, SortOrder, TicketSortField, TicketUpdate};
use supportgate_tickets::store::{TicketFilters, TicketStore};

use crate::error::ApiError;
use crate::state::AppState;
use crate::tenant_router::TenantContext;

fn require_tenant(ext: &Option<Extension<TenantContext>>) -> Result<Uuid, ApiError> {
    ext.as_ref()
        .map(|Extension(ctx)| ctx.tenant_id)
        .ok_or_else(|| ApiError::Unauthorized("no tenant identified for this request".into()))
}

pub(crate) fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    match raw {
        "gorgias" => Ok(Provider::Gorgias),
        "zendesk" => Ok(Provider::Zendesk),
        "salesforce" => Ok(Provider::Salesforce),
        "helpshift" => Ok(Provider::Helpshift),
        "intercom" => Ok(Provider::Intercom),
        "freshdesk" => Ok(Provider::Freshdesk),
        other => Err(ApiError::Validation(format!("unknown provider: {other}"))),
    }
}

// ---- health (§6) ----

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthBody { status: "ok" })
}

pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.cache.is_connected() || !state.config.enable_cache;
    if ready {
        Json(HealthBody { status: "ready" }).into_response()
    } else {
        ApiError::Internal("cache is not connected".into()).into_response()
    }
}

pub async fn health_live() -> impl IntoResponse {
    Json(HealthBody { status: "live" })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache_metrics = state.cache.metrics();
    format!(
        "supportgate_cache_hit_rate {:.4}\nsupportgate_rate_limiter_tracked_keys {}\n",
        cache_metrics.hit_rate(),
        state.rate_limiter.tracked_key_count(),
    )
}

// ---- webhooks (C9, §4.9) ----

/// `POST /api/gorgias/webhook` and `POST /api/webhooks/{provider}` (§6).
/// Runs the synchronous precheck (steps 1-2) inline, then spawns the
/// enrichment half (steps 3-12) as a detached task so the provider gets a
/// prompt response (§5).
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    ext: Option<Extension<TenantContext>>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provider = parse_provider(&provider)?;
    webhook_for_provider(state, provider, ext, body).await
}

/// `POST /api/gorgias/webhook` (§6): Gorgias's path predates the generic
/// `/api/webhooks/{provider}` route and is kept for backward compatibility.
pub async fn gorgias_webhook(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    webhook_for_provider(state, Provider::Gorgias, ext, body).await
}

async fn webhook_for_provider(
    state: Arc<AppState>,
    provider: Provider,
    ext: Option<Extension<TenantContext>>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;

    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid webhook payload: {e}")))?;
    let envelope = ingestion::normalize_payload(&raw);

    let analytics = state.analytics_service(tenant_id);
    let pipeline = IngestionPipeline::new(
        state.ticket_store.as_ref(),
        &analytics,
        state.phone_lookup.as_ref(),
        state.language_adapter.as_ref(),
    );
    let outcome = pipeline.precheck(&envelope);

    if outcome.status == "accepted" {
        let provider_ticket_id = raw
            .get("ticket")
            .and_then(|t| t.get("id"))
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let ticket_number = format!("{provider}-{provider_ticket_id}");

        let state = state.clone();
        tokio::spawn(async move {
            let analytics = state.analytics_service(tenant_id);
            let service = state.ticket_service(&analytics);

            let ticket = match service.get_ticket(tenant_id, &ticket_number).await {
                Ok(detail) => detail.ticket,
                Err(_) => {
                    let customer_id = supportgate_core::customer_resolver::resolve_customer_id(
                        &envelope.customer,
                        state.phone_lookup.as_ref(),
                    )
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                    let now = chrono::Utc::now();
                    let new_ticket = Ticket {
                        id: Uuid::new_v4(),
                        tenant_id,
                        ticket_number: ticket_number.clone(),
                        customer_id: customer_id.clone(),
                        channel: provider.to_string(),
                        status: envelope.ticket_status,
                        priority: Priority::Normal,
                        subject: envelope.subject.clone(),
                        assigned_to: None,
                        tags: envelope.ticket_tags.clone(),
                        custom_fields: std::collections::HashMap::new(),
                        created_at: now,
                        updated_at: now,
                        closed_at: None,
                    };
                    let initial_message = supportgate_core::model::TicketMessage {
                        id: Uuid::new_v4(),
                        ticket_id: new_ticket.id,
                        from_agent: false,
                        content: String::new(),
                        author: customer_id,
                        created_at: now,
                    };
                    if let Err(err) = state.ticket_store.insert_ticket(new_ticket.clone(), initial_message).await {
                        tracing::warn!(error = %err, tenant_id = %tenant_id, "could not materialize ticket for webhook");
                        return;
                    }
                    new_ticket
                }
            };

            let pipeline = IngestionPipeline::new(
                state.ticket_store.as_ref(),
                &analytics,
                state.phone_lookup.as_ref(),
                state.language_adapter.as_ref(),
            );
            if let Err(err) = pipeline.enrich(ticket.id, &envelope, None).await {
                tracing::warn!(error = %err, tenant_id = %tenant_id, "ingestion enrichment failed");
            }
        });
    }

    Ok((axum::http::StatusCode::ACCEPTED, Json(outcome)))
}

// ---- MCP queries (C12, §4.12, §6) ----

#[derive(Deserialize)]
pub struct McpQueryBody {
    tool_name: String,
    #[serde(default)]
    arguments: Value,
}

pub async fn mcp_query(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Json(body): Json<McpQueryBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    rate_limit_tenant(&state, tenant_id, "mcp")?;

    let router = state.nl_query_router();
    let response = router.dispatch_named(&body.tool_name, body.arguments).await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct NaturalLanguageQuery {
    query: String,
}

/// `GET /api/mcp/query/natural-language?query=...` (§6: 50/hour per tenant,
/// tighter than the general endpoint rate limit since it invokes the
/// language model adapter).
pub async fn mcp_query_natural_language(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Query(params): Query<NaturalLanguageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    rate_limit_tenant(&state, tenant_id, "mcp-nl")?;

    let router = state.nl_query_router();
    let response = router.route(&params.query).await?;
    Ok(Json(response))
}

fn rate_limit_tenant(state: &AppState, tenant_id: Uuid, scope: &str) -> Result<(), ApiError> {
    let key = format!("{scope}:{tenant_id}");
    let (allowed, retry_after) = state.rate_limiter.allow(&key);
    if allowed {
        Ok(())
    } else {
        Err(ApiError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(Duration::from_secs(60)).as_secs(),
        })
    }
}

// ---- tickets (C11, §4.11, §6) ----

#[derive(Deserialize)]
pub struct ListTicketsParams {
    status: Option<TicketStatus>,
    priority: Option<Priority>,
    channel: Option<String>,
    assigned_to: Option<String>,
    customer_id: Option<String>,
    #[serde(default)]
    smart_order: bool,
    #[serde(default)]
    topic_alerts: String,
    page: Option<u32>,
    limit: Option<u32>,
    sort: Option<TicketSortField>,
    order: Option<SortOrder>,
}

/// One entry of the `matches` list (§6). `smart_score`/`matches_topic_alert`
/// are only populated when the request ran with `smart_order=true`.
#[derive(Serialize)]
struct RankedTicket {
    #[serde(flatten)]
    ticket: Ticket,
    smart_score: Option<f64>,
    matches_topic_alert: Option<bool>,
}

/// Response envelope for `GET /api/tickets` (§6).
#[derive(Serialize)]
struct ListTicketsResponse {
    smart_order_enabled: bool,
    topic_alerts_active: Vec<String>,
    matches: Vec<RankedTicket>,
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);

    let filters = TicketFilters {
        status: params.status,
        priority: params.priority,
        channel: params.channel,
        assigned_to: params.assigned_to,
        customer_id: params.customer_id,
    };
    let topic_alerts: Vec<String> = params
        .topic_alerts
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let smart_order = params.smart_order;
    let pagination = Pagination {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(50),
    };

    let ranked = service
        .list_tickets(
            tenant_id,
            &filters,
            smart_order,
            &topic_alerts,
            params.sort.unwrap_or_default(),
            params.order.unwrap_or_default(),
            pagination,
        )
        .await?;
    let matches: Vec<RankedTicket> = ranked
        .into_iter()
        .map(|(ticket, score)| RankedTicket {
            ticket,
            smart_score: score.as_ref().map(|s| s.total),
            matches_topic_alert: score.as_ref().map(|s| s.matches_topic_alert),
        })
        .collect();
    Ok(Json(ListTicketsResponse {
        smart_order_enabled: smart_order,
        topic_alerts_active: topic_alerts,
        matches,
    }))
}

#[derive(Deserialize)]
pub struct CreateTicketBody {
    customer_id: String,
    channel: String,
    subject: String,
    initial_message: String,
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Json(body): Json<CreateTicketBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let ticket = service
        .create_ticket(tenant_id, body.customer_id, body.channel, body.subject, body.initial_message)
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(ticket)))
}

#[derive(Serialize)]
struct TicketDetailBody {
    ticket: Ticket,
    messages: Vec<supportgate_core::model::TicketMessage>,
    analytics: Option<supportgate_core::model::CustomerAnalytics>,
    recommendation: Option<supportgate_core::model::AiRecommendation>,
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let detail = service.get_ticket(tenant_id, &id_or_number).await?;
    Ok(Json(TicketDetailBody {
        ticket: detail.ticket,
        messages: detail.messages,
        analytics: detail.analytics,
        recommendation: detail.recommendation,
    }))
}

#[derive(Deserialize)]
pub struct AppendMessageBody {
    content: String,
    #[serde(default)]
    from_agent: bool,
    author: String,
    #[serde(default)]
    close_ticket: bool,
}

pub async fn append_message(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
    Json(body): Json<AppendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    service
        .append_message(tenant_id, &id_or_number, body.content, body.from_agent, body.author, body.close_ticket)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Default)]
pub struct UpdateTicketBody {
    status: Option<TicketStatus>,
    priority: Option<Priority>,
    assigned_to: Option<String>,
    subject: Option<String>,
    tags: Option<Vec<String>>,
    #[serde(default)]
    add_tags: Vec<String>,
    #[serde(default)]
    remove_tags: Vec<String>,
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
    Json(body): Json<UpdateTicketBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let update = TicketUpdate {
        status: body.status,
        priority: body.priority,
        assigned_to: body.assigned_to,
        subject: body.subject,
        tags: body.tags,
        add_tags: body.add_tags,
        remove_tags: body.remove_tags,
    };
    let ticket = service.update_ticket(tenant_id, &id_or_number, update).await?;
    Ok(Json(ticket))
}

#[derive(Deserialize)]
pub struct AddNoteBody {
    text: String,
    author: String,
}

pub async fn add_note(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
    Json(body): Json<AddNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let ticket = service.get_ticket(tenant_id, &id_or_number).await?.ticket;
    let note = service.add_note(ticket.id, body.text, body.author).await?;
    Ok((axum::http::StatusCode::CREATED, Json(note)))
}

pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let ticket = service.get_ticket(tenant_id, &id_or_number).await?.ticket;
    let notes = service.list_notes(ticket.id).await?;
    Ok(Json(notes))
}

#[derive(Deserialize, Default)]
pub struct ScoreBreakdownParams {
    #[serde(default)]
    topic_alerts: String,
}

pub async fn score_breakdown(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
    Query(params): Query<ScoreBreakdownParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let topic_alerts: Vec<String> = params
        .topic_alerts
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let breakdown = service.get_score_breakdown(tenant_id, &id_or_number, &topic_alerts).await?;
    Ok(Json(breakdown))
}

pub async fn reset_conversation(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let ticket = service.get_ticket(tenant_id, &id_or_number).await?.ticket;
    service.reset_conversation(ticket.id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

// ---- AI surface (C11, §4.11, §6) ----

pub async fn get_recommendation(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let recommendation = service.get_recommendation(tenant_id, &id_or_number).await?;
    Ok(Json(recommendation))
}

pub async fn get_draft_response(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let draft = service.get_draft(tenant_id, &id_or_number).await?;
    Ok(Json(draft))
}

pub async fn regenerate_draft_response(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path(id_or_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let draft = service.regenerate_draft(tenant_id, &id_or_number).await?;
    Ok(Json(draft))
}

#[derive(Deserialize)]
pub struct MarkActionCompletedBody {
    #[serde(default = "default_completed")]
    completed: bool,
}
fn default_completed() -> bool {
    true
}

pub async fn mark_action_completed(
    State(state): State<Arc<AppState>>,
    ext: Option<Extension<TenantContext>>,
    Path((id_or_number, action_index)): Path<(String, usize)>,
    Json(body): Json<MarkActionCompletedBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&ext)?;
    let analytics = state.analytics_service(tenant_id);
    let service = state.ticket_service(&analytics);
    let ticket = service.get_ticket(tenant_id, &id_or_number).await?.ticket;
    service.mark_action_completed(ticket.id, action_index, body.completed).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
