//! Shared application state handed to every handler.

use std::sync::Arc;

use uuid::Uuid;

use supportgate_core::analytics::AnalyticsStore;
use supportgate_core::cache::Cache;
use supportgate_core::config::GatewayProcessConfig;
use supportgate_core::customer_resolver::PhoneLookup;
use supportgate_core::encryption::ConfigEncryptor;
use supportgate_core::rate_limit::RateLimiter;
use supportgate_core::tenant::{TenantAdmin, TenantRegistry};
use supportgate_mcp::adapter::QueryModelAdapter;
use supportgate_mcp::catalog::CatalogVersion;
use supportgate_mcp::router::ToolDispatcher;
use supportgate_tickets::adapters::LanguageModelAdapter;
use supportgate_tickets::store::TicketStore;

/// Everything a handler needs, built once at process startup and shared
/// behind an `Arc` across the axum `Router` (§5: parallel workers serving
/// requests against one gateway instance).
pub struct AppState {
    pub config: GatewayProcessConfig,
    pub encryptor: ConfigEncryptor,
    pub tenant_registry: Arc<dyn TenantRegistry>,
    /// Same underlying store as `tenant_registry` in the default in-memory
    /// deployment, exposed through the write-capable trait for the
    /// `X-Admin-Key`-guarded provisioning endpoints (§6).
    pub tenant_admin: Arc<dyn TenantAdmin>,
    /// Keyed first by client IP (pre-identification, §4.4 step 1), then
    /// reused keyed by tenant id for the post-identification endpoint
    /// rate-limit headers (§6).
    pub rate_limiter: RateLimiter,
    pub cache: Cache,
    pub ticket_store: Arc<dyn TicketStore>,
    pub analytics_store: Arc<dyn AnalyticsStore>,
    pub phone_lookup: Arc<dyn PhoneLookup>,
    pub language_adapter: Arc<dyn LanguageModelAdapter>,
    pub query_adapter: Arc<dyn QueryModelAdapter>,
    pub tool_dispatcher: Arc<dyn ToolDispatcher>,
    pub catalog: CatalogVersion,
}

impl AppState {
    /// Builds an `AnalyticsService` scoped to `tenant_id` (§8: every cache
    /// key this service derives must be tenant-prefixed), so callers must
    /// have already identified the tenant for this request.
    pub fn analytics_service(&self, tenant_id: Uuid) -> supportgate_core::analytics::AnalyticsService<'_> {
        supportgate_core::analytics::AnalyticsService::new(self.analytics_store.as_ref(), &self.cache, tenant_id)
    }

    pub fn ticket_service<'a>(
        &'a self,
        analytics: &'a supportgate_core::analytics::AnalyticsService<'a>,
    ) -> supportgate_tickets::service::TicketService<'a> {
        supportgate_tickets::service::TicketService::new(self.ticket_store.as_ref(), analytics, self.language_adapter.as_ref())
    }

    pub fn nl_query_router(&self) -> supportgate_mcp::router::NlQueryRouter<'_> {
        supportgate_mcp::router::NlQueryRouter::new(self.query_adapter.as_ref(), self.tool_dispatcher.as_ref(), self.catalog)
    }
}
