//! Gateway process entry point (§5, §6): loads configuration, wires the
//! default in-process collaborators, and serves the public HTTP surface.
//!
//! Grounded on the teacher's `rustant-cli` gateway bootstrap
//! (`GatewayServer::new` + `axum::serve` over a `TcpListener`), generalized
//! from a single-user local dashboard to a multi-tenant process that never
//! holds any tenant's decrypted CRM credentials outside a request.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use supportgate_core::analytics::EmptyAnalyticsStore;
use supportgate_core::cache::Cache;
use supportgate_core::config::GatewayProcessConfig;
use supportgate_core::customer_resolver::NoopPhoneLookup;
use supportgate_core::encryption::ConfigEncryptor;
use supportgate_core::rate_limit::RateLimiter;
use supportgate_core::tenant::InMemoryTenantRegistry;
use supportgate_mcp::adapter::UnavailableAdapter as UnavailableQueryAdapter;
use supportgate_mcp::catalog::CatalogVersion;
use supportgate_mcp::router::UnavailableDispatcher;
use supportgate_tickets::adapters::UnavailableAdapter as UnavailableLanguageAdapter;
use supportgate_tickets::store::InMemoryTicketStore;

use supportgate_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayProcessConfig::load().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    let filter = EnvFilter::new(&config.log_level);
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }

    let encryptor = ConfigEncryptor::from_key(&config.encryption_key_bytes());
    let catalog = CatalogVersion::from_flag(config.use_consolidated_mcp_tools);

    let cache = Cache::new();
    if config.enable_cache {
        cache.connect();
    }

    let tenant_registry = Arc::new(InMemoryTenantRegistry::new(Vec::new()));

    let state = Arc::new(AppState {
        rate_limiter: RateLimiter::with_limits(config.rate_limit_minute as usize, config.rate_limit_hour as usize),
        cache,
        tenant_registry: tenant_registry.clone(),
        tenant_admin: tenant_registry,
        ticket_store: Arc::new(InMemoryTicketStore::new()),
        analytics_store: Arc::new(EmptyAnalyticsStore),
        phone_lookup: Arc::new(NoopPhoneLookup),
        language_adapter: Arc::new(UnavailableLanguageAdapter),
        query_adapter: Arc::new(UnavailableQueryAdapter),
        tool_dispatcher: Arc::new(UnavailableDispatcher),
        catalog,
        encryptor,
        config,
    });

    let addr = "0.0.0.0:8080";
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "supportgate-api listening");

    let app = supportgate_api::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
