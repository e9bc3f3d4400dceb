//! Operator CLI — provisioning tool for the support intelligence gateway.
//!
//! Talks to a running gateway's `X-Admin-Key`-guarded `/api/admin` surface
//! over HTTP; it holds no direct access to the tenant store.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// supportgate-admin: provisioning CLI for the support intelligence gateway
#[derive(Parser, Debug)]
#[command(name = "supportgate-admin", version, about, long_about = None)]
struct Cli {
    /// Base URL of the running gateway
    #[arg(long, env = "GATEWAY_URL", default_value = "http://localhost:8080")]
    gateway_url: String,

    /// Admin key (matches the gateway's `ADMIN_KEY`)
    #[arg(long, env = "ADMIN_KEY")]
    admin_key: String,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },
    /// Inspect rate-limiter and cache counters
    Counters,
}

#[derive(Subcommand, Debug)]
enum TenantAction {
    /// Create a new tenant
    Create {
        slug: String,
        name: String,
        #[arg(long)]
        crm_provider: String,
        #[arg(long)]
        webhook_secret: String,
        #[arg(long)]
        api_key: String,
        #[arg(long, default_value = "production")]
        environment: String,
    },
    /// List all tenants
    List,
    /// Rotate a tenant's encrypted CRM config
    RotateCrmConfig {
        tenant_id: uuid::Uuid,
        #[arg(long)]
        webhook_secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter)).with_target(false).init();

    let client = commands::AdminClient::new(cli.gateway_url, cli.admin_key);

    match cli.command {
        Commands::Tenant { action } => commands::handle_tenant(&client, action).await,
        Commands::Counters => commands::handle_counters(&client).await,
    }
}
