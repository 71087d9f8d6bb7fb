use std::{env, net::SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use zanzibar_core::{DatabaseConfig, EngineConfig};
use zanzibar_server::{create_app, ZanzibarServer};

/// Zanzibar authorization HTTP server
#[derive(Parser, Debug)]
#[command(name = "zanzibar-server")]
#[command(about = "Relationship-based authorization API server")]
struct Args {
    /// Server bind address
    #[arg(long, env = "ZANZIBAR_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(short, long, env = "ZANZIBAR_PORT", default_value = "8080")]
    port: u16,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Keep tuples in process memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,

    /// Apply database migrations on startup
    #[arg(long)]
    migrate: bool,

    /// Maximum traversal depth per request
    #[arg(long, env = "ZANZIBAR_MAX_DEPTH")]
    max_depth: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("Starting Zanzibar authorization server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = EngineConfig::from_env()?;
    if let Some(max_depth) = args.max_depth {
        config = config.with_max_depth(max_depth);
    }

    let server = if args.in_memory {
        warn!("Using in-memory tuple store; all data is lost on shutdown");
        ZanzibarServer::in_memory(config)?
    } else {
        let mut database = DatabaseConfig::from_env()?;
        if let Some(url) = &args.database_url {
            database = database.with_url(url);
        }
        info!("Connecting to PostgreSQL (max_connections={})", database.max_connections);
        ZanzibarServer::with_postgres(&database, config, args.migrate)
            .await
            .context("Failed to initialize PostgreSQL tuple store")?
    };

    let guards = server.engine.config();
    info!(
        "Traversal guards: max_depth={}, max_visited={}",
        guards.max_depth, guards.max_visited
    );

    let app = create_app(server);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Zanzibar server running on http://{}", addr);
    info!("Health check available at: http://{}/health", addr);
    info!("API v1 available at: http://{}/api/v1", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let is_development =
        env::var("ZANZIBAR_ENV").unwrap_or_else(|_| "development".to_string()) == "development";

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "zanzibar_server={level},zanzibar_core={level},tower_http=info,sqlx=warn",
            level = level
        )
        .into()
    });

    if is_development {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .pretty(),
            )
            .init();
    } else {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
