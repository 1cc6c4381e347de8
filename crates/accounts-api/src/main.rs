//! Accounts API Server
//!
//! REST API server for user registration, authentication, and role-based
//! access control.

use accounts_api::{create_router, state::AppState};
use accounts_core::{AppConfig, LogFormat, MemoryDirectory, PgUserDirectory, UserDirectory};
use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Accounts API server
#[derive(Parser, Debug)]
#[command(name = "accounts-api", version, about)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, env = "ACCOUNTS_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host, overriding configuration
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overriding configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config);

    // The development secret is tolerated only when bound to loopback
    let strict = !is_loopback(&config.server.host);
    config.validate(strict)?;

    let directory = open_directory(&config).await?;
    let state = Arc::new(AppState::new(config.clone(), directory)?);

    let sweeper = state
        .rate_limiter
        .spawn_sweeper(config.rate_limit.sweep_interval());

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Accounts API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Accounts API Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "accounts_api={level},accounts_core={level},audit=info,tower_http=info",
            level = config.logging.level
        ))
    });

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn open_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
    let Some(url) = &config.database.url else {
        tracing::warn!("No database configured; users are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryDirectory::new()));
    };

    let directory = PgUserDirectory::connect(
        url,
        config.database.pool_size,
        config.database.timeout(),
    )
    .await
    .context("failed to connect to PostgreSQL")?;
    directory
        .ensure_schema()
        .await
        .context("failed to create users table")?;
    tracing::info!("Using PostgreSQL user directory");

    Ok(Arc::new(directory))
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "::1")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
