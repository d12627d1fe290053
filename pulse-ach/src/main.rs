//! Achievement service (pulse-ach) - Main entry point
//!
//! Serves the record write path, achievement reads and the notification
//! WebSocket, and runs the write-triggered and periodic reconciliation tasks.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::db::init_database;
use pulse_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pulse_ach::catalog::BadgeCatalog;
use pulse_ach::config::{Args, ServiceConfig};
use pulse_ach::notify::ConnectionRegistry;
use pulse_ach::triggers::{ReconcileTrigger, SafetyNetSweep};
use pulse_ach::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve configuration first: the log level lives in the TOML file
    let config_path = args.config_path();
    let config = ServiceConfig::resolve(&args).context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Pulse Achievement Service (pulse-ach) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        Some(path) => warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        ),
        None => warn!("No config directory available, using compiled defaults"),
    }
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let catalog = Arc::new(BadgeCatalog::standard().context("Invalid badge catalog")?);
    info!("Badge catalog loaded: {} badges", catalog.len());

    let events = Arc::new(EventBus::new(config.achievements.event_bus_capacity));
    let registry = Arc::new(ConnectionRegistry::new(config.achievements.subscriber_buffer));
    let state = AppState::new(pool, catalog, registry, Arc::clone(&events));

    // Background reconciliation
    let cancel = CancellationToken::new();
    let trigger = ReconcileTrigger::new(
        Arc::clone(&state.reconciler),
        &events,
        config.reconcile_timeout(),
    )
    .spawn(cancel.clone());
    let sweep = SafetyNetSweep::new(
        Arc::clone(&state.reconciler),
        config.sweep_interval(),
        config.reconcile_timeout(),
    )
    .spawn(cancel.clone());

    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("pulse-ach listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    let _ = tokio::join!(trigger, sweep);

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
