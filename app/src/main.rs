//! Marketplace HTTP server.
//!
//! Bookings, checkout, payment reconciliation and settlements over Postgres
//! and the payment gateway.

use anyhow::Context;
use marketplace::{
    Collaborators, Config, PaymentPolicy,
    gateway::PaystackClient,
    metrics::register_business_metrics,
    notifier::LogNotifier,
    server::{AppState, routes::build_router_with},
};
use marketplace_core::environment::SystemClock;
use marketplace_postgres::PostgresStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting marketplace server");

    // Load configuration
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    let fee_bearer = config.fee_bearer()?;
    info!(
        server = %config.server_addr(),
        metrics = %config.metrics_addr(),
        gateway = %config.gateway.base_url,
        fee_bearer = %fee_bearer,
        "Configuration loaded"
    );

    // Prometheus exporter on its own port
    let metrics_addr: SocketAddr = config.metrics_addr().parse().context("invalid metrics address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    register_business_metrics();

    // Store
    info!("Connecting to database...");
    let store = Arc::new(
        PostgresStore::connect(&config.postgres.url, config.postgres.max_connections)
            .await
            .context("failed to connect to database")?,
    );
    store.migrate().await.context("failed to run migrations")?;
    info!("Database ready");

    // Collaborators
    let gateway = Arc::new(PaystackClient::new(&config.gateway).context("failed to build gateway client")?);
    let ports = Collaborators::with_store(
        store.clone(),
        store,
        gateway,
        Arc::new(LogNotifier::new()),
        Arc::new(SystemClock),
    );
    let policy = PaymentPolicy {
        fee_bearer,
        currency: config.gateway.currency.clone(),
        callback_url: config.gateway.callback_url.clone(),
    };
    let state = AppState::new(&ports, policy, &config.gateway.secret_key);
    let app = build_router_with(state, config.server.body_limit);

    let addr = config.server_addr();
    info!(address = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
