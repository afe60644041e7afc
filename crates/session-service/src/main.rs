//! Session Service
//!
//! HTTP entry point for meeting join, end and attendee lookup.

use session_service::config::Config;
use session_service::observability::metrics::init_metrics_recorder;
use session_service::repositories::InMemoryMeetingStore;
use session_service::routes::{self, AppState};
use session_service::services::HttpProviderClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Session Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        default_media_region = %config.default_media_region,
        provider_api_url = %config.provider_api_url,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let provider = HttpProviderClient::new(
        config.provider_api_url.clone(),
        config.provider_api_key.clone(),
        Duration::from_secs(config.provider_timeout_seconds),
    )?;

    let bind_address = config.bind_address.clone();
    let drain = Duration::from_secs(config.drain_seconds);

    let state = Arc::new(AppState::new(
        config,
        Arc::new(InMemoryMeetingStore::new()),
        Arc::new(provider),
    ));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Session Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain))
    .await?;

    info!("Session Service shutdown complete");

    Ok(())
}

/// Resolves once SIGINT or SIGTERM has arrived and `drain` has elapsed.
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain.is_zero() {
        info!("Skipping drain period");
        return;
    }

    warn!(drain_seconds = drain.as_secs(), "Draining in-flight requests");
    tokio::time::sleep(drain).await;
    info!("Drain period complete");
}
