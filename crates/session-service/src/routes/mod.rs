//! HTTP routes for the session service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::repositories::MeetingStore;
use crate::services::{AttendeeIssuer, MeetingRegistry, ProviderClient, SessionTeardown};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Title-keyed meeting registry.
    pub registry: Arc<MeetingRegistry>,

    pub issuer: AttendeeIssuer,

    pub teardown: SessionTeardown,
}

impl AppState {
    /// Wire the registry, issuer and teardown around one store and provider.
    pub fn new(
        config: Config,
        store: Arc<dyn MeetingStore>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        let registry = Arc::new(MeetingRegistry::new(store, Arc::clone(&provider)));
        let issuer = AttendeeIssuer::new(
            Arc::clone(&registry),
            Arc::clone(&provider),
            config.default_media_region.clone(),
        );
        let teardown = SessionTeardown::new(Arc::clone(&registry), provider);

        Self {
            config,
            registry,
            issuer,
            teardown,
        }
    }
}

/// Build the application routes.
///
/// - `POST /join`, `POST /end`, `GET /attendee` - session API
/// - `POST /logs` - client log sink
/// - `/health`, `/ready`, `/metrics` - operational endpoints
///
/// Layer order (outermost first): metrics, timeout, trace.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let session_routes = Router::new()
        .route("/join", post(handlers::join_meeting))
        .route("/end", post(handlers::end_meeting))
        .route("/attendee", get(handlers::get_attendee))
        .route("/logs", post(handlers::ingest_logs))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    session_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}
