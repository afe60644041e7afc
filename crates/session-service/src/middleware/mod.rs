//! Middleware for the session service.
//!
//! - `http_metrics` - Records method, endpoint, status and latency for every response

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
