//! Observability for the session service.
//!
//! - `metrics` - Prometheus metric definitions and recorder setup

pub mod metrics;
