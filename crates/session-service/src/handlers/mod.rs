//! HTTP request handlers for the session service.

pub mod health;
pub mod logs;
pub mod meetings;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use logs::ingest_logs;
pub use meetings::{end_meeting, get_attendee, join_meeting};
pub use metrics::metrics_handler;
