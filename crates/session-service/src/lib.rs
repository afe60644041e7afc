//! Session Service Library
//!
//! Turns a meeting title into a provider meeting and issues attendees for
//! it. The conferencing provider owns all media; this service only manages
//! session handles.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Request schemas and registry records
//! - `observability` - Prometheus metrics
//! - `repositories` - Meeting store
//! - `routes` - Axum router setup
//! - `services` - Provider client, registry, issuer, teardown

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
