//! Types shared between the session service and meeting clients.

#![warn(clippy::pedantic)]

/// Wire schemas exchanged over the session HTTP API
pub mod types;

/// Secret types that prevent accidental logging
pub mod secret;
