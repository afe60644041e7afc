//! Service layer for the session service.
//!
//! # Components
//!
//! - `provider_client` - HTTP client for the conferencing provider
//! - `meeting_registry` - Title-keyed meeting registry with per-title creation locks
//! - `attendee_issuer` - Mints an attendee on every join
//! - `session_teardown` - Ends a meeting at the provider, then locally

pub mod attendee_issuer;
pub mod meeting_registry;
pub mod provider_client;
pub mod session_teardown;

pub use attendee_issuer::{AttendeeIssuer, JoinOutcome};
pub use meeting_registry::{MeetingParams, MeetingRegistry, ResolvedMeeting};
pub use provider_client::{HttpProviderClient, ProviderClient};
pub use session_teardown::SessionTeardown;
