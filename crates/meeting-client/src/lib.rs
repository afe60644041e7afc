//! Meeting client library.
//!
//! Client half of session establishment: once a join has produced session
//! credentials, the [`coordinator`] negotiates camera and microphone access
//! before media exchange starts.
//!
//! # Modules
//!
//! - `platform` - Capture platform abstraction (devices, tracks, streams)
//! - `coordinator` - Device acquisition state machine and actor
//! - `meter` - Audio level metering
//! - `capability` - Read-only capability and permission probe
//! - `session_client` - HTTP client for the session service
//! - `config` - Coordinator configuration
//! - `errors` - Capture and client error types

pub mod capability;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod meter;
pub mod platform;
pub mod session_client;

pub use capability::{CapabilityProbe, CapabilityReport, Diagnostic, Severity};
pub use config::CoordinatorConfig;
pub use coordinator::{
    CoordinatorSnapshot, CoordinatorState, DeviceCoordinator, DeviceCoordinatorHandle, Transition,
};
pub use errors::{CaptureCategory, CaptureError, CoordinatorError, SessionClientError};
pub use session_client::SessionClient;
