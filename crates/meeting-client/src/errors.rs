//! Meeting client error types.
//!
//! Capture errors carry the platform's error name and are classified into
//! the handful of categories the coordinator acts on. The `Display` form is
//! the message shown to the user.

use crate::coordinator::state::{CoordinatorState, InvalidTransition};
use thiserror::Error;

/// Shown alongside a permission denial.
pub const PERMISSION_REMEDIATION: &str =
    "Allow camera and microphone access in your browser settings, then reload the page.";

/// How the coordinator reacts to a capture error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCategory {
    /// The user or browser refused access. Terminal.
    PermissionDenied,
    /// The device is missing, busy or failed in some other way.
    DeviceUnavailable,
    /// A device operation exceeded its deadline.
    Timeout,
}

/// Error from the capture platform or device manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Camera/microphone access denied")]
    PermissionDenied { name: String, message: String },

    #[error("No camera or microphone found")]
    NotFound { name: String, message: String },

    #[error("Camera or microphone is already in use by another application")]
    Busy { name: String, message: String },

    #[error("Device operation timed out")]
    Timeout,

    #[error("Failed to access camera or microphone: {message}")]
    Other { name: String, message: String },
}

impl CaptureError {
    /// Classify a platform error by its name.
    ///
    /// ```
    /// use meeting_client::errors::{CaptureCategory, CaptureError};
    ///
    /// let err = CaptureError::from_platform("NotReadableError", "Could not start video source");
    /// assert_eq!(err.category(), CaptureCategory::DeviceUnavailable);
    /// assert!(matches!(err, CaptureError::Busy { .. }));
    /// ```
    pub fn from_platform(name: &str, message: impl Into<String>) -> Self {
        let name_owned = name.to_string();
        let message = message.into();
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                Self::PermissionDenied {
                    name: name_owned,
                    message,
                }
            }
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => Self::NotFound {
                name: name_owned,
                message,
            },
            "NotReadableError" | "TrackStartError" | "AbortError" => Self::Busy {
                name: name_owned,
                message,
            },
            _ => Self::Other {
                name: name_owned,
                message,
            },
        }
    }

    pub fn category(&self) -> CaptureCategory {
        match self {
            Self::PermissionDenied { .. } => CaptureCategory::PermissionDenied,
            Self::NotFound { .. } | Self::Busy { .. } | Self::Other { .. } => {
                CaptureCategory::DeviceUnavailable
            }
            Self::Timeout => CaptureCategory::Timeout,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.category() == CaptureCategory::PermissionDenied
    }

    /// The platform error name, if the error came from the platform.
    pub fn platform_name(&self) -> Option<&str> {
        match self {
            Self::PermissionDenied { name, .. }
            | Self::NotFound { name, .. }
            | Self::Busy { name, .. }
            | Self::Other { name, .. } => Some(name),
            Self::Timeout => None,
        }
    }

    /// What the user can do about it, when there is something to do.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::PermissionDenied { .. } => Some(PERMISSION_REMEDIATION),
            Self::Busy { .. } => {
                Some("Close other applications that use the camera or microphone and try again.")
            }
            _ => None,
        }
    }
}

/// Errors returned by [`crate::coordinator::DeviceCoordinatorHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// The operation needs attached streams.
    #[error("Coordinator is not ready for device changes (state: {0:?})")]
    NotReady(CoordinatorState),

    #[error("Coordinator stopped")]
    Stopped,
}

/// Errors from [`crate::session_client::SessionClient`].
#[derive(Debug, Error)]
pub enum SessionClientError {
    /// The service answered with an error body.
    #[error("Session service returned {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Session service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid session service URL: {0}")]
    InvalidUrl(String),
}

impl SessionClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidUrl(_) => None,
        }
    }
}
