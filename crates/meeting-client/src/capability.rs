//! Read-only capability and permission probe.
//!
//! Reports what the page can do before any capture is attempted and turns
//! that into user-facing diagnostics. The probe never touches coordinator
//! state.

use crate::platform::{
    partition_devices, MediaConstraints, MediaPlatform, PermissionName, PermissionState,
    PlatformCapabilities, TrackKind,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            message: message.to_string(),
        }
    }
}

/// Everything the probe learned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReport {
    pub capabilities: PlatformCapabilities,
    pub camera_permission: PermissionState,
    pub microphone_permission: PermissionState,
    /// `None` if enumeration is unsupported or failed.
    pub video_input_count: Option<usize>,
    pub audio_input_count: Option<usize>,
    pub audio_output_count: Option<usize>,
}

impl CapabilityReport {
    /// Capture can be attempted: the API exists, the context is secure and
    /// neither permission is denied.
    pub fn ready_for_capture(&self) -> bool {
        self.capabilities.media_devices
            && self.capabilities.get_user_media
            && self.capabilities.secure_context
            && self.camera_permission != PermissionState::Denied
            && self.microphone_permission != PermissionState::Denied
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if !self.capabilities.secure_context {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "HTTPS required: camera/microphone access requires a secure context",
            ));
        }
        if !self.capabilities.media_devices {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "Unsupported browser: MediaDevices API is not supported",
            ));
        }
        if self.camera_permission == PermissionState::Denied {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "Camera blocked: camera access is denied. Check browser settings",
            ));
        }
        if self.microphone_permission == PermissionState::Denied {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "Microphone blocked: microphone access is denied. Check browser settings",
            ));
        }
        if self.video_input_count == Some(0) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "No camera: no video input devices detected",
            ));
        }
        if self.audio_input_count == Some(0) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "No microphone: no audio input devices detected",
            ));
        }
        if self.ready_for_capture() {
            diagnostics.push(Diagnostic::new(
                Severity::Ok,
                "Good to go: media APIs are supported and permissions look good",
            ));
        }

        diagnostics
    }

    /// Worst severity among the diagnostics.
    pub fn severity(&self) -> Severity {
        self.diagnostics()
            .iter()
            .map(|d| d.severity)
            .max()
            .unwrap_or(Severity::Ok)
    }
}

/// Outcome of a one-off access test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCheck {
    pub kind: &'static str,
    pub granted: bool,
    pub message: String,
}

pub struct CapabilityProbe {
    platform: Arc<dyn MediaPlatform>,
}

impl CapabilityProbe {
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self { platform }
    }

    #[instrument(skip_all, name = "client.capability.probe")]
    pub async fn run(&self) -> CapabilityReport {
        let capabilities = self.platform.capabilities();

        let (camera_permission, microphone_permission) = if capabilities.permissions_api {
            (
                self.platform.query_permission(PermissionName::Camera).await,
                self.platform.query_permission(PermissionName::Microphone).await,
            )
        } else {
            (PermissionState::Unknown, PermissionState::Unknown)
        };

        let counts = if capabilities.enumerate_devices {
            match self.platform.enumerate_devices().await {
                Ok(devices) => {
                    let (video, audio_in, audio_out) = partition_devices(devices);
                    Some((video.len(), audio_in.len(), audio_out.len()))
                }
                Err(e) => {
                    debug!(target: "client.capability", error = %e, "Device enumeration failed");
                    None
                }
            }
        } else {
            None
        };

        let report = CapabilityReport {
            capabilities,
            camera_permission,
            microphone_permission,
            video_input_count: counts.map(|c| c.0),
            audio_input_count: counts.map(|c| c.1),
            audio_output_count: counts.map(|c| c.2),
        };

        debug!(
            target: "client.capability",
            ready = report.ready_for_capture(),
            camera = %report.camera_permission,
            microphone = %report.microphone_permission,
            "Capability probe complete"
        );

        report
    }

    /// Briefly open one kind of capture and release it at once.
    pub async fn check_access(&self, kind: TrackKind) -> AccessCheck {
        let label = match kind {
            TrackKind::Video => "Camera",
            TrackKind::Audio => "Microphone",
        };

        match self.platform.get_user_media(&MediaConstraints::any(kind)).await {
            Ok(mut stream) => {
                stream.stop();
                AccessCheck {
                    kind: label,
                    granted: true,
                    message: format!("{label} access successful"),
                }
            }
            Err(e) => AccessCheck {
                kind: label,
                granted: false,
                message: format!(
                    "{label} access failed: {} - {e}",
                    e.platform_name().unwrap_or("Unknown")
                ),
            },
        }
    }
}
