//! Device acquisition coordinator.
//!
//! Negotiates camera and microphone access after a join. The coordinator is
//! an actor: one tokio task per mounted client, driven through a
//! [`DeviceCoordinatorHandle`].
//!
//! # Flow
//!
//! 1. `Idle -> RequestingPermission`: combined audio+video probe, stopped at once
//! 2. `-> Enumerating`: list devices through the [`DeviceManager`], bounded by
//!    the enumeration timeout
//! 3. `-> SelectingDefault -> Active`: start the first device of each kind
//! 4. Any stall or device failure on the way diverts to `FallbackDirect`,
//!    which captures straight from the [`MediaPlatform`]
//!
//! Observers see every change through [`DeviceCoordinatorHandle::subscribe`]
//! (latest snapshot) and [`DeviceCoordinatorHandle::transitions`] (ordered log).
//!
//! [`DeviceManager`]: crate::platform::DeviceManager
//! [`MediaPlatform`]: crate::platform::MediaPlatform

mod actor;
pub mod state;

pub use actor::{DeviceCoordinator, DeviceCoordinatorHandle};
pub use state::{
    transition, CoordinatorEvent, CoordinatorState, EnumerationFailure, InvalidTransition,
    Transition,
};

use crate::errors::CaptureError;
use crate::platform::{DeviceInfo, DeviceKind};

/// Observable coordinator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    pub state: CoordinatorState,

    pub video_devices: Vec<DeviceInfo>,
    pub audio_input_devices: Vec<DeviceInfo>,
    pub audio_output_devices: Vec<DeviceInfo>,

    pub selected_video: Option<String>,
    pub selected_audio_input: Option<String>,
    pub selected_audio_output: Option<String>,

    /// A capture stream is attached for the kind.
    pub video_attached: bool,
    pub audio_attached: bool,

    pub video_muted: bool,
    pub audio_muted: bool,

    /// Most recent capture error. Cleared when the coordinator becomes active.
    pub error: Option<CaptureError>,
}

impl Default for CoordinatorSnapshot {
    fn default() -> Self {
        Self {
            state: CoordinatorState::Idle,
            video_devices: Vec::new(),
            audio_input_devices: Vec::new(),
            audio_output_devices: Vec::new(),
            selected_video: None,
            selected_audio_input: None,
            selected_audio_output: None,
            video_attached: false,
            audio_attached: false,
            video_muted: false,
            audio_muted: false,
            error: None,
        }
    }
}

impl CoordinatorSnapshot {
    pub fn devices(&self, kind: DeviceKind) -> &[DeviceInfo] {
        match kind {
            DeviceKind::VideoInput => &self.video_devices,
            DeviceKind::AudioInput => &self.audio_input_devices,
            DeviceKind::AudioOutput => &self.audio_output_devices,
        }
    }

    pub fn selected(&self, kind: DeviceKind) -> Option<&str> {
        match kind {
            DeviceKind::VideoInput => self.selected_video.as_deref(),
            DeviceKind::AudioInput => self.selected_audio_input.as_deref(),
            DeviceKind::AudioOutput => self.selected_audio_output.as_deref(),
        }
    }

    /// No acquisition is in progress: the coordinator is active, failed,
    /// released, or resting in fallback with a stream attached.
    pub fn is_settled(&self) -> bool {
        match self.state {
            CoordinatorState::Active | CoordinatorState::Failed | CoordinatorState::Released => {
                true
            }
            CoordinatorState::FallbackDirect => self.video_attached || self.audio_attached,
            _ => false,
        }
    }

    /// User-facing message for the current error, with remediation if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e.remediation() {
            Some(hint) => format!("{e}. {hint}"),
            None => e.to_string(),
        })
    }
}
