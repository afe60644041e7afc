//! Device acquisition states and the transition function.
//!
//! Every legal state change is listed in [`transition`]. The actor applies
//! events through it and never assigns a state directly.

use crate::errors::{CaptureCategory, CaptureError};
use crate::platform::DeviceKind;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    Idle,
    RequestingPermission,
    Enumerating,
    SelectingDefault,
    Active,
    Failed,
    FallbackDirect,
    Released,
}

impl CoordinatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RequestingPermission => "requesting_permission",
            Self::Enumerating => "enumerating",
            Self::SelectingDefault => "selecting_default",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::FallbackDirect => "fallback_direct",
            Self::Released => "released",
        }
    }

    /// States in which streams may be attached and devices switched.
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Active | Self::FallbackDirect)
    }
}

/// Why the device manager path was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationFailure {
    /// All three lists came back empty.
    Empty,
    /// The lists did not arrive within the deadline.
    Timeout,
    /// The device manager returned an error.
    Error(CaptureError),
    /// No device manager was supplied.
    NoDeviceManager,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Mount: begin the combined permission request.
    Start,
    PermissionGranted,
    PermissionRefused(CaptureError),
    DevicesListed,
    EnumerationFailed(EnumerationFailure),
    StreamsAttached,
    SelectionFailed(CaptureError),
    /// The direct capture stream is attached.
    FallbackAcquired,
    FallbackFailed(CaptureError),
    DeviceSwitched(DeviceKind),
    SwitchFailed(DeviceKind, CaptureError),
    Release,
}

impl CoordinatorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PermissionGranted => "permission_granted",
            Self::PermissionRefused(_) => "permission_refused",
            Self::DevicesListed => "devices_listed",
            Self::EnumerationFailed(_) => "enumeration_failed",
            Self::StreamsAttached => "streams_attached",
            Self::SelectionFailed(_) => "selection_failed",
            Self::FallbackAcquired => "fallback_acquired",
            Self::FallbackFailed(_) => "fallback_failed",
            Self::DeviceSwitched(_) => "device_switched",
            Self::SwitchFailed(..) => "switch_failed",
            Self::Release => "release",
        }
    }

    /// The capture error carried by the event, if any.
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::PermissionRefused(e)
            | Self::SelectionFailed(e)
            | Self::FallbackFailed(e)
            | Self::SwitchFailed(_, e)
            | Self::EnumerationFailed(EnumerationFailure::Error(e)) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid coordinator transition: {event} in state {from:?}")]
pub struct InvalidTransition {
    pub from: CoordinatorState,
    pub event: &'static str,
}

/// One applied transition, as published on the transition log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: CoordinatorState,
    pub to: CoordinatorState,
    pub event: CoordinatorEvent,
}

/// Compute the next state.
pub fn transition(
    state: CoordinatorState,
    event: &CoordinatorEvent,
) -> Result<CoordinatorState, InvalidTransition> {
    use CoordinatorEvent as E;
    use CoordinatorState as S;

    let next = match (state, event) {
        (_, E::Release) => S::Released,

        (S::Idle, E::Start) => S::RequestingPermission,

        (S::RequestingPermission, E::PermissionGranted) => S::Enumerating,
        (S::RequestingPermission, E::PermissionRefused(e)) => match e {
            CaptureError::PermissionDenied { .. } | CaptureError::NotFound { .. } => S::Failed,
            _ => S::FallbackDirect,
        },

        (S::Enumerating, E::DevicesListed) => S::SelectingDefault,
        (S::Enumerating, E::EnumerationFailed(_)) => S::FallbackDirect,

        (S::SelectingDefault, E::StreamsAttached) => S::Active,
        (S::SelectingDefault, E::SelectionFailed(e)) => {
            if e.category() == CaptureCategory::PermissionDenied {
                S::Failed
            } else {
                S::FallbackDirect
            }
        }

        (S::FallbackDirect, E::FallbackAcquired) => S::FallbackDirect,
        (S::FallbackDirect, E::FallbackFailed(_)) => S::Failed,

        (S::Active, E::DeviceSwitched(_)) => S::Active,
        (S::FallbackDirect, E::DeviceSwitched(_)) => S::FallbackDirect,
        (S::Active | S::FallbackDirect, E::SwitchFailed(_, e)) => {
            if e.is_permission_denied() {
                S::Failed
            } else {
                S::FallbackDirect
            }
        }

        (from, event) => {
            return Err(InvalidTransition {
                from,
                event: event.name(),
            })
        }
    };

    Ok(next)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use CoordinatorEvent as E;
    use CoordinatorState as S;

    fn denied() -> CaptureError {
        CaptureError::from_platform("NotAllowedError", "Permission denied")
    }

    fn not_found() -> CaptureError {
        CaptureError::from_platform("NotFoundError", "Requested device not found")
    }

    fn busy() -> CaptureError {
        CaptureError::from_platform("NotReadableError", "Could not start video source")
    }

    #[test]
    fn test_happy_path() {
        let mut state = S::Idle;
        for event in [
            E::Start,
            E::PermissionGranted,
            E::DevicesListed,
            E::StreamsAttached,
        ] {
            state = transition(state, &event).unwrap();
        }
        assert_eq!(state, S::Active);
    }

    #[test]
    fn test_permission_refusals() {
        assert_eq!(
            transition(S::RequestingPermission, &E::PermissionRefused(denied())).unwrap(),
            S::Failed
        );
        assert_eq!(
            transition(S::RequestingPermission, &E::PermissionRefused(not_found())).unwrap(),
            S::Failed
        );
        assert_eq!(
            transition(S::RequestingPermission, &E::PermissionRefused(busy())).unwrap(),
            S::FallbackDirect
        );
    }

    #[test]
    fn test_every_enumeration_failure_falls_back() {
        for failure in [
            EnumerationFailure::Empty,
            EnumerationFailure::Timeout,
            EnumerationFailure::Error(busy()),
            EnumerationFailure::NoDeviceManager,
        ] {
            assert_eq!(
                transition(S::Enumerating, &E::EnumerationFailed(failure)).unwrap(),
                S::FallbackDirect
            );
        }
    }

    #[test]
    fn test_selection_failures() {
        assert_eq!(
            transition(S::SelectingDefault, &E::SelectionFailed(not_found())).unwrap(),
            S::FallbackDirect
        );
        assert_eq!(
            transition(S::SelectingDefault, &E::SelectionFailed(denied())).unwrap(),
            S::Failed
        );
    }

    #[test]
    fn test_fallback_outcomes() {
        assert_eq!(
            transition(S::FallbackDirect, &E::FallbackAcquired).unwrap(),
            S::FallbackDirect
        );
        assert_eq!(
            transition(S::FallbackDirect, &E::FallbackFailed(denied())).unwrap(),
            S::Failed
        );
    }

    #[test]
    fn test_device_switch() {
        let switched = E::DeviceSwitched(DeviceKind::VideoInput);
        assert_eq!(transition(S::Active, &switched).unwrap(), S::Active);
        assert_eq!(
            transition(S::FallbackDirect, &switched).unwrap(),
            S::FallbackDirect
        );

        let unavailable = E::SwitchFailed(DeviceKind::AudioInput, busy());
        assert_eq!(
            transition(S::Active, &unavailable).unwrap(),
            S::FallbackDirect
        );

        let revoked = E::SwitchFailed(DeviceKind::AudioInput, denied());
        assert_eq!(transition(S::Active, &revoked).unwrap(), S::Failed);
    }

    #[test]
    fn test_release_from_any_state() {
        for state in [
            S::Idle,
            S::RequestingPermission,
            S::Enumerating,
            S::SelectingDefault,
            S::Active,
            S::Failed,
            S::FallbackDirect,
            S::Released,
        ] {
            assert_eq!(transition(state, &E::Release).unwrap(), S::Released);
        }
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let err = transition(S::Idle, &E::StreamsAttached).unwrap_err();
        assert_eq!(err.from, S::Idle);
        assert_eq!(err.event, "streams_attached");

        assert!(transition(S::Active, &E::Start).is_err());
        assert!(transition(S::Failed, &E::DeviceSwitched(DeviceKind::VideoInput)).is_err());
        assert!(transition(S::Released, &E::Start).is_err());
        assert!(transition(S::Enumerating, &E::FallbackAcquired).is_err());
    }
}
