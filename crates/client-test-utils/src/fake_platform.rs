//! Scriptable `MediaPlatform` for coordinator tests.
//!
//! Behaves like a browser with a fixed device set. Failures are scripted
//! per call (`fail_next_get_user_media`) or per device (`with_unavailable_device`).

use crate::ledger::TrackLedger;
use async_trait::async_trait;
use meeting_client::errors::CaptureError;
use meeting_client::platform::{
    AudioAnalyser, DeviceInfo, DeviceKind, MediaConstraints, MediaPlatform, MediaStream,
    MediaTrack, PermissionName, PermissionState, PlatformCapabilities, TrackConstraint, TrackKind,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capabilities of a modern browser on an https page.
pub fn full_capabilities() -> PlatformCapabilities {
    PlatformCapabilities {
        media_devices: true,
        get_user_media: true,
        enumerate_devices: true,
        get_display_media: true,
        audio_context: true,
        webrtc: true,
        permissions_api: true,
        secure_context: true,
        protocol: "https:".to_string(),
    }
}

pub struct FakePlatform {
    ledger: Arc<TrackLedger>,
    devices: Vec<DeviceInfo>,
    capabilities: PlatformCapabilities,
    permissions: HashMap<PermissionName, PermissionState>,
    scripted_failures: Mutex<VecDeque<CaptureError>>,
    unavailable: HashMap<String, CaptureError>,
    get_user_media_delay: Option<Duration>,
    enumerate_error: Option<CaptureError>,
    analyser_bins: Option<Vec<u8>>,
    get_user_media_calls: AtomicUsize,
    constraints_seen: Mutex<Vec<MediaConstraints>>,
}

impl FakePlatform {
    pub fn builder() -> FakePlatformBuilder {
        FakePlatformBuilder::default()
    }

    pub fn ledger(&self) -> Arc<TrackLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn get_user_media_calls(&self) -> usize {
        self.get_user_media_calls.load(Ordering::SeqCst)
    }

    /// Constraints of every `get_user_media` call, in order.
    pub fn constraints_seen(&self) -> Vec<MediaConstraints> {
        self.constraints_seen.lock().unwrap().clone()
    }

    fn first_device(&self, kind: DeviceKind) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.kind == kind)
    }

    fn resolve(
        &self,
        kind: TrackKind,
        constraint: &TrackConstraint,
    ) -> Result<Option<String>, CaptureError> {
        match constraint {
            TrackConstraint::Disabled => Ok(None),
            TrackConstraint::Any => self
                .first_device(kind.device_kind())
                .map(|d| Some(d.device_id.clone()))
                .ok_or_else(|| {
                    CaptureError::from_platform("NotFoundError", "Requested device not found")
                }),
            TrackConstraint::Device(id) => {
                if let Some(err) = self.unavailable.get(id) {
                    return Err(err.clone());
                }
                let known = self
                    .devices
                    .iter()
                    .any(|d| d.kind == kind.device_kind() && &d.device_id == id);
                if known {
                    Ok(Some(id.clone()))
                } else {
                    Err(CaptureError::from_platform(
                        "OverconstrainedError",
                        "No device matches the deviceId constraint",
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl MediaPlatform for FakePlatform {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.get_user_media_calls.fetch_add(1, Ordering::SeqCst);
        self.constraints_seen
            .lock()
            .unwrap()
            .push(constraints.clone());

        if let Some(delay) = self.get_user_media_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted_failures.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }

        let video = self.resolve(TrackKind::Video, &constraints.video)?;
        let audio = self.resolve(TrackKind::Audio, &constraints.audio)?;

        let mut tracks: Vec<Arc<dyn MediaTrack>> = Vec::new();
        if let Some(id) = video {
            tracks.push(self.ledger.open_track(TrackKind::Video, &id));
        }
        if let Some(id) = audio {
            tracks.push(self.ledger.open_track(TrackKind::Audio, &id));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        match &self.enumerate_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.devices.clone()),
        }
    }

    async fn query_permission(&self, name: PermissionName) -> PermissionState {
        self.permissions
            .get(&name)
            .copied()
            .unwrap_or(PermissionState::Prompt)
    }

    fn create_analyser(
        &self,
        stream: &MediaStream,
    ) -> Result<Box<dyn AudioAnalyser>, CaptureError> {
        if !stream.has_kind(TrackKind::Audio) {
            return Err(CaptureError::from_platform(
                "InvalidStateError",
                "Stream has no audio track",
            ));
        }
        match &self.analyser_bins {
            Some(bins) => Ok(self.ledger.open_analyser(bins.clone())),
            None => Err(CaptureError::from_platform(
                "NotSupportedError",
                "AudioContext is not available",
            )),
        }
    }

    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities.clone()
    }
}

/// Builder for [`FakePlatform`].
pub struct FakePlatformBuilder {
    ledger: Option<Arc<TrackLedger>>,
    devices: Vec<DeviceInfo>,
    capabilities: PlatformCapabilities,
    permissions: HashMap<PermissionName, PermissionState>,
    scripted_failures: VecDeque<CaptureError>,
    unavailable: HashMap<String, CaptureError>,
    get_user_media_delay: Option<Duration>,
    enumerate_error: Option<CaptureError>,
    analyser_bins: Option<Vec<u8>>,
}

impl Default for FakePlatformBuilder {
    fn default() -> Self {
        Self {
            ledger: None,
            devices: Vec::new(),
            capabilities: full_capabilities(),
            permissions: HashMap::new(),
            scripted_failures: VecDeque::new(),
            unavailable: HashMap::new(),
            get_user_media_delay: None,
            enumerate_error: None,
            // Half scale: a level of 50.
            analyser_bins: Some(vec![64; 128]),
        }
    }
}

impl FakePlatformBuilder {
    /// Share an existing ledger instead of creating one.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<TrackLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_permission(mut self, name: PermissionName, state: PermissionState) -> Self {
        self.permissions.insert(name, state);
        self
    }

    /// Fail the next unscripted `get_user_media` call with a platform error.
    /// Calls queue up in order.
    #[must_use]
    pub fn fail_next_get_user_media(mut self, name: &str) -> Self {
        self.scripted_failures
            .push_back(CaptureError::from_platform(name, "scripted failure"));
        self
    }

    /// Exact-device requests for `device_id` fail with `name`.
    #[must_use]
    pub fn with_unavailable_device(mut self, device_id: &str, name: &str) -> Self {
        self.unavailable.insert(
            device_id.to_string(),
            CaptureError::from_platform(name, "device unavailable"),
        );
        self
    }

    #[must_use]
    pub fn with_get_user_media_delay(mut self, delay: Duration) -> Self {
        self.get_user_media_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn failing_enumerate(mut self, name: &str) -> Self {
        self.enumerate_error = Some(CaptureError::from_platform(name, "enumeration failed"));
        self
    }

    #[must_use]
    pub fn with_analyser_bins(mut self, bins: Vec<u8>) -> Self {
        self.analyser_bins = Some(bins);
        self
    }

    #[must_use]
    pub fn without_analyser(mut self) -> Self {
        self.analyser_bins = None;
        self
    }

    pub fn build(self) -> FakePlatform {
        FakePlatform {
            ledger: self.ledger.unwrap_or_default(),
            devices: self.devices,
            capabilities: self.capabilities,
            permissions: self.permissions,
            scripted_failures: Mutex::new(self.scripted_failures),
            unavailable: self.unavailable,
            get_user_media_delay: self.get_user_media_delay,
            enumerate_error: self.enumerate_error,
            analyser_bins: self.analyser_bins,
            get_user_media_calls: AtomicUsize::new(0),
            constraints_seen: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_devices;

    #[tokio::test]
    async fn test_combined_request_opens_first_devices() {
        let platform = FakePlatform::builder().with_devices(default_devices()).build();

        let stream = platform
            .get_user_media(&MediaConstraints::combined())
            .await
            .unwrap();

        assert_eq!(stream.device_id(TrackKind::Video).as_deref(), Some("cam-1"));
        assert_eq!(stream.device_id(TrackKind::Audio).as_deref(), Some("mic-1"));
        assert_eq!(platform.ledger().live_tracks(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let platform = FakePlatform::builder()
            .with_devices(default_devices())
            .fail_next_get_user_media("NotAllowedError")
            .build();

        let err = platform
            .get_user_media(&MediaConstraints::combined())
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        assert!(platform
            .get_user_media(&MediaConstraints::combined())
            .await
            .is_ok());
        assert_eq!(platform.get_user_media_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_kind_is_not_found() {
        let platform = FakePlatform::builder().build();

        let err = platform
            .get_user_media(&MediaConstraints::any(TrackKind::Video))
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::NotFound { .. }));
        assert_eq!(platform.ledger().live_tracks(), 0);
    }
}
