//! Capture platform abstraction.
//!
//! Two seams sit between the coordinator and the browser:
//!
//! - [`MediaPlatform`] - the raw capture API: `getUserMedia`,
//!   `enumerateDevices`, the Permissions API and analyser nodes
//! - [`DeviceManager`] - the conferencing SDK's higher-level device
//!   controller, which may be absent or stall
//!
//! Tracks are shared handles. A [`MediaStream`] owns a set of tracks and
//! stops all of them when it is dropped, so a dropped acquisition future
//! cannot leave a camera running.

use crate::errors::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Devices
// ============================================================================

/// Kind of media device, as reported by `enumerateDevices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoInput => "videoinput",
            Self::AudioInput => "audioinput",
            Self::AudioOutput => "audiooutput",
        }
    }

    /// Track kind captured from this device, `None` for outputs.
    pub fn track_kind(self) -> Option<TrackKind> {
        match self {
            Self::VideoInput => Some(TrackKind::Video),
            Self::AudioInput => Some(TrackKind::Audio),
            Self::AudioOutput => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    /// Empty until permission has been granted.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl DeviceInfo {
    pub fn new(device_id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            label: label.into(),
            group_id: None,
        }
    }
}

/// Split a raw device listing into (video inputs, audio inputs, audio outputs).
pub fn partition_devices(
    devices: Vec<DeviceInfo>,
) -> (Vec<DeviceInfo>, Vec<DeviceInfo>, Vec<DeviceInfo>) {
    let mut video = Vec::new();
    let mut audio_in = Vec::new();
    let mut audio_out = Vec::new();
    for device in devices {
        match device.kind {
            DeviceKind::VideoInput => video.push(device),
            DeviceKind::AudioInput => audio_in.push(device),
            DeviceKind::AudioOutput => audio_out.push(device),
        }
    }
    (video, audio_in, audio_out)
}

// ============================================================================
// Tracks and streams
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn device_kind(self) -> DeviceKind {
        match self {
            Self::Audio => DeviceKind::AudioInput,
            Self::Video => DeviceKind::VideoInput,
        }
    }
}

/// A live capture track (`MediaStreamTrack`).
///
/// `stop` releases the underlying device and must be idempotent.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    /// Device the track captures from, if the platform reports it.
    fn device_id(&self) -> Option<&str>;

    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// An owned set of capture tracks. Dropping the stream stops every track.
#[derive(Debug, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks_of(kind).next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Device of the first track of `kind`.
    pub fn device_id(&self, kind: TrackKind) -> Option<String> {
        self.tracks_of(kind)
            .find_map(|t| t.device_id().map(str::to_string))
    }

    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// Stop every track. The stream stays usable as an empty shell.
    pub fn stop(&mut self) {
        for track in self.tracks.drain(..) {
            track.stop();
        }
    }

    /// Split a combined stream into its (video, audio) parts.
    pub fn split(mut self) -> (MediaStream, MediaStream) {
        let (video, audio): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tracks)
            .into_iter()
            .partition(|t| t.kind() == TrackKind::Video);
        (MediaStream::new(video), MediaStream::new(audio))
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Per-kind capture constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackConstraint {
    /// Do not capture this kind.
    #[default]
    Disabled,
    /// Any device of this kind.
    Any,
    /// Exactly this device.
    Device(String),
}

impl TrackConstraint {
    pub fn is_requested(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Arguments to `getUserMedia`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub audio: TrackConstraint,
    pub video: TrackConstraint,
}

impl MediaConstraints {
    /// `{ audio: true, video: true }`
    pub fn combined() -> Self {
        Self {
            audio: TrackConstraint::Any,
            video: TrackConstraint::Any,
        }
    }

    /// Any device of one kind.
    pub fn any(kind: TrackKind) -> Self {
        Self::only(kind, TrackConstraint::Any)
    }

    /// One exact device.
    pub fn device(kind: TrackKind, device_id: impl Into<String>) -> Self {
        Self::only(kind, TrackConstraint::Device(device_id.into()))
    }

    fn only(kind: TrackKind, constraint: TrackConstraint) -> Self {
        match kind {
            TrackKind::Audio => Self {
                audio: constraint,
                video: TrackConstraint::Disabled,
            },
            TrackKind::Video => Self {
                audio: TrackConstraint::Disabled,
                video: constraint,
            },
        }
    }
}

// ============================================================================
// Permissions and capabilities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionName {
    Camera,
    Microphone,
}

/// Result of `navigator.permissions.query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    /// The Permissions API is missing or does not know the name.
    Unknown,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "prompt",
            Self::Unknown => "unknown",
        })
    }
}

/// Feature detection results for the page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCapabilities {
    pub media_devices: bool,
    pub get_user_media: bool,
    pub enumerate_devices: bool,
    pub get_display_media: bool,
    pub audio_context: bool,
    pub webrtc: bool,
    pub permissions_api: bool,
    pub secure_context: bool,
    /// Page protocol including the trailing colon, e.g. `https:`.
    pub protocol: String,
}

// ============================================================================
// Seams
// ============================================================================

/// Frequency-domain view of an audio track (`AnalyserNode`).
pub trait AudioAnalyser: Send {
    /// Current byte frequency bins, 0..=255 each.
    fn frequency_data(&mut self) -> Vec<u8>;

    /// Release the analysis context. Called once.
    fn close(&mut self);
}

/// Raw browser capture API.
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    async fn query_permission(&self, name: PermissionName) -> PermissionState;

    /// Attach an analyser to the audio tracks of `stream`.
    fn create_analyser(
        &self,
        stream: &MediaStream,
    ) -> Result<Box<dyn AudioAnalyser>, CaptureError>;

    fn capabilities(&self) -> PlatformCapabilities;
}

/// The conferencing SDK's device controller.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    async fn list_video_input_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    async fn list_audio_input_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    async fn list_audio_output_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    async fn start_video_input(&self, device_id: &str) -> Result<MediaStream, CaptureError>;

    async fn start_audio_input(&self, device_id: &str) -> Result<MediaStream, CaptureError>;

    async fn choose_audio_output(&self, device_id: &str) -> Result<(), CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingTrack {
        kind: TrackKind,
        live: AtomicBool,
        enabled: AtomicBool,
        stops: Arc<AtomicUsize>,
    }

    impl CountingTrack {
        fn new(kind: TrackKind, stops: &Arc<AtomicUsize>) -> Arc<dyn MediaTrack> {
            Arc::new(Self {
                kind,
                live: AtomicBool::new(true),
                enabled: AtomicBool::new(true),
                stops: Arc::clone(stops),
            })
        }
    }

    impl MediaTrack for CountingTrack {
        fn id(&self) -> &str {
            "track"
        }
        fn kind(&self) -> TrackKind {
            self.kind
        }
        fn device_id(&self) -> Option<&str> {
            None
        }
        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn stop(&self) {
            if self.live.swap(false, Ordering::SeqCst) {
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }
        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_dropping_stream_stops_tracks() {
        let stops = Arc::new(AtomicUsize::new(0));
        let audio = CountingTrack::new(TrackKind::Audio, &stops);
        let video = CountingTrack::new(TrackKind::Video, &stops);

        drop(MediaStream::new(vec![Arc::clone(&audio), Arc::clone(&video)]));

        assert!(!audio.is_live());
        assert!(!video.is_live());
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_split_keeps_tracks_live() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stream = MediaStream::new(vec![
            CountingTrack::new(TrackKind::Audio, &stops),
            CountingTrack::new(TrackKind::Video, &stops),
        ]);

        let (video, audio) = stream.split();

        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert!(video.has_kind(TrackKind::Video) && !video.has_kind(TrackKind::Audio));
        assert!(audio.has_kind(TrackKind::Audio) && !audio.has_kind(TrackKind::Video));
    }

    #[test]
    fn test_explicit_stop_then_drop_stops_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut stream = MediaStream::new(vec![CountingTrack::new(TrackKind::Audio, &stops)]);

        stream.stop();
        assert!(stream.is_empty());
        drop(stream);

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_constraints() {
        let audio = MediaConstraints::device(TrackKind::Audio, "mic-1");
        assert_eq!(audio.audio, TrackConstraint::Device("mic-1".to_string()));
        assert!(!audio.video.is_requested());

        let combined = MediaConstraints::combined();
        assert!(combined.audio.is_requested() && combined.video.is_requested());
    }

    #[test]
    fn test_partition_devices() {
        let (video, audio_in, audio_out) = partition_devices(vec![
            DeviceInfo::new("cam", DeviceKind::VideoInput, "Camera"),
            DeviceInfo::new("mic", DeviceKind::AudioInput, "Mic"),
            DeviceInfo::new("spk", DeviceKind::AudioOutput, "Speaker"),
            DeviceInfo::new("mic2", DeviceKind::AudioInput, "Mic 2"),
        ]);

        assert_eq!(video.len(), 1);
        assert_eq!(audio_in.len(), 2);
        assert_eq!(audio_out.len(), 1);
    }
}
