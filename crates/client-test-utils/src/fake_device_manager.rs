//! Scriptable `DeviceManager` for coordinator tests.
//!
//! Lists may be delayed (a stalled SDK) or fail outright, and individual
//! devices can refuse to start.

use crate::ledger::TrackLedger;
use async_trait::async_trait;
use meeting_client::errors::CaptureError;
use meeting_client::platform::{
    partition_devices, DeviceInfo, DeviceManager, MediaStream, TrackKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeDeviceManager {
    ledger: Arc<TrackLedger>,
    video: Vec<DeviceInfo>,
    audio_in: Vec<DeviceInfo>,
    audio_out: Vec<DeviceInfo>,
    list_delay: Option<Duration>,
    list_error: Option<CaptureError>,
    start_failures: HashMap<String, CaptureError>,
    start_calls: AtomicUsize,
    chosen_outputs: Mutex<Vec<String>>,
}

impl FakeDeviceManager {
    /// Tracks opened by the manager report to `ledger`.
    pub fn builder(ledger: Arc<TrackLedger>) -> FakeDeviceManagerBuilder {
        FakeDeviceManagerBuilder {
            ledger,
            devices: Vec::new(),
            list_delay: None,
            list_error: None,
            start_failures: HashMap::new(),
        }
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Every `choose_audio_output` argument, in order.
    pub fn chosen_outputs(&self) -> Vec<String> {
        self.chosen_outputs.lock().unwrap().clone()
    }

    async fn list(&self, devices: &[DeviceInfo]) -> Result<Vec<DeviceInfo>, CaptureError> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(devices.to_vec()),
        }
    }

    fn start(
        &self,
        kind: TrackKind,
        devices: &[DeviceInfo],
        device_id: &str,
    ) -> Result<MediaStream, CaptureError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.start_failures.get(device_id) {
            return Err(err.clone());
        }
        if !devices.iter().any(|d| d.device_id == device_id) {
            return Err(CaptureError::from_platform(
                "NotFoundError",
                "Requested device not found",
            ));
        }

        Ok(MediaStream::new(vec![self.ledger.open_track(kind, device_id)]))
    }
}

#[async_trait]
impl DeviceManager for FakeDeviceManager {
    async fn list_video_input_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        self.list(&self.video).await
    }

    async fn list_audio_input_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        self.list(&self.audio_in).await
    }

    async fn list_audio_output_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        self.list(&self.audio_out).await
    }

    async fn start_video_input(&self, device_id: &str) -> Result<MediaStream, CaptureError> {
        self.start(TrackKind::Video, &self.video, device_id)
    }

    async fn start_audio_input(&self, device_id: &str) -> Result<MediaStream, CaptureError> {
        self.start(TrackKind::Audio, &self.audio_in, device_id)
    }

    async fn choose_audio_output(&self, device_id: &str) -> Result<(), CaptureError> {
        self.chosen_outputs
            .lock()
            .unwrap()
            .push(device_id.to_string());
        if self.audio_out.iter().any(|d| d.device_id == device_id) {
            Ok(())
        } else {
            Err(CaptureError::from_platform(
                "NotFoundError",
                "Requested output not found",
            ))
        }
    }
}

/// Builder for [`FakeDeviceManager`].
pub struct FakeDeviceManagerBuilder {
    ledger: Arc<TrackLedger>,
    devices: Vec<DeviceInfo>,
    list_delay: Option<Duration>,
    list_error: Option<CaptureError>,
    start_failures: HashMap<String, CaptureError>,
}

impl FakeDeviceManagerBuilder {
    #[must_use]
    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    /// Every list call sleeps for `delay` first.
    #[must_use]
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn failing_lists(mut self, name: &str) -> Self {
        self.list_error = Some(CaptureError::from_platform(name, "list failed"));
        self
    }

    /// Starting `device_id` fails with `name`.
    #[must_use]
    pub fn failing_start(mut self, device_id: &str, name: &str) -> Self {
        self.start_failures.insert(
            device_id.to_string(),
            CaptureError::from_platform(name, "start failed"),
        );
        self
    }

    pub fn build(self) -> FakeDeviceManager {
        let (video, audio_in, audio_out) = partition_devices(self.devices);
        FakeDeviceManager {
            ledger: self.ledger,
            video,
            audio_in,
            audio_out,
            list_delay: self.list_delay,
            list_error: self.list_error,
            start_failures: self.start_failures,
            start_calls: AtomicUsize::new(0),
            chosen_outputs: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_devices;

    #[tokio::test]
    async fn test_lists_partitioned_by_kind() {
        let manager = FakeDeviceManager::builder(TrackLedger::new())
            .with_devices(default_devices())
            .build();

        assert_eq!(manager.list_video_input_devices().await.unwrap().len(), 2);
        assert_eq!(manager.list_audio_input_devices().await.unwrap().len(), 2);
        assert_eq!(manager.list_audio_output_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_device_fails_to_start() {
        let ledger = TrackLedger::new();
        let manager = FakeDeviceManager::builder(Arc::clone(&ledger))
            .with_devices(default_devices())
            .build();

        assert!(manager.start_video_input("cam-9").await.is_err());
        let stream = manager.start_video_input("cam-2").await.unwrap();

        assert_eq!(ledger.live_tracks(), 1);
        drop(stream);
        assert_eq!(ledger.live_tracks(), 0);
        assert_eq!(manager.start_calls(), 2);
    }
}
