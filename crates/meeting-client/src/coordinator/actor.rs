//! `DeviceCoordinator` actor and its handle.
//!
//! The actor owns every capture stream. Messages are processed one at a
//! time, so acquisitions never overlap. Cancellation drops whatever
//! acquisition is in flight and runs teardown.

use super::state::{transition, CoordinatorEvent, CoordinatorState, EnumerationFailure, Transition};
use super::CoordinatorSnapshot;
use crate::config::CoordinatorConfig;
use crate::errors::{CaptureError, CoordinatorError};
use crate::meter::MeterTask;
use crate::platform::{
    partition_devices, DeviceInfo, DeviceKind, DeviceManager, MediaConstraints, MediaPlatform,
    MediaStream, TrackKind,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox size. Callers await each reply, so this stays small.
const COORDINATOR_CHANNEL_BUFFER: usize = 16;

/// Transitions kept for lagging log subscribers.
const TRANSITION_LOG_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

enum CoordinatorMessage {
    Start {
        respond_to: Reply<CoordinatorState>,
    },
    SwitchDevice {
        kind: DeviceKind,
        device_id: String,
        respond_to: Reply<CoordinatorState>,
    },
    SetMuted {
        kind: TrackKind,
        muted: bool,
        respond_to: Reply<()>,
    },
}

/// Handle to a `DeviceCoordinator`.
#[derive(Clone, Debug)]
pub struct DeviceCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
    snapshot: watch::Receiver<CoordinatorSnapshot>,
    transitions: broadcast::Sender<Transition>,
    level: watch::Receiver<u8>,
}

impl std::fmt::Debug for CoordinatorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start { .. } => f.write_str("Start"),
            Self::SwitchDevice { kind, .. } => write!(f, "SwitchDevice({kind})"),
            Self::SetMuted { kind, muted, .. } => write!(f, "SetMuted({kind:?}, {muted})"),
        }
    }
}

impl DeviceCoordinatorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> CoordinatorMessage,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)?
    }

    /// Run the acquisition sequence. Resolves with the state it settled in.
    pub async fn start(&self) -> Result<CoordinatorState, CoordinatorError> {
        self.request(|respond_to| CoordinatorMessage::Start { respond_to })
            .await
    }

    /// Switch the device for one kind.
    ///
    /// The previous stream's tracks are stopped before the new device is
    /// opened. Switching the audio output only records the selection.
    pub async fn switch_device(
        &self,
        kind: DeviceKind,
        device_id: impl Into<String>,
    ) -> Result<CoordinatorState, CoordinatorError> {
        let device_id = device_id.into();
        self.request(|respond_to| CoordinatorMessage::SwitchDevice {
            kind,
            device_id,
            respond_to,
        })
        .await
    }

    /// Enable or disable the tracks of one kind without releasing the device.
    pub async fn set_muted(&self, kind: TrackKind, muted: bool) -> Result<(), CoordinatorError> {
        self.request(|respond_to| CoordinatorMessage::SetMuted {
            kind,
            muted,
            respond_to,
        })
        .await
    }

    /// Tear down: cancel in-flight work, stop every track, close the
    /// analyser. Resolves once the coordinator has reached `Released`.
    pub async fn stop(&self) -> Result<(), CoordinatorError> {
        self.cancel_token.cancel();
        let mut snapshot = self.snapshot.clone();
        let released = snapshot
            .wait_for(|s| s.state == CoordinatorState::Released)
            .await
            .is_ok();
        if released {
            Ok(())
        } else {
            Err(CoordinatorError::Stopped)
        }
    }

    /// Wait until no acquisition is in progress.
    pub async fn settled(&self) -> Result<CoordinatorSnapshot, CoordinatorError> {
        let mut snapshot = self.snapshot.clone();
        let settled = snapshot
            .wait_for(CoordinatorSnapshot::is_settled)
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        Ok(settled.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        self.snapshot.borrow().state
    }

    /// Subscribe to the transition log from this point on.
    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Audio level, 0-100.
    pub fn audio_level(&self) -> watch::Receiver<u8> {
        self.level.clone()
    }

    /// Cancel the coordinator without waiting for teardown.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Capture state for one track kind.
struct DeviceSession {
    kind: TrackKind,
    device_id: Option<String>,
    stream: MediaStream,
}

/// Device lists from the device manager.
struct DeviceLists {
    video: Vec<DeviceInfo>,
    audio_in: Vec<DeviceInfo>,
    audio_out: Vec<DeviceInfo>,
}

impl DeviceLists {
    fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio_in.is_empty() && self.audio_out.is_empty()
    }
}

/// The `DeviceCoordinator` implementation.
pub struct DeviceCoordinator {
    platform: Arc<dyn MediaPlatform>,
    /// Absent when the conferencing SDK never produced one.
    device_manager: Option<Arc<dyn DeviceManager>>,
    config: CoordinatorConfig,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    cancel_token: CancellationToken,
    snapshot: watch::Sender<CoordinatorSnapshot>,
    transitions: broadcast::Sender<Transition>,
    level: Arc<watch::Sender<u8>>,
    video: Option<DeviceSession>,
    audio: Option<DeviceSession>,
    meter: Option<MeterTask>,
    video_muted: bool,
    audio_muted: Arc<AtomicBool>,
}

impl DeviceCoordinator {
    /// Spawn a new coordinator.
    ///
    /// Cancelling `cancel_token` (unmount) tears the coordinator down.
    /// Returns a handle and the task join handle.
    pub fn spawn(
        platform: Arc<dyn MediaPlatform>,
        device_manager: Option<Arc<dyn DeviceManager>>,
        config: CoordinatorConfig,
        cancel_token: CancellationToken,
    ) -> (DeviceCoordinatorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(CoordinatorSnapshot::default());
        let (transitions, _) = broadcast::channel(TRANSITION_LOG_CAPACITY);
        let (level_tx, level_rx) = watch::channel(0u8);

        let actor = Self {
            platform,
            device_manager,
            config,
            receiver,
            cancel_token: cancel_token.clone(),
            snapshot: snapshot_tx,
            transitions: transitions.clone(),
            level: Arc::new(level_tx),
            video: None,
            audio: None,
            meter: None,
            video_muted: false,
            audio_muted: Arc::new(AtomicBool::new(false)),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = DeviceCoordinatorHandle {
            sender,
            cancel_token,
            snapshot: snapshot_rx,
            transitions,
            level: level_rx,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "client.coordinator")]
    async fn run(mut self) {
        debug!(target: "client.coordinator", "DeviceCoordinator started");

        let cancel_token = self.cancel_token.clone();

        loop {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    debug!(
                        target: "client.coordinator",
                        "DeviceCoordinator received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        debug!(
                            target: "client.coordinator",
                            "DeviceCoordinator channel closed, exiting"
                        );
                        break;
                    };

                    // Cancellation drops the in-flight handler, and with it
                    // any stream it had acquired.
                    let cancelled = tokio::select! {
                        biased;
                        () = cancel_token.cancelled() => true,
                        () = self.handle_message(message) => false,
                    };

                    if cancelled {
                        debug!(
                            target: "client.coordinator",
                            "DeviceCoordinator cancelled during acquisition"
                        );
                        break;
                    }
                }
            }
        }

        self.teardown().await;

        info!(target: "client.coordinator", "DeviceCoordinator stopped");
    }

    async fn handle_message(&mut self, message: CoordinatorMessage) {
        debug!(target: "client.coordinator", message = ?message, "Handling message");

        match message {
            CoordinatorMessage::Start { respond_to } => {
                let result = self.handle_start().await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SwitchDevice {
                kind,
                device_id,
                respond_to,
            } => {
                let result = self.handle_switch(kind, device_id).await;
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::SetMuted {
                kind,
                muted,
                respond_to,
            } => {
                self.handle_set_muted(kind, muted);
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    fn state(&self) -> CoordinatorState {
        self.snapshot.borrow().state
    }

    /// Apply an event through the transition function and publish it.
    fn apply(&mut self, event: CoordinatorEvent) -> Result<CoordinatorState, CoordinatorError> {
        let from = self.state();
        let to = transition(from, &event)?;

        self.snapshot.send_modify(|s| {
            s.state = to;
            if let Some(error) = event.error() {
                s.error = Some(error.clone());
            } else if to == CoordinatorState::Active {
                s.error = None;
            }
        });

        info!(
            target: "client.coordinator",
            from = from.as_str(),
            to = to.as_str(),
            event = event.name(),
            "Coordinator transition"
        );

        // No subscribers is fine.
        let _ = self.transitions.send(Transition { from, to, event });

        Ok(to)
    }

    // ------------------------------------------------------------------------
    // Start
    // ------------------------------------------------------------------------

    async fn handle_start(&mut self) -> Result<CoordinatorState, CoordinatorError> {
        self.apply(CoordinatorEvent::Start)?;

        match self
            .platform
            .get_user_media(&MediaConstraints::combined())
            .await
        {
            Ok(mut probe) => {
                probe.stop();
                self.apply(CoordinatorEvent::PermissionGranted)?;
            }
            Err(e) => {
                warn!(
                    target: "client.coordinator",
                    error = %e,
                    platform_error = e.platform_name().unwrap_or("none"),
                    "Permission request failed"
                );
                if self.apply(CoordinatorEvent::PermissionRefused(e))?
                    == CoordinatorState::FallbackDirect
                {
                    return self.run_fallback().await;
                }
                return Ok(self.state());
            }
        }

        let Some(manager) = self.device_manager.clone() else {
            warn!(target: "client.coordinator", "No device manager, using direct capture");
            self.apply(CoordinatorEvent::EnumerationFailed(
                EnumerationFailure::NoDeviceManager,
            ))?;
            return self.run_fallback().await;
        };

        let lists = match self.enumerate(manager.as_ref()).await {
            Ok(lists) => lists,
            Err(failure) => {
                warn!(
                    target: "client.coordinator",
                    failure = ?failure,
                    "Device enumeration failed, using direct capture"
                );
                self.apply(CoordinatorEvent::EnumerationFailed(failure))?;
                return self.run_fallback().await;
            }
        };

        let video_id = lists.video.first().map(|d| d.device_id.clone());
        let audio_id = lists.audio_in.first().map(|d| d.device_id.clone());
        let output_id = lists.audio_out.first().map(|d| d.device_id.clone());

        info!(
            target: "client.coordinator",
            video = lists.video.len(),
            audio_in = lists.audio_in.len(),
            audio_out = lists.audio_out.len(),
            "Devices listed"
        );

        self.snapshot.send_modify(|s| {
            s.video_devices = lists.video;
            s.audio_input_devices = lists.audio_in;
            s.audio_output_devices = lists.audio_out;
        });
        self.apply(CoordinatorEvent::DevicesListed)?;

        self.select_defaults(manager.as_ref(), video_id, audio_id, output_id)
            .await
    }

    /// List all three kinds within the enumeration deadline.
    async fn enumerate(
        &self,
        manager: &dyn DeviceManager,
    ) -> Result<DeviceLists, EnumerationFailure> {
        let listing = async {
            let video = manager.list_video_input_devices().await?;
            let audio_in = manager.list_audio_input_devices().await?;
            let audio_out = manager.list_audio_output_devices().await?;
            Ok::<_, CaptureError>(DeviceLists {
                video,
                audio_in,
                audio_out,
            })
        };

        let lists = tokio::time::timeout(self.config.enumeration_timeout, listing)
            .await
            .map_err(|_| EnumerationFailure::Timeout)?
            .map_err(EnumerationFailure::Error)?;

        if lists.is_empty() {
            return Err(EnumerationFailure::Empty);
        }

        Ok(lists)
    }

    /// Start the first device of each kind through the device manager.
    async fn select_defaults(
        &mut self,
        manager: &dyn DeviceManager,
        video_id: Option<String>,
        audio_id: Option<String>,
        output_id: Option<String>,
    ) -> Result<CoordinatorState, CoordinatorError> {
        // A stream acquired before a later failure is dropped, which stops it.
        let acquired = async {
            let video = match &video_id {
                Some(id) => Some(manager.start_video_input(id).await?),
                None => None,
            };
            let audio = match &audio_id {
                Some(id) => Some(manager.start_audio_input(id).await?),
                None => None,
            };
            Ok::<_, CaptureError>((video, audio))
        }
        .await;

        let (video, audio) = match acquired {
            Ok(streams) => streams,
            Err(e) => {
                warn!(
                    target: "client.coordinator",
                    error = %e,
                    "Default device selection failed"
                );
                if self.apply(CoordinatorEvent::SelectionFailed(e))?
                    == CoordinatorState::FallbackDirect
                {
                    return self.run_fallback().await;
                }
                return Ok(self.state());
            }
        };

        if let Some(id) = &output_id {
            if let Err(e) = manager.choose_audio_output(id).await {
                warn!(target: "client.coordinator", error = %e, "Audio output selection failed");
            }
        }
        self.snapshot
            .send_modify(|s| s.selected_audio_output = output_id);

        if let Some(stream) = video {
            self.attach(DeviceSession {
                kind: TrackKind::Video,
                device_id: video_id,
                stream,
            });
        }
        if let Some(stream) = audio {
            self.attach(DeviceSession {
                kind: TrackKind::Audio,
                device_id: audio_id,
                stream,
            });
        }

        self.apply(CoordinatorEvent::StreamsAttached)
    }

    /// Capture straight from the platform. Entered in `FallbackDirect`.
    async fn run_fallback(&mut self) -> Result<CoordinatorState, CoordinatorError> {
        info!(target: "client.coordinator", "Acquiring media directly from the platform");

        self.release_streams().await;

        let stream = match self
            .platform
            .get_user_media(&MediaConstraints::combined())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    target: "client.coordinator",
                    error = %e,
                    platform_error = e.platform_name().unwrap_or("none"),
                    "Direct capture failed"
                );
                return self.apply(CoordinatorEvent::FallbackFailed(e));
            }
        };

        // Labels are only populated once capture has been granted.
        let devices = match self.platform.enumerate_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(target: "client.coordinator", error = %e, "Raw device enumeration failed");
                Vec::new()
            }
        };
        let (video_list, audio_in, audio_out) = partition_devices(devices);

        let (video, audio) = stream.split();
        let video_id = video
            .device_id(TrackKind::Video)
            .or_else(|| video_list.first().map(|d| d.device_id.clone()));
        let audio_id = audio
            .device_id(TrackKind::Audio)
            .or_else(|| audio_in.first().map(|d| d.device_id.clone()));
        let output_id = audio_out.first().map(|d| d.device_id.clone());

        self.snapshot.send_modify(|s| {
            s.video_devices = video_list;
            s.audio_input_devices = audio_in;
            s.audio_output_devices = audio_out;
            s.selected_audio_output = output_id;
        });

        if !video.is_empty() {
            self.attach(DeviceSession {
                kind: TrackKind::Video,
                device_id: video_id,
                stream: video,
            });
        }
        if !audio.is_empty() {
            self.attach(DeviceSession {
                kind: TrackKind::Audio,
                device_id: audio_id,
                stream: audio,
            });
        }

        self.apply(CoordinatorEvent::FallbackAcquired)
    }

    // ------------------------------------------------------------------------
    // Device switch and mute
    // ------------------------------------------------------------------------

    async fn handle_switch(
        &mut self,
        kind: DeviceKind,
        device_id: String,
    ) -> Result<CoordinatorState, CoordinatorError> {
        let state = self.state();
        if !state.is_usable() {
            return Err(CoordinatorError::NotReady(state));
        }

        let Some(track_kind) = kind.track_kind() else {
            if let Some(manager) = &self.device_manager {
                if let Err(e) = manager.choose_audio_output(&device_id).await {
                    warn!(target: "client.coordinator", error = %e, "Audio output selection failed");
                }
            }
            self.snapshot
                .send_modify(|s| s.selected_audio_output = Some(device_id));
            return self.apply(CoordinatorEvent::DeviceSwitched(kind));
        };

        // The old device must be released before the new one is opened.
        self.detach(track_kind).await;

        let manager = match state {
            CoordinatorState::Active => self.device_manager.clone(),
            _ => None,
        };
        let acquired = match (manager, track_kind) {
            (Some(manager), TrackKind::Video) => manager.start_video_input(&device_id).await,
            (Some(manager), TrackKind::Audio) => manager.start_audio_input(&device_id).await,
            (None, _) => {
                self.platform
                    .get_user_media(&MediaConstraints::device(track_kind, device_id.clone()))
                    .await
            }
        };

        match acquired {
            Ok(stream) => {
                self.attach(DeviceSession {
                    kind: track_kind,
                    device_id: Some(device_id),
                    stream,
                });
                self.apply(CoordinatorEvent::DeviceSwitched(kind))
            }
            Err(e) => {
                warn!(
                    target: "client.coordinator",
                    error = %e,
                    device_kind = %kind,
                    "Device switch failed"
                );
                let state = self.apply(CoordinatorEvent::SwitchFailed(kind, e))?;
                if state == CoordinatorState::Failed {
                    self.release_streams().await;
                    return Ok(CoordinatorState::Failed);
                }
                self.reacquire_any(track_kind).await
            }
        }
    }

    /// After a failed switch, take whatever device of the kind the platform gives.
    async fn reacquire_any(
        &mut self,
        kind: TrackKind,
    ) -> Result<CoordinatorState, CoordinatorError> {
        match self.platform.get_user_media(&MediaConstraints::any(kind)).await {
            Ok(stream) => {
                let device_id = stream.device_id(kind);
                self.attach(DeviceSession {
                    kind,
                    device_id,
                    stream,
                });
                self.apply(CoordinatorEvent::FallbackAcquired)
            }
            Err(e) => {
                warn!(target: "client.coordinator", error = %e, "Fallback reacquisition failed");
                self.release_streams().await;
                self.apply(CoordinatorEvent::FallbackFailed(e))
            }
        }
    }

    fn handle_set_muted(&mut self, kind: TrackKind, muted: bool) {
        match kind {
            TrackKind::Video => {
                self.video_muted = muted;
                if let Some(session) = &self.video {
                    session.stream.set_enabled(!muted);
                }
                self.snapshot.send_modify(|s| s.video_muted = muted);
            }
            TrackKind::Audio => {
                self.audio_muted.store(muted, Ordering::SeqCst);
                if let Some(session) = &self.audio {
                    session.stream.set_enabled(!muted);
                }
                if muted {
                    self.level.send_replace(0);
                }
                self.snapshot.send_modify(|s| s.audio_muted = muted);
            }
        }

        debug!(target: "client.coordinator", kind = ?kind, muted, "Mute state changed");
    }

    // ------------------------------------------------------------------------
    // Stream ownership
    // ------------------------------------------------------------------------

    fn attach(&mut self, session: DeviceSession) {
        let muted = match session.kind {
            TrackKind::Video => self.video_muted,
            TrackKind::Audio => self.audio_muted.load(Ordering::SeqCst),
        };
        session.stream.set_enabled(!muted);

        let device_id = session.device_id.clone();
        match session.kind {
            TrackKind::Video => {
                self.video = Some(session);
                self.snapshot.send_modify(|s| {
                    s.video_attached = true;
                    s.selected_video = device_id;
                });
            }
            TrackKind::Audio => {
                self.audio = Some(session);
                self.start_meter();
                self.snapshot.send_modify(|s| {
                    s.audio_attached = true;
                    s.selected_audio_input = device_id;
                });
            }
        }
    }

    fn start_meter(&mut self) {
        let Some(session) = &self.audio else {
            return;
        };

        match self.platform.create_analyser(&session.stream) {
            Ok(analyser) => {
                self.meter = Some(MeterTask::spawn(
                    analyser,
                    self.config.meter_interval,
                    Arc::clone(&self.audio_muted),
                    Arc::clone(&self.level),
                    &self.cancel_token,
                ));
            }
            Err(e) => {
                warn!(target: "client.coordinator", error = %e, "Audio level metering unavailable");
            }
        }
    }

    /// Stop and drop the session for `kind`.
    async fn detach(&mut self, kind: TrackKind) {
        let session = match kind {
            TrackKind::Video => self.video.take(),
            TrackKind::Audio => {
                if let Some(meter) = self.meter.take() {
                    meter.stop().await;
                }
                self.audio.take()
            }
        };

        if let Some(mut session) = session {
            session.stream.stop();
            debug!(
                target: "client.coordinator",
                kind = ?session.kind,
                device_id = session.device_id.as_deref().unwrap_or("unknown"),
                "Released device"
            );
        }

        self.snapshot.send_modify(|s| match kind {
            TrackKind::Video => s.video_attached = false,
            TrackKind::Audio => s.audio_attached = false,
        });
    }

    async fn release_streams(&mut self) {
        self.detach(TrackKind::Video).await;
        self.detach(TrackKind::Audio).await;
    }

    async fn teardown(&mut self) {
        self.release_streams().await;
        self.level.send_replace(0);

        if let Err(e) = self.apply(CoordinatorEvent::Release) {
            warn!(target: "client.coordinator", error = %e, "Release transition rejected");
        }
    }
}
