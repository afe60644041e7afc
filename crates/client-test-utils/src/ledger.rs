//! Shared record of capture activity.
//!
//! Every fake track opened by a [`crate::FakePlatform`] or
//! [`crate::FakeDeviceManager`] reports to one ledger, so tests can assert
//! on live track counts and on the order of stops and acquisitions.

use meeting_client::platform::{AudioAnalyser, MediaTrack, TrackKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    TrackOpened {
        track_id: String,
        kind: TrackKind,
        device_id: String,
    },
    TrackStopped {
        track_id: String,
        device_id: String,
    },
    AnalyserOpened,
    AnalyserClosed,
}

#[derive(Debug, Default)]
pub struct TrackLedger {
    live: AtomicUsize,
    opened: AtomicUsize,
    analysers_open: AtomicUsize,
    events: Mutex<Vec<LedgerEvent>>,
}

impl TrackLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tracks opened and not yet stopped.
    pub fn live_tracks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn tracks_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn analysers_open(&self) -> usize {
        self.analysers_open.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Ids of live devices of one kind.
    pub fn live_devices(&self, kind: TrackKind) -> Vec<String> {
        self.live_devices_before(kind, usize::MAX)
    }

    /// Ids of devices of one kind that were live just before event `end`.
    pub fn live_devices_before(&self, kind: TrackKind, end: usize) -> Vec<String> {
        let events = self.events();
        let mut live = Vec::new();
        for event in events.iter().take(end) {
            match event {
                LedgerEvent::TrackOpened {
                    track_id,
                    kind: k,
                    device_id,
                } if *k == kind => live.push((track_id.clone(), device_id.clone())),
                LedgerEvent::TrackStopped { track_id, .. } => {
                    live.retain(|(id, _)| id != track_id);
                }
                _ => {}
            }
        }
        live.into_iter().map(|(_, device)| device).collect()
    }

    /// Position of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&LedgerEvent) -> bool) -> Option<usize> {
        self.events().iter().position(pred)
    }

    fn record(&self, event: LedgerEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Open a live fake track.
    pub fn open_track(self: &Arc<Self>, kind: TrackKind, device_id: &str) -> Arc<dyn MediaTrack> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        let track_id = format!("track-{n}");
        self.record(LedgerEvent::TrackOpened {
            track_id: track_id.clone(),
            kind,
            device_id: device_id.to_string(),
        });
        Arc::new(FakeTrack {
            id: track_id,
            kind,
            device_id: device_id.to_string(),
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
            ledger: Arc::clone(self),
        })
    }

    /// Open a fake analyser returning `bins` on every sample.
    pub fn open_analyser(self: &Arc<Self>, bins: Vec<u8>) -> Box<dyn AudioAnalyser> {
        self.analysers_open.fetch_add(1, Ordering::SeqCst);
        self.record(LedgerEvent::AnalyserOpened);
        Box::new(FakeAnalyser {
            bins,
            closed: false,
            ledger: Arc::clone(self),
        })
    }
}

#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    device_id: String,
    enabled: AtomicBool,
    live: AtomicBool,
    ledger: Arc<TrackLedger>,
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn device_id(&self) -> Option<&str> {
        Some(&self.device_id)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.ledger.live.fetch_sub(1, Ordering::SeqCst);
            self.ledger.record(LedgerEvent::TrackStopped {
                track_id: self.id.clone(),
                device_id: self.device_id.clone(),
            });
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeAnalyser {
    bins: Vec<u8>,
    closed: bool,
    ledger: Arc<TrackLedger>,
}

impl AudioAnalyser for FakeAnalyser {
    fn frequency_data(&mut self) -> Vec<u8> {
        self.bins.clone()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.ledger.analysers_open.fetch_sub(1, Ordering::SeqCst);
            self.ledger.record(LedgerEvent::AnalyserClosed);
        }
    }
}
