//! Audio level metering.
//!
//! A meter task samples an [`AudioAnalyser`] on a fixed interval and
//! publishes a 0-100 level on a watch channel. The level is 0 while the
//! microphone is muted and after the task stops.

use crate::platform::AudioAnalyser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Full-scale average bin value.
const FULL_SCALE_BIN: f64 = 128.0;

/// Normalize frequency bins to a 0-100 level.
///
/// ```
/// use meeting_client::meter::compute_level;
///
/// assert_eq!(compute_level(&[64; 128]), 50);
/// assert_eq!(compute_level(&[255; 128]), 100);
/// assert_eq!(compute_level(&[]), 0);
/// ```
pub fn compute_level(bins: &[u8]) -> u8 {
    if bins.is_empty() {
        return 0;
    }

    let sum: u64 = bins.iter().map(|&b| u64::from(b)).sum();
    let average = sum as f64 / bins.len() as f64;
    let level = (average / FULL_SCALE_BIN * 100.0).min(100.0);

    level.floor() as u8
}

/// A running meter. Dropping it without [`MeterTask::stop`] still cancels the
/// task, but the analyser is then closed asynchronously.
pub struct MeterTask {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl MeterTask {
    /// Spawn a meter task as a child of `parent`.
    pub fn spawn(
        analyser: Box<dyn AudioAnalyser>,
        interval: Duration,
        muted: Arc<AtomicBool>,
        level: Arc<watch::Sender<u8>>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel_token = parent.child_token();
        let handle = tokio::spawn(run(
            analyser,
            interval,
            muted,
            level,
            cancel_token.clone(),
        ));
        Self {
            cancel_token,
            handle: Some(handle),
        }
    }

    /// Stop sampling and wait until the analyser is closed.
    pub async fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                debug!(target: "client.meter", error = %e, "Meter task ended abnormally");
            }
        }
    }
}

impl Drop for MeterTask {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run(
    mut analyser: Box<dyn AudioAnalyser>,
    interval: Duration,
    muted: Arc<AtomicBool>,
    level: Arc<watch::Sender<u8>>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let value = if muted.load(Ordering::SeqCst) {
                    0
                } else {
                    compute_level(&analyser.frequency_data())
                };
                level.send_replace(value);
            }
        }
    }

    analyser.close();
    level.send_replace(0);
    debug!(target: "client.meter", "Audio meter stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct ConstantAnalyser {
        value: u8,
        closed: Arc<AtomicUsize>,
    }

    impl AudioAnalyser for ConstantAnalyser {
        fn frequency_data(&mut self) -> Vec<u8> {
            vec![self.value; 128]
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_compute_level_scale() {
        assert_eq!(compute_level(&[0; 64]), 0);
        assert_eq!(compute_level(&[128; 64]), 100);
        assert_eq!(compute_level(&[200; 64]), 100);
        // 25.6 / 128 * 100 = 20
        assert_eq!(compute_level(&[0, 0, 0, 0, 128]), 20);
        // floor, not round
        assert_eq!(compute_level(&[1]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_meter_publishes_level_and_zero_when_muted() {
        let closed = Arc::new(AtomicUsize::new(0));
        let muted = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = watch::channel(0u8);
        let parent = CancellationToken::new();

        let meter = MeterTask::spawn(
            Box::new(ConstantAnalyser {
                value: 96,
                closed: Arc::clone(&closed),
            }),
            Duration::from_millis(120),
            Arc::clone(&muted),
            Arc::new(tx),
            &parent,
        );

        rx.wait_for(|&l| l == 75).await.unwrap();

        muted.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(130)).await;
        assert_eq!(*rx.borrow(), 0);

        meter.stop().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(*rx.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_meter() {
        let closed = Arc::new(AtomicUsize::new(0));
        let (tx, _rx) = watch::channel(0u8);
        let parent = CancellationToken::new();

        let meter = MeterTask::spawn(
            Box::new(ConstantAnalyser {
                value: 10,
                closed: Arc::clone(&closed),
            }),
            Duration::from_millis(120),
            Arc::new(AtomicBool::new(false)),
            Arc::new(tx),
            &parent,
        );

        parent.cancel();
        meter.stop().await;

        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
