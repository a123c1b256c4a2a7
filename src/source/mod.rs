//! Sample sources feeding the capture task
//!
//! A [`SampleSource`] is polled at a fixed rate by the pump spawned through
//! [`SourceHandle::spawn`]. The pump timestamps every reading, turns it into
//! an immutable [`Sample`] and pushes it onto the capture channel. It is the
//! only producer on that channel.
//!
//! ```text
//! SampleSource ──poll──► pump task ──[Sample]──► capture task
//!                           ▲
//!                  PollingRate (watch)
//! ```

pub mod gilrs_source;
pub mod replay;

pub use gilrs_source::GilrsSource;
pub use replay::ReplaySource;

use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::waveform::Sample;

/// One raw stick position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StickReading {
    pub x: i8,
    pub y: i8,
}

impl StickReading {
    pub fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }
}

/// Polling mode of the source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollingRate {
    /// Regular rate outside of a capture
    Normal(u32),
    /// Raised rate while the scope is capturing
    High(u32),
}

impl PollingRate {
    pub fn hz(&self) -> u32 {
        match self {
            PollingRate::Normal(hz) | PollingRate::High(hz) => *hz,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.hz().max(1)))
    }
}

impl fmt::Display for PollingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollingRate::Normal(hz) => write!(f, "normal ({}Hz)", hz),
            PollingRate::High(hz) => write!(f, "high ({}Hz)", hz),
        }
    }
}

/// Errors raised by sample sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to initialize source: {0}")]
    InitializationError(String),

    #[error("No gamepad connected")]
    NoGamepad,

    #[error("Source exhausted")]
    Exhausted,

    #[error("Failed to parse recorded data: {0}")]
    ParseError(String),
}

/// Anything that can report the current stick position
pub trait SampleSource: Send + 'static {
    /// Reads the stick position right now
    fn read(&mut self) -> Result<StickReading, SourceError>;

    /// Human-readable name for logs
    fn name(&self) -> String;
}

/// Handle to the polling pump task
pub struct SourceHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SourceHandle {
    /// Spawns a task polling `source` at the rate published on `rate_rx`
    pub fn spawn<S: SampleSource>(
        source: S,
        rate_rx: watch::Receiver<PollingRate>,
        sample_tx: mpsc::Sender<Sample>,
    ) -> Self {
        info!(
            "Spawning sample pump for {} at {}",
            source.name(),
            *rate_rx.borrow()
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_pump(source, rate_rx, sample_tx, cancel.clone()));
        Self { cancel, task }
    }

    pub async fn shutdown(self) {
        info!("Shutting down sample pump");
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Sample pump ended abnormally: {}", e);
        }
    }
}

async fn run_pump<S: SampleSource>(
    mut source: S,
    mut rate_rx: watch::Receiver<PollingRate>,
    sample_tx: mpsc::Sender<Sample>,
    cancel: CancellationToken,
) {
    let mut rate = *rate_rx.borrow_and_update();
    let mut ticker = tokio::time::interval(rate.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut watching_rate = true;
    // Deltas are measured between delivered samples so a dropped poll's time
    // is carried into the next sample
    let mut last_sent: Option<Instant> = None;
    let mut sent: u64 = 0;
    let mut dropped: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rate_rx.changed(), if watching_rate => {
                if changed.is_err() {
                    debug!("Polling rate sender gone, keeping {}", rate);
                    watching_rate = false;
                    continue;
                }
                rate = *rate_rx.borrow_and_update();
                info!("Sample pump polling rate now {}", rate);
                ticker = tokio::time::interval(rate.period());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                let time_delta_us = last_sent
                    .map(|prev| now.duration_since(prev).as_micros())
                    .unwrap_or(0)
                    .min(u128::from(u32::MAX)) as u32;

                let reading = match source.read() {
                    Ok(reading) => reading,
                    Err(SourceError::Exhausted) => {
                        info!("{} exhausted after {} samples", source.name(), sent);
                        break;
                    }
                    Err(e) => {
                        debug!("Read from {} failed: {}", source.name(), e);
                        continue;
                    }
                };

                match sample_tx.try_send(Sample::new(reading.x, reading.y, time_delta_us)) {
                    Ok(()) => {
                        sent += 1;
                        last_sent = Some(now);
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        dropped += 1;
                        warn!("Capture queue full, {} samples dropped so far", dropped);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        info!("Capture channel closed, stopping sample pump");
                        break;
                    }
                }
            }
        }
    }

    info!("Sample pump stopped: {} sent, {} dropped", sent, dropped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_rate_period() {
        assert_eq!(PollingRate::High(1000).period(), Duration::from_millis(1));
        assert_eq!(PollingRate::Normal(0).period(), Duration::from_secs(1));
        assert_eq!(PollingRate::Normal(120).period(), Duration::from_micros(8333));
    }

    #[tokio::test]
    async fn test_pump_forwards_readings_in_order() {
        let readings = vec![
            StickReading::new(0, 0),
            StickReading::new(40, 0),
            StickReading::new(90, -10),
        ];
        let (_rate_tx, rate_rx) = watch::channel(PollingRate::High(1000));
        let (sample_tx, mut sample_rx) = mpsc::channel(16);
        let handle = SourceHandle::spawn(ReplaySource::new(readings), rate_rx, sample_tx);

        let mut received = Vec::new();
        while let Some(sample) = sample_rx.recv().await {
            received.push(sample);
        }
        handle.shutdown().await;

        let positions: Vec<(i8, i8)> = received.iter().map(|s| (s.ax, s.ay)).collect();
        assert_eq!(positions, vec![(0, 0), (40, 0), (90, -10)]);
        assert_eq!(received[0].time_delta_us, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_poll_time_carries_into_next_sample() {
        let readings = (0..5).map(|i| StickReading::new(i * 10, 0)).collect();
        let (_rate_tx, rate_rx) = watch::channel(PollingRate::Normal(100));
        let (sample_tx, mut sample_rx) = mpsc::channel(1);
        let handle = SourceHandle::spawn(ReplaySource::new(readings), rate_rx, sample_tx);

        // polls land every 10 ms; holding the queue until 25 ms drops the 20 ms poll
        let mut received = vec![sample_rx.recv().await.unwrap()];
        tokio::time::sleep(Duration::from_millis(25)).await;
        while let Some(sample) = sample_rx.recv().await {
            received.push(sample);
        }
        handle.shutdown().await;

        let xs: Vec<i8> = received.iter().map(|s| s.ax).collect();
        assert_eq!(xs, vec![0, 10, 30, 40]);
        let deltas: Vec<u32> = received.iter().map(|s| s.time_delta_us).collect();
        assert_eq!(deltas, vec![0, 10_000, 20_000, 10_000]);
        assert_eq!(deltas.iter().map(|&d| u64::from(d)).sum::<u64>(), 40_000);
    }
}
