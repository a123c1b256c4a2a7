//! Capture Handle - async front end for the capture session
//!
//! Runs a [`CaptureSession`] inside a dedicated tokio task and exposes it
//! through channels only:
//!
//! ```text
//! SampleSource ─[Sample]→ capture task ─[Arc<WaveformData>]→ watchers
//!  (mpsc)                  ▲    │
//!                          │    └─[CapturePhase]→ watchers (watch)
//!              CaptureCommand (mpsc + oneshot reply)
//! ```
//!
//! The task is the only writer of the buffer. A finished capture is copied
//! into an `Arc` and sent through a `watch` channel, so a reader that
//! observes `Some(snapshot)` also observes every sample written for that
//! cycle, and keeps a consistent copy even if a reset follows.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::error::CaptureError;
use crate::capture::machine::{CaptureEvent, CapturePhase, CaptureSettings};
use crate::capture::session::CaptureSession;
use crate::capture::waveform::{Sample, WaveformData};
use crate::source::PollingRate;

/// Commands accepted by the capture task
#[derive(Debug)]
pub enum CaptureCommand {
    /// Discard the current capture and wait for new motion
    Reset {
        response_tx: oneshot::Sender<Result<(), CaptureError>>,
    },
}

/// Settings for the capture task
#[derive(Clone, Debug)]
pub struct CaptureHandleSettings {
    pub capture: CaptureSettings,
    /// Interval of one presentation cycle; drives the post-capture cooldown
    pub cycle_interval: Duration,
    /// Sampling rate used while the task runs
    pub high_rate_hz: u32,
    /// Sampling rate restored on shutdown
    pub normal_rate_hz: u32,
}

impl Default for CaptureHandleSettings {
    fn default() -> Self {
        Self {
            capture: CaptureSettings::default(),
            cycle_interval: Duration::from_micros(16_667),
            high_rate_hz: 1000,
            normal_rate_hz: 120,
        }
    }
}

/// Handle to the running capture task
pub struct CaptureHandle {
    command_tx: mpsc::Sender<CaptureCommand>,
    snapshot_rx: watch::Receiver<Option<Arc<WaveformData>>>,
    phase_rx: watch::Receiver<CapturePhase>,
    rate_tx: watch::Sender<PollingRate>,
    normal_rate_hz: u32,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    /// Spawns the capture task
    ///
    /// Switches the sampling source to the high polling rate for as long as
    /// the task runs. [`CaptureHandle::shutdown`] switches it back.
    pub fn spawn(
        settings: CaptureHandleSettings,
        sample_rx: mpsc::Receiver<Sample>,
        rate_tx: watch::Sender<PollingRate>,
    ) -> Self {
        info!("Spawning capture task with settings: {:?}", settings);

        let (command_tx, command_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (phase_tx, phase_rx) = watch::channel(CapturePhase::Idle);
        let cancel = CancellationToken::new();

        let high = PollingRate::High(settings.high_rate_hz);
        if rate_tx.send(high).is_err() {
            warn!("No sample source listening for polling rate changes");
        }
        info!("Polling rate switched to {}", high);

        let session = CaptureSession::new(settings.capture, settings.high_rate_hz);
        let task = tokio::spawn(run_capture_loop(
            session,
            settings.cycle_interval,
            sample_rx,
            command_rx,
            snapshot_tx,
            phase_tx,
            cancel.clone(),
        ));

        Self {
            command_tx,
            snapshot_rx,
            phase_rx,
            rate_tx,
            normal_rate_hz: settings.normal_rate_hz,
            cancel,
            task,
        }
    }

    /// Requests a reset and waits for the task's answer
    pub async fn reset(&self) -> Result<(), CaptureError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(CaptureCommand::Reset { response_tx })
            .await
            .map_err(|e| CaptureError::ChannelError(format!("Failed to send reset: {}", e)))?;
        response_rx
            .await
            .map_err(|e| CaptureError::ChannelError(format!("No reset response: {}", e)))?
    }

    /// Receiver for finished captures; `None` while nothing is ready
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<WaveformData>>> {
        debug!("New subscriber to capture snapshots");
        self.snapshot_rx.clone()
    }

    pub fn phase(&self) -> watch::Receiver<CapturePhase> {
        self.phase_rx.clone()
    }

    /// Stops the task and restores the normal polling rate
    pub async fn shutdown(self) {
        info!("Shutting down capture task");
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Capture task ended abnormally: {}", e);
        }
        let normal = PollingRate::Normal(self.normal_rate_hz);
        if self.rate_tx.send(normal).is_err() {
            debug!("Sample source already gone");
        }
        info!("Polling rate switched to {}", normal);
    }
}

async fn run_capture_loop(
    mut session: CaptureSession,
    cycle_interval: Duration,
    mut sample_rx: mpsc::Receiver<Sample>,
    mut command_rx: mpsc::Receiver<CaptureCommand>,
    snapshot_tx: watch::Sender<Option<Arc<WaveformData>>>,
    phase_tx: watch::Sender<CapturePhase>,
    cancel: CancellationToken,
) {
    info!(
        "Capture loop started, cycle interval {:.3} ms",
        cycle_interval.as_secs_f64() * 1000.0
    );
    let mut cycle = tokio::time::interval(cycle_interval);
    cycle.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut samples_seen: u64 = 0;
    let mut rejected: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Capture loop cancelled");
                break;
            }
            maybe_sample = sample_rx.recv() => {
                let Some(sample) = maybe_sample else {
                    warn!("Sample channel closed, stopping capture loop");
                    break;
                };
                samples_seen += 1;
                match session.push(sample) {
                    Ok(CaptureEvent::Finished { reason, count }) => {
                        info!("Capture locked ({}), {} samples", reason, count);
                    }
                    Ok(_) => {}
                    Err(CaptureError::NotReset) => {
                        rejected += 1;
                        if rejected == 1 {
                            info!("Stick moved while a capture is held; reset to record again");
                        }
                    }
                    Err(e) => warn!("Sample rejected: {}", e),
                }
            }
            maybe_command = command_rx.recv() => {
                match maybe_command {
                    Some(CaptureCommand::Reset { response_tx }) => {
                        let result = session.reset();
                        if result.is_ok() {
                            rejected = 0;
                            snapshot_tx.send_replace(None);
                        }
                        if response_tx.send(result).is_err() {
                            error!("Failed to send reset response");
                        }
                    }
                    None => {
                        debug!("Command channel closed");
                        break;
                    }
                }
            }
            _ = cycle.tick() => {
                if let CaptureEvent::Cooling { remaining } = session.tick() {
                    debug!("Capture locked, {} cycles remaining", remaining);
                }
            }
        }

        phase_tx.send_if_modified(|phase| {
            let current = session.phase();
            if *phase != current {
                debug!("Capture phase {:?} -> {:?}", phase, current);
                *phase = current;
                true
            } else {
                false
            }
        });
        if let Some(snapshot) = session.take_published() {
            snapshot_tx.send_replace(Some(snapshot));
        }
    }

    info!("Capture loop finished after {} samples", samples_seen);
}
