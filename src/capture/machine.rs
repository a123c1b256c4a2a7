//! Capture state machine built on statum typestates
//!
//! ```text
//! Idle ──(stick leaves origin)──► Recording ──(40ms at rest | buffer full)──► Locked
//!  ▲                                  │                                        │
//!  │                          (reset, Discard policy)                  (cooldown elapsed)
//!  │                                  ▼                                        ▼
//!  └───────────────────────────── reset ◄──────────────────────────────── Complete
//! ```
//!
//! Each state is a distinct `CaptureCycle<S>` type so only the legal
//! operations exist per state. [`CaptureMachine`] wraps the four typestates so
//! the session can drive the machine one sample at a time.

use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::fmt;
use tracing::{debug, info, warn};

use crate::capture::error::CaptureError;
use crate::capture::waveform::{Sample, WaveformBuffer};

/// What the session should do when a reset arrives mid-recording
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Drop the partial capture and return to idle
    #[default]
    Discard,
    /// Refuse the reset until the capture finishes on its own
    Reject,
}

/// Tunables for one capture cycle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureSettings {
    /// Axis magnitude separating "at origin" from "moving"
    pub movement_threshold: u8,
    /// Time the stick must rest at origin before recording stops
    pub origin_timeout_us: u64,
    /// Presentation cycles spent in `Locked` before the capture is published
    pub cooldown_cycles: u8,
    /// Buffer capacity in samples
    pub max_samples: usize,
    pub reset_policy: ResetPolicy,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            movement_threshold: 5,
            origin_timeout_us: 40_000,
            cooldown_cycles: 5,
            max_samples: crate::capture::waveform::MAX_SAMPLES,
            reset_policy: ResetPolicy::Discard,
        }
    }
}

/// Why a recording ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Stick rested at origin for the configured timeout
    OriginTimeout,
    /// Last free slot was filled
    Capacity,
    /// An append was refused; the sample that caused it is not stored
    BufferFull,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::OriginTimeout => write!(f, "stick returned to origin"),
            StopReason::Capacity => write!(f, "sample capacity reached"),
            StopReason::BufferFull => write!(f, "buffer full"),
        }
    }
}

/// Observable outcome of feeding the machine a sample or a cycle tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Nothing changed
    Ignored,
    /// Stick left the origin, sample stored at index 0
    Started,
    /// Sample appended, `count` samples so far
    Recorded { count: usize },
    /// Recording ended and the buffer is frozen
    Finished { reason: StopReason, count: usize },
    /// Cooldown in progress
    Cooling { remaining: u8 },
    /// Capture became readable
    Completed,
}

/// Plain mirror of the typestate, for watchers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapturePhase {
    #[default]
    Idle,
    Recording,
    Locked,
    Complete,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePhase::Idle => write!(f, "Waiting for input"),
            CapturePhase::Recording => write!(f, "Recording"),
            CapturePhase::Locked => write!(f, "LOCKED"),
            CapturePhase::Complete => write!(f, "Complete"),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum CaptureState {
    Idle,
    Recording,
    Locked,
    Complete,
}

#[machine]
#[derive(Debug)]
pub struct CaptureCycle<S: CaptureState> {
    settings: CaptureSettings,

    // Time the stick has spent inside the threshold since it last moved
    origin_rest_us: u64,

    // Remaining cycles before a locked capture is published
    cooldown: u8,
}

impl<S: CaptureState> CaptureCycle<S> {
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }
}

impl CaptureCycle<Idle> {
    pub fn create(settings: CaptureSettings) -> Self {
        debug!("Creating capture cycle with settings: {:?}", settings);
        Self::new(settings, 0, 0)
    }

    /// Starts recording if `sample` leaves the origin
    pub fn observe(
        mut self,
        sample: Sample,
        buffer: &mut WaveformBuffer,
    ) -> (CaptureMachine, CaptureEvent) {
        if !sample.exceeds(self.settings.movement_threshold) {
            return (CaptureMachine::Idle(self), CaptureEvent::Ignored);
        }

        buffer.reset();
        if let Err(e) = buffer.append(sample) {
            warn!("Unable to store first sample: {}", e);
            return (CaptureMachine::Idle(self), CaptureEvent::Ignored);
        }
        self.origin_rest_us = 0;

        info!(
            "Stick left origin at ({}, {}), recording started",
            sample.ax, sample.ay
        );
        let recording: CaptureCycle<Recording> = self.transition();
        if buffer.is_full() {
            return recording.finish(StopReason::Capacity, buffer);
        }
        (CaptureMachine::Recording(recording), CaptureEvent::Started)
    }
}

impl CaptureCycle<Recording> {
    /// Appends `sample` and checks both stop conditions
    pub fn record(
        mut self,
        sample: Sample,
        buffer: &mut WaveformBuffer,
    ) -> (CaptureMachine, CaptureEvent) {
        let count = match buffer.append(sample) {
            Ok(count) => count,
            Err(e) => {
                warn!("Append refused while recording: {}", e);
                return self.finish(StopReason::BufferFull, buffer);
            }
        };

        if sample.at_origin(self.settings.movement_threshold) {
            self.origin_rest_us += u64::from(sample.time_delta_us);
        } else {
            self.origin_rest_us = 0;
        }

        if buffer.is_full() {
            self.finish(StopReason::Capacity, buffer)
        } else if self.origin_rest_us >= self.settings.origin_timeout_us {
            self.finish(StopReason::OriginTimeout, buffer)
        } else {
            (CaptureMachine::Recording(self), CaptureEvent::Recorded { count })
        }
    }

    /// Drops the partial capture
    pub fn abort(self, buffer: &mut WaveformBuffer) -> CaptureCycle<Idle> {
        info!("Discarding partial capture of {} samples", buffer.count());
        buffer.reset();
        self.transition()
    }

    fn finish(
        self,
        reason: StopReason,
        buffer: &mut WaveformBuffer,
    ) -> (CaptureMachine, CaptureEvent) {
        buffer.mark_ready();
        let count = buffer.count();
        info!(
            "Capture finished ({}): {} samples over {:.3} ms",
            reason,
            count,
            buffer.total_time_us() as f64 / 1000.0
        );

        let cooldown = self.settings.cooldown_cycles;
        let mut locked: CaptureCycle<Locked> = self.transition();
        locked.cooldown = cooldown;

        let machine = if cooldown == 0 {
            debug!("No cooldown configured, capture complete immediately");
            CaptureMachine::Complete(locked.transition())
        } else {
            CaptureMachine::Locked(locked)
        };
        (machine, CaptureEvent::Finished { reason, count })
    }
}

impl CaptureCycle<Locked> {
    /// Counts down one presentation cycle
    pub fn tick(mut self) -> (CaptureMachine, CaptureEvent) {
        self.cooldown = self.cooldown.saturating_sub(1);
        if self.cooldown == 0 {
            debug!("Cooldown elapsed, capture complete");
            (CaptureMachine::Complete(self.transition()), CaptureEvent::Completed)
        } else {
            let remaining = self.cooldown;
            (CaptureMachine::Locked(self), CaptureEvent::Cooling { remaining })
        }
    }
}

/// Runtime wrapper over the four capture typestates
#[derive(Debug)]
pub enum CaptureMachine {
    Idle(CaptureCycle<Idle>),
    Recording(CaptureCycle<Recording>),
    Locked(CaptureCycle<Locked>),
    Complete(CaptureCycle<Complete>),
}

impl CaptureMachine {
    pub fn new(settings: CaptureSettings) -> Self {
        CaptureMachine::Idle(CaptureCycle::create(settings))
    }

    pub fn phase(&self) -> CapturePhase {
        match self {
            CaptureMachine::Idle(_) => CapturePhase::Idle,
            CaptureMachine::Recording(_) => CapturePhase::Recording,
            CaptureMachine::Locked(_) => CapturePhase::Locked,
            CaptureMachine::Complete(_) => CapturePhase::Complete,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        match self {
            CaptureMachine::Idle(m) => m.settings(),
            CaptureMachine::Recording(m) => m.settings(),
            CaptureMachine::Locked(m) => m.settings(),
            CaptureMachine::Complete(m) => m.settings(),
        }
    }

    /// Feeds one raw sample through the machine
    ///
    /// A sample that would start a new capture while a finished one is still
    /// held is answered with [`CaptureError::NotReset`] and changes nothing.
    pub fn on_sample(
        self,
        sample: Sample,
        buffer: &mut WaveformBuffer,
    ) -> (CaptureMachine, Result<CaptureEvent, CaptureError>) {
        match self {
            CaptureMachine::Idle(m) => {
                let (next, event) = m.observe(sample, buffer);
                (next, Ok(event))
            }
            CaptureMachine::Recording(m) => {
                let (next, event) = m.record(sample, buffer);
                (next, Ok(event))
            }
            held @ (CaptureMachine::Locked(_) | CaptureMachine::Complete(_)) => {
                if sample.exceeds(held.settings().movement_threshold) {
                    (held, Err(CaptureError::NotReset))
                } else {
                    (held, Ok(CaptureEvent::Ignored))
                }
            }
        }
    }

    /// Advances the post-capture cooldown by one presentation cycle
    pub fn tick(self) -> (CaptureMachine, CaptureEvent) {
        match self {
            CaptureMachine::Locked(m) => m.tick(),
            other => (other, CaptureEvent::Ignored),
        }
    }

    /// Returns to `Idle` and clears the buffer
    pub fn reset(self, buffer: &mut WaveformBuffer) -> (CaptureMachine, Result<(), CaptureError>) {
        match self {
            CaptureMachine::Idle(m) => {
                buffer.reset();
                (CaptureMachine::Idle(m), Ok(()))
            }
            CaptureMachine::Recording(m) => match m.settings.reset_policy {
                ResetPolicy::Discard => (CaptureMachine::Idle(m.abort(buffer)), Ok(())),
                ResetPolicy::Reject => {
                    let count = buffer.count();
                    warn!("Reset rejected, {} samples recorded so far", count);
                    (
                        CaptureMachine::Recording(m),
                        Err(CaptureError::ResetRejected { count }),
                    )
                }
            },
            CaptureMachine::Locked(m) => {
                buffer.reset();
                (CaptureMachine::Idle(m.transition()), Ok(()))
            }
            CaptureMachine::Complete(m) => {
                buffer.reset();
                (CaptureMachine::Idle(m.transition()), Ok(()))
            }
        }
    }
}
