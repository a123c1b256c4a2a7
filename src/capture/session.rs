//! Capture session: the single owner of the capture machine and its buffer
//!
//! The session is synchronous and single-threaded. [`CaptureHandle`] runs it
//! inside one tokio task, which makes that task the only writer of the
//! buffer. Finished captures leave the session as `Arc<WaveformData>`
//! copies, so readers never share memory with the buffer being written.
//!
//! [`CaptureHandle`]: crate::capture::handle::CaptureHandle

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capture::error::CaptureError;
use crate::capture::machine::{CaptureEvent, CaptureMachine, CapturePhase, CaptureSettings};
use crate::capture::waveform::{Sample, WaveformBuffer, WaveformData};

#[derive(Debug)]
pub struct CaptureSession {
    settings: CaptureSettings,
    machine: CaptureMachine,
    buffer: WaveformBuffer,

    // Snapshot of the last capture that reached `Complete`, not yet collected
    published: Option<Arc<WaveformData>>,
}

impl CaptureSession {
    pub fn new(settings: CaptureSettings, polling_rate_hz: u32) -> Self {
        info!("Creating capture session with settings: {:?}", settings);
        Self {
            settings,
            machine: CaptureMachine::new(settings),
            buffer: WaveformBuffer::new(settings.max_samples, polling_rate_hz),
            published: None,
        }
    }

    /// Feeds one raw sample
    pub fn push(&mut self, sample: Sample) -> Result<CaptureEvent, CaptureError> {
        let result = self.advance(|machine, buffer| machine.on_sample(sample, buffer));
        match &result {
            Ok(CaptureEvent::Ignored) | Ok(CaptureEvent::Recorded { .. }) => {}
            Ok(event) => debug!("Sample ({}, {}) -> {:?}", sample.ax, sample.ay, event),
            Err(e) => debug!("Sample ({}, {}) rejected: {}", sample.ax, sample.ay, e),
        }
        result
    }

    /// Advances the cooldown by one presentation cycle
    pub fn tick(&mut self) -> CaptureEvent {
        self.advance(|machine, _| machine.tick())
    }

    /// Clears the buffer and returns to idle
    pub fn reset(&mut self) -> Result<(), CaptureError> {
        let phase = self.phase();
        let result = self.advance(|machine, buffer| machine.reset(buffer));
        match &result {
            Ok(()) => {
                info!("Capture reset from {:?}", phase);
                self.published = None;
            }
            Err(e) => warn!("Capture reset refused: {}", e),
        }
        result
    }

    pub fn phase(&self) -> CapturePhase {
        self.machine.phase()
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Samples recorded so far in the current cycle
    pub fn recorded(&self) -> usize {
        self.buffer.count()
    }

    /// Hands out the snapshot produced when the machine last reached
    /// `Complete`. Returns it once.
    pub fn take_published(&mut self) -> Option<Arc<WaveformData>> {
        self.published.take()
    }

    fn advance<T>(
        &mut self,
        step: impl FnOnce(CaptureMachine, &mut WaveformBuffer) -> (CaptureMachine, T),
    ) -> T {
        let before = self.machine.phase();
        let current = std::mem::replace(&mut self.machine, CaptureMachine::new(self.settings));
        let (next, output) = step(current, &mut self.buffer);
        self.machine = next;

        if before != CapturePhase::Complete && self.machine.phase() == CapturePhase::Complete {
            match self.buffer.snapshot() {
                Ok(data) => {
                    info!(
                        "Capture published: {} samples, {:.3} ms",
                        data.count(),
                        data.total_time_ms()
                    );
                    self.published = Some(Arc::new(data.clone()));
                }
                Err(e) => warn!("Capture complete but buffer not readable: {}", e),
            }
        }
        output
    }
}
