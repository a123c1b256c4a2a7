//! Waveform storage for a single stick capture
//!
//! A [`WaveformBuffer`] is a bounded, append-only store of [`Sample`]s. The
//! capture session is its only writer. Readers never see the buffer itself,
//! only the frozen [`WaveformData`] handed out by [`WaveformBuffer::snapshot`]
//! once the capture is complete.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::capture::error::CaptureError;

/// Default number of samples a single capture may hold
pub const MAX_SAMPLES: usize = 500;

/// One stick reading plus the time elapsed since the previous reading
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub ax: i8,
    pub ay: i8,
    pub time_delta_us: u32,
}

impl Sample {
    pub fn new(ax: i8, ay: i8, time_delta_us: u32) -> Self {
        Self {
            ax,
            ay,
            time_delta_us,
        }
    }

    /// True if either axis is deflected past `threshold`
    pub fn exceeds(&self, threshold: u8) -> bool {
        self.ax.unsigned_abs() > threshold || self.ay.unsigned_abs() > threshold
    }

    /// True if both axes are strictly inside `threshold`
    pub fn at_origin(&self, threshold: u8) -> bool {
        self.ax.unsigned_abs() < threshold && self.ay.unsigned_abs() < threshold
    }
}

/// Captured waveform with its summary counters
///
/// Only the capture session mutates this type. Everything handed to readers is
/// an immutable copy with `is_ready` set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformData {
    samples: Vec<Sample>,
    capacity: usize,
    total_time_us: u64,
    polling_rate_hz: u32,
    is_ready: bool,
}

impl WaveformData {
    /// Builds a ready waveform from already recorded samples.
    ///
    /// Used for replayed or synthetic data; live captures go through
    /// [`WaveformBuffer`].
    pub fn from_samples(samples: Vec<Sample>, polling_rate_hz: u32) -> Self {
        let total_time_us = samples.iter().map(|s| u64::from(s.time_delta_us)).sum();
        Self {
            capacity: samples.len().max(MAX_SAMPLES),
            samples,
            total_time_us,
            polling_rate_hz,
            is_ready: true,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_time_us(&self) -> u64 {
        self.total_time_us
    }

    pub fn total_time_ms(&self) -> f32 {
        self.total_time_us as f32 / 1000.0
    }

    pub fn polling_rate_hz(&self) -> u32 {
        self.polling_rate_hz
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }
}

/// Bounded append-only sample store written by the capture session
#[derive(Debug)]
pub struct WaveformBuffer {
    data: WaveformData,
}

impl WaveformBuffer {
    pub fn new(capacity: usize, polling_rate_hz: u32) -> Self {
        debug!(
            "Allocating waveform buffer: capacity={} polling_rate={}Hz",
            capacity, polling_rate_hz
        );
        Self {
            data: WaveformData {
                samples: Vec::with_capacity(capacity),
                capacity,
                total_time_us: 0,
                polling_rate_hz,
                is_ready: false,
            },
        }
    }

    /// Clears samples and counters. Allocation is kept for the next cycle.
    pub fn reset(&mut self) {
        self.data.samples.clear();
        self.data.total_time_us = 0;
        self.data.is_ready = false;
    }

    pub fn append(&mut self, sample: Sample) -> Result<usize, CaptureError> {
        if self.data.is_ready {
            return Err(CaptureError::NotReset);
        }
        if self.is_full() {
            return Err(CaptureError::BufferFull {
                capacity: self.data.capacity,
            });
        }
        self.data.samples.push(sample);
        self.data.total_time_us += u64::from(sample.time_delta_us);
        trace!(
            "Appended sample #{}: ({}, {}) +{}us",
            self.data.samples.len(),
            sample.ax,
            sample.ay,
            sample.time_delta_us
        );
        Ok(self.data.samples.len())
    }

    /// Freezes the current contents. Further appends are rejected.
    pub fn mark_ready(&mut self) {
        self.data.is_ready = true;
    }

    pub fn snapshot(&self) -> Result<&WaveformData, CaptureError> {
        if self.data.is_ready {
            Ok(&self.data)
        } else {
            Err(CaptureError::NotReady)
        }
    }

    /// Borrows the contents whether or not the capture has finished.
    ///
    /// Analyzers reject a waveform that is not ready, so this is only useful
    /// for progress display.
    pub fn peek(&self) -> &WaveformData {
        &self.data
    }

    pub fn count(&self) -> usize {
        self.data.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity
    }

    pub fn total_time_us(&self) -> u64 {
        self.data.total_time_us
    }

    pub fn is_ready(&self) -> bool {
        self.data.is_ready
    }

    pub fn is_full(&self) -> bool {
        self.data.samples.len() >= self.data.capacity
    }
}
