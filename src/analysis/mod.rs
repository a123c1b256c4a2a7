//! Timing analysis of captured stick waveforms
//!
//! Each analyzer reads a finished [`WaveformData`] and produces numeric
//! diagnostics for one technique:
//!
//! - [`snapback`] - axis extremes after releasing the stick
//! - [`pivot`] - time spent in the dash range between two opposite dashes
//! - [`dashback`] - time spent in the ambiguous zone, with and without UCF
//!
//! Analyzers are pure: they never touch the capture buffer, always scan the
//! whole `[0, count)` range and give identical results for the same snapshot.
//! Thresholds follow the PhobVision guide.

pub mod dashback;
pub mod pivot;
pub mod snapback;

pub use dashback::{DashbackAnalyzer, DashbackResult};
pub use pivot::{PivotAnalyzer, PivotResult};
pub use snapback::{SnapbackAnalyzer, SnapbackResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::capture::waveform::{Sample, WaveformData};

/// Length of one displayed frame at 60 Hz
pub const FRAME_TIME_MS: f32 = 1000.0 / 60.0;

/// One frame in microseconds, used for the UCF lookahead
pub const FRAME_TIME_US: u64 = 16_666;

/// |x| at or above this reads as a dash
pub const DASH_THRESHOLD: u8 = 64;

/// |x| both pivot dashes have to reach
pub const PIVOT_PEAK_THRESHOLD: u8 = 80;

/// Lower edge of the ambiguous zone between walk and dash
pub const AMBIGUOUS_ZONE_MIN: u8 = 23;

/// Errors raised by the analyzers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Waveform handed over before the capture finished
    #[error("Waveform not ready for analysis")]
    NotReady,

    /// Ready waveform without samples
    #[error("Waveform contains no samples")]
    Empty,
}

/// Outcome of an event detector
///
/// `NotDetected` is a normal result, kept apart from any numeric value so a
/// missing event is never shown as zeros.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Detection<T> {
    Detected(T),
    NotDetected,
}

impl<T> Detection<T> {
    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected(_))
    }

    pub fn detected(self) -> Option<T> {
        match self {
            Detection::Detected(value) => Some(value),
            Detection::NotDetected => None,
        }
    }
}

/// Common interface of the three analyzers
pub trait Analyzer {
    type Output;

    /// Which test this analyzer implements
    fn kind(&self) -> TestKind;

    /// Runs the analysis over the full sample slice. `samples` is never empty.
    fn run(&self, samples: &[Sample]) -> Self::Output;

    /// Checks the waveform is finished and non-empty, then runs
    fn analyze(&self, data: &WaveformData) -> Result<Self::Output, AnalysisError> {
        if !data.is_ready() {
            return Err(AnalysisError::NotReady);
        }
        if data.is_empty() {
            return Err(AnalysisError::Empty);
        }
        debug!("Running {} analysis on {} samples", self.kind(), data.count());
        Ok(self.run(data.samples()))
    }
}

/// Test selected for display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    #[default]
    Snapback,
    Pivot,
    Dashback,
    None,
}

impl TestKind {
    /// Cycles Snapback → Pivot → Dashback → None → Snapback
    pub fn next(self) -> Self {
        match self {
            TestKind::Snapback => TestKind::Pivot,
            TestKind::Pivot => TestKind::Dashback,
            TestKind::Dashback => TestKind::None,
            TestKind::None => TestKind::Snapback,
        }
    }

    /// How to read the result of this test
    pub fn instructions(&self) -> &'static str {
        match self {
            TestKind::Snapback => {
                "Check the min/max value on a given axis depending on where your stick \
                 started. If you moved the stick left, check the max value on that axis. \
                 Snapback can occur when the max value is at or above 23. If right, then at \
                 or below -23."
            }
            TestKind::Pivot => {
                "For a successful pivot, the stick's position should stay above/below \
                 +64/-64 for ~16.6ms (1 frame). Less, and you might get nothing, more, and \
                 you might get a dashback. The stick also needs to hit 80/-80 on both sides."
            }
            TestKind::Dashback => {
                "A (vanilla) dashback succeeds when the stick doesn't get polled between 23 \
                 and 64, or -23 and -64. Less time in this range is better."
            }
            TestKind::None => "No test selected.",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKind::Snapback => write!(f, "Snapback"),
            TestKind::Pivot => write!(f, "Pivot"),
            TestKind::Dashback => write!(f, "Dashback"),
            TestKind::None => write!(f, "None"),
        }
    }
}

/// Result of whichever test is selected
#[derive(Clone, Debug, PartialEq)]
pub enum TestReport {
    Snapback(SnapbackResult),
    Pivot(Detection<PivotResult>),
    Dashback(Detection<DashbackResult>),
    None,
}

/// Runs the analyzer for `kind` on a finished waveform
pub fn analyze(kind: TestKind, data: &WaveformData) -> Result<TestReport, AnalysisError> {
    match kind {
        TestKind::Snapback => SnapbackAnalyzer.analyze(data).map(TestReport::Snapback),
        TestKind::Pivot => PivotAnalyzer.analyze(data).map(TestReport::Pivot),
        TestKind::Dashback => DashbackAnalyzer.analyze(data).map(TestReport::Dashback),
        TestKind::None => Ok(TestReport::None),
    }
}

/// Percentage helper shared by pivot and dashback
pub(crate) fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

pub(crate) fn sum_time_us(samples: &[Sample]) -> u64 {
    samples.iter().map(|s| u64::from(s.time_delta_us)).sum()
}
