//! Pivot detection
//!
//! A pivot is a dash in one direction immediately followed by a dash in the
//! other. Reading the capture backward from the last sample, the scan finds
//! the final dash run, the gap before it and the opposite dash run before
//! that:
//!
//! ```text
//! SeekingEnd ──(|x| >= 64)──► SeekingGap ──(|x| < 64, end run hit 80)──► SeekingStart
//!                                 │                                          │
//!                        (end run missed 80)                    (start run hit 80)
//!                                 ▼                                          ▼
//!                              Failed                                      Found
//! ```
//!
//! The time spent in the final dash run decides between no turn, pivot and
//! dashback, relative to one frame.

use tracing::debug;

use crate::analysis::{
    clamp_percent, sum_time_us, Analyzer, Detection, TestKind, DASH_THRESHOLD, FRAME_TIME_MS,
    PIVOT_PEAK_THRESHOLD,
};
use crate::capture::waveform::Sample;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PivotResult {
    /// First sample of the final dash run
    pub start_index: usize,
    /// Last sample of the final dash run
    pub end_index: usize,
    pub time_in_range_ms: f32,
    pub no_turn_percent: f32,
    pub pivot_percent: f32,
    pub dashback_percent: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PivotScan {
    /// No dash seen yet, reading backward
    SeekingEnd,
    /// Inside the final dash run
    SeekingGap { end: usize, hit_peak: bool },
    /// Past the final run, looking for the opposite dash
    SeekingStart {
        start: usize,
        end: usize,
        start_x: Option<i8>,
    },
    Found { start: usize, end: usize, start_x: i8 },
    Failed,
}

fn in_dash_range(x: i8) -> bool {
    x.unsigned_abs() >= DASH_THRESHOLD
}

fn hits_peak(x: i8) -> bool {
    x.unsigned_abs() >= PIVOT_PEAK_THRESHOLD
}

impl PivotScan {
    fn is_terminal(&self) -> bool {
        matches!(self, PivotScan::Found { .. } | PivotScan::Failed)
    }

    fn step(self, index: usize, x: i8) -> PivotScan {
        match self {
            PivotScan::SeekingEnd if in_dash_range(x) => PivotScan::SeekingGap {
                end: index,
                hit_peak: hits_peak(x),
            },
            PivotScan::SeekingEnd => PivotScan::SeekingEnd,

            PivotScan::SeekingGap { end, hit_peak } if in_dash_range(x) => PivotScan::SeekingGap {
                end,
                hit_peak: hit_peak || hits_peak(x),
            },
            PivotScan::SeekingGap { hit_peak: false, .. } => PivotScan::Failed,
            PivotScan::SeekingGap { end, .. } => PivotScan::SeekingStart {
                start: index + 1,
                end,
                start_x: None,
            },

            PivotScan::SeekingStart {
                start,
                end,
                start_x,
            } if in_dash_range(x) => {
                let start_x = start_x.unwrap_or(x);
                if hits_peak(x) {
                    PivotScan::Found {
                        start,
                        end,
                        start_x,
                    }
                } else {
                    PivotScan::SeekingStart {
                        start,
                        end,
                        start_x: Some(start_x),
                    }
                }
            }
            // the opposite run ended without reaching the peak
            PivotScan::SeekingStart {
                start_x: Some(_), ..
            } => PivotScan::Failed,
            seeking @ PivotScan::SeekingStart { .. } => seeking,

            terminal => terminal,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PivotAnalyzer;

impl Analyzer for PivotAnalyzer {
    type Output = Detection<PivotResult>;

    fn kind(&self) -> TestKind {
        TestKind::Pivot
    }

    fn run(&self, samples: &[Sample]) -> Detection<PivotResult> {
        let mut scan = PivotScan::SeekingEnd;
        for (index, sample) in samples.iter().enumerate().rev() {
            scan = scan.step(index, sample.ax);
            if scan.is_terminal() {
                break;
            }
        }

        let PivotScan::Found {
            start,
            end,
            start_x,
        } = scan
        else {
            debug!("No pivot pattern, scan ended in {:?}", scan);
            return Detection::NotDetected;
        };

        let end_x = samples[end].ax;
        if i16::from(end_x) * i16::from(start_x) >= 0 {
            debug!(
                "Pivot dashes on the same side (start {}, end {})",
                start_x, end_x
            );
            return Detection::NotDetected;
        }

        let time_in_range_ms = sum_time_us(&samples[start..=end]) as f32 / 1000.0;
        let diff = FRAME_TIME_MS - time_in_range_ms;

        let (no_turn_percent, pivot_percent, dashback_percent) = if diff < 0.0 {
            let dashback = clamp_percent(-diff / FRAME_TIME_MS * 100.0);
            (0.0, 100.0 - dashback, dashback)
        } else {
            let no_turn = clamp_percent(diff / FRAME_TIME_MS * 100.0);
            (no_turn, 100.0 - no_turn, 0.0)
        };

        debug!(
            "Pivot run [{}..={}] lasted {:.3} ms",
            start, end, time_in_range_ms
        );
        Detection::Detected(PivotResult {
            start_index: start,
            end_index: end,
            time_in_range_ms,
            no_turn_percent,
            pivot_percent,
            dashback_percent,
        })
    }
}
