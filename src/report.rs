//! Text rendering of captures and test results

use std::fmt;

use crate::analysis::{
    DashbackResult, Detection, PivotResult, SnapbackResult, TestKind, TestReport,
};
use crate::capture::waveform::WaveformData;

/// One-line summary of a finished capture
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureSummary {
    pub count: usize,
    pub total_time_ms: f32,
}

impl From<&WaveformData> for CaptureSummary {
    fn from(data: &WaveformData) -> Self {
        Self {
            count: data.count(),
            total_time_ms: data.total_time_ms(),
        }
    }
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total: {}, {:.3} ms", self.count, self.total_time_ms)
    }
}

impl fmt::Display for SnapbackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Min X: {:04} | Min Y: {:04}   |   Max X: {:04} | Max Y: {:04}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl fmt::Display for PivotResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MS: {:2.2} | No turn: {:2.0}% | Pivot: {:2.0}% | Dashback: {:2.0}%",
            self.time_in_range_ms, self.no_turn_percent, self.pivot_percent, self.dashback_percent
        )
    }
}

impl fmt::Display for DashbackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vanilla Success: {:2.0}% | UCF Success: {:2.0}%",
            self.vanilla_percent, self.ucf_percent
        )
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestReport::Snapback(result) => write!(f, "{}", result),
            TestReport::Pivot(Detection::Detected(result)) => write!(f, "{}", result),
            TestReport::Pivot(Detection::NotDetected) => write!(f, "No pivot input detected."),
            TestReport::Dashback(Detection::Detected(result)) => write!(f, "{}", result),
            TestReport::Dashback(Detection::NotDetected) => {
                write!(f, "No dashback input detected.")
            }
            TestReport::None => write!(f, "{}", TestKind::None.instructions()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::waveform::Sample;

    #[test]
    fn test_summary_line() {
        let data = WaveformData::from_samples(
            vec![Sample::new(10, 0, 0), Sample::new(20, 0, 1500), Sample::new(0, 0, 1001)],
            1000,
        );
        assert_eq!(CaptureSummary::from(&data).to_string(), "Total: 3, 2.501 ms");
    }

    #[test]
    fn test_snapback_line() {
        let report = TestReport::Snapback(SnapbackResult {
            min_x: -30,
            max_x: 15,
            min_y: -25,
            max_y: 20,
        });
        assert_eq!(
            report.to_string(),
            "Min X: -030 | Min Y: -025   |   Max X: 0015 | Max Y: 0020"
        );
    }

    #[test]
    fn test_pivot_line() {
        let report = TestReport::Pivot(Detection::Detected(PivotResult {
            start_index: 7,
            end_index: 9,
            time_in_range_ms: 12.0,
            no_turn_percent: 28.0,
            pivot_percent: 72.0,
            dashback_percent: 0.0,
        }));
        assert_eq!(
            report.to_string(),
            "MS: 12.00 | No turn: 28% | Pivot: 72% | Dashback:  0%"
        );
    }

    #[test]
    fn test_dashback_line() {
        let report = TestReport::Dashback(Detection::Detected(DashbackResult {
            start_index: 1,
            end_index: 2,
            time_in_range_ms: 10.0,
            ucf_time_in_range_ms: 0.0,
            vanilla_percent: 40.0,
            ucf_percent: 100.0,
            lookahead_exhausted: 0,
        }));
        assert_eq!(report.to_string(), "Vanilla Success: 40% | UCF Success: 100%");
    }

    #[test]
    fn test_not_detected_lines() {
        assert_eq!(
            TestReport::Pivot(Detection::NotDetected).to_string(),
            "No pivot input detected."
        );
        assert_eq!(
            TestReport::Dashback(Detection::NotDetected).to_string(),
            "No dashback input detected."
        );
    }
}
