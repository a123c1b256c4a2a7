//! Snapback: axis extremes over the whole capture

use crate::analysis::{Analyzer, TestKind};
use crate::capture::waveform::Sample;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapbackResult {
    pub min_x: i8,
    pub max_x: i8,
    pub min_y: i8,
    pub max_y: i8,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SnapbackAnalyzer;

impl Analyzer for SnapbackAnalyzer {
    type Output = SnapbackResult;

    fn kind(&self) -> TestKind {
        TestKind::Snapback
    }

    fn run(&self, samples: &[Sample]) -> SnapbackResult {
        let first = samples.first().copied().unwrap_or_default();
        let initial = SnapbackResult {
            min_x: first.ax,
            max_x: first.ax,
            min_y: first.ay,
            max_y: first.ay,
        };

        samples.iter().fold(initial, |acc, s| SnapbackResult {
            min_x: acc.min_x.min(s.ax),
            max_x: acc.max_x.max(s.ax),
            min_y: acc.min_y.min(s.ay),
            max_y: acc.max_y.max(s.ay),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::waveform::WaveformData;

    #[test]
    fn test_extremes() {
        let data = WaveformData::from_samples(
            vec![
                Sample::new(10, 5, 1000),
                Sample::new(-30, 20, 1000),
                Sample::new(15, -25, 1000),
            ],
            1000,
        );
        let result = SnapbackAnalyzer.analyze(&data).unwrap();

        assert_eq!(
            result,
            SnapbackResult {
                min_x: -30,
                max_x: 15,
                min_y: -25,
                max_y: 20,
            }
        );
    }

    #[test]
    fn test_single_sample() {
        let data = WaveformData::from_samples(vec![Sample::new(-7, 9, 1000)], 1000);
        let result = SnapbackAnalyzer.analyze(&data).unwrap();

        assert_eq!((result.min_x, result.max_x), (-7, -7));
        assert_eq!((result.min_y, result.max_y), (9, 9));
    }

    #[test]
    fn test_full_range() {
        let data = WaveformData::from_samples(
            vec![
                Sample::new(0, 0, 1000),
                Sample::new(127, -128, 1000),
                Sample::new(-128, 127, 1000),
            ],
            1000,
        );
        let result = SnapbackAnalyzer.analyze(&data).unwrap();

        assert_eq!((result.min_x, result.max_x), (-128, 127));
        assert_eq!((result.min_y, result.max_y), (-128, 127));
    }
}
