//! Dashback timing, vanilla and UCF
//!
//! A dashback fails when the stick is polled inside the ambiguous zone
//! (`23 <= |x| < 64`) while reversing. The vanilla figure is based on the
//! time the first ambiguous run lasts. UCF forgives a sample when the stick
//! position one frame later, added to it, travels more than 75 units, so
//! those samples are removed from the UCF time.

use tracing::{debug, trace};

use crate::analysis::{
    clamp_percent, sum_time_us, Analyzer, Detection, TestKind, AMBIGUOUS_ZONE_MIN,
    DASH_THRESHOLD, FRAME_TIME_MS, FRAME_TIME_US,
};
use crate::capture::waveform::Sample;

/// Combined travel over one frame above which UCF converts the input
pub const UCF_TRAVEL_THRESHOLD: i16 = 75;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DashbackResult {
    pub start_index: usize,
    pub end_index: usize,
    pub time_in_range_ms: f32,
    pub ucf_time_in_range_ms: f32,
    pub vanilla_percent: f32,
    pub ucf_percent: f32,
    /// Samples near the end of the capture whose one-frame lookahead ran out
    /// of data; they are never forgiven by UCF
    pub lookahead_exhausted: usize,
}

fn in_ambiguous_zone(x: i8) -> bool {
    let magnitude = x.unsigned_abs();
    (AMBIGUOUS_ZONE_MIN..DASH_THRESHOLD).contains(&magnitude)
}

/// First contiguous ambiguous run as an inclusive index range
fn find_run(samples: &[Sample]) -> Option<(usize, usize)> {
    let start = samples.iter().position(|s| in_ambiguous_zone(s.ax))?;
    let len = samples[start..]
        .iter()
        .take_while(|s| in_ambiguous_zone(s.ax))
        .count();
    Some((start, start + len - 1))
}

/// Index of the first sample at least one frame after `index`, if the capture
/// extends that far
fn frame_lookahead(samples: &[Sample], index: usize) -> Option<usize> {
    let mut elapsed_us: u64 = 0;
    let mut next = index;
    while elapsed_us < FRAME_TIME_US {
        next += 1;
        elapsed_us += u64::from(samples.get(next)?.time_delta_us);
    }
    Some(next)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DashbackAnalyzer;

impl Analyzer for DashbackAnalyzer {
    type Output = Detection<DashbackResult>;

    fn kind(&self) -> TestKind {
        TestKind::Dashback
    }

    fn run(&self, samples: &[Sample]) -> Detection<DashbackResult> {
        let Some((start, end)) = find_run(samples) else {
            debug!("Stick never entered the ambiguous zone");
            return Detection::NotDetected;
        };

        let time_in_range_us = sum_time_us(&samples[start..=end]);
        let time_in_range_ms = time_in_range_us as f32 / 1000.0;
        let vanilla_percent = clamp_percent((1.0 - time_in_range_ms / FRAME_TIME_MS) * 100.0);

        let mut ucf_time_in_range_us = time_in_range_us;
        let mut lookahead_exhausted = 0;
        for index in start..=end {
            let Some(next) = frame_lookahead(samples, index) else {
                trace!("Lookahead from sample {} runs past the capture", index);
                lookahead_exhausted += 1;
                continue;
            };
            let travel = i16::from(samples[index].ax) + i16::from(samples[next].ax);
            if travel > UCF_TRAVEL_THRESHOLD || travel < -UCF_TRAVEL_THRESHOLD {
                ucf_time_in_range_us =
                    ucf_time_in_range_us.saturating_sub(u64::from(samples[index].time_delta_us));
            }
        }

        let ucf_time_in_range_ms = ucf_time_in_range_us as f32 / 1000.0;
        let ucf_percent = if ucf_time_in_range_ms <= 0.0 {
            100.0
        } else {
            clamp_percent((1.0 - ucf_time_in_range_ms / FRAME_TIME_MS) * 100.0)
        };

        debug!(
            "Ambiguous run [{}..={}]: {:.3} ms vanilla, {:.3} ms UCF, {} without lookahead",
            start, end, time_in_range_ms, ucf_time_in_range_ms, lookahead_exhausted
        );
        Detection::Detected(DashbackResult {
            start_index: start,
            end_index: end,
            time_in_range_ms,
            ucf_time_in_range_ms,
            vanilla_percent,
            ucf_percent,
            lookahead_exhausted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::waveform::WaveformData;

    fn waveform(xs: &[i8], dt: u32) -> WaveformData {
        WaveformData::from_samples(xs.iter().map(|&x| Sample::new(x, 0, dt)).collect(), 1000)
    }

    fn detect(data: &WaveformData) -> DashbackResult {
        DashbackAnalyzer.analyze(data).unwrap().detected().unwrap()
    }

    #[test]
    fn test_no_ambiguous_samples() {
        let data = waveform(&[0, 10, 70, 90, 70, 10, 0], 1000);
        assert_eq!(DashbackAnalyzer.analyze(&data).unwrap(), Detection::NotDetected);
    }

    #[test]
    fn test_zone_edges() {
        assert!(in_ambiguous_zone(23));
        assert!(in_ambiguous_zone(-23));
        assert!(in_ambiguous_zone(63));
        assert!(in_ambiguous_zone(-63));
        assert!(!in_ambiguous_zone(22));
        assert!(!in_ambiguous_zone(64));
        assert!(!in_ambiguous_zone(-64));
    }

    #[test]
    fn test_only_first_run_counts() {
        let data = waveform(&[0, 30, 40, 70, 40, 30, 0], 2000);
        let result = detect(&data);

        assert_eq!((result.start_index, result.end_index), (1, 2));
        assert!((result.time_in_range_ms - 4.0).abs() < 1e-3);
        assert!((result.vanilla_percent - 76.0).abs() < 0.01);
    }

    #[test]
    fn test_run_reaching_end_of_capture() {
        let data = waveform(&[0, 10, 30, 40], 1000);
        let result = detect(&data);

        assert_eq!((result.start_index, result.end_index), (2, 3));
        assert_eq!(result.lookahead_exhausted, 2);
    }

    #[test]
    fn test_ucf_forgives_large_travel() {
        // each ambiguous sample is followed one frame later by a full dash
        let mut xs = vec![0, -40, -40];
        xs.extend(std::iter::repeat(-100).take(20));
        let data = waveform(&xs, 5000);
        let result = detect(&data);

        assert!((result.time_in_range_ms - 10.0).abs() < 1e-3);
        assert!((result.vanilla_percent - 40.0).abs() < 0.01);
        assert_eq!(result.ucf_time_in_range_ms, 0.0);
        assert_eq!(result.ucf_percent, 100.0);
        assert_eq!(result.lookahead_exhausted, 0);
    }

    #[test]
    fn test_ucf_keeps_small_travel() {
        let mut xs = vec![0, 30, 30];
        xs.extend(std::iter::repeat(20).take(20));
        let data = waveform(&xs, 5000);
        let result = detect(&data);

        assert_eq!(result.ucf_time_in_range_ms, result.time_in_range_ms);
        assert_eq!(result.ucf_percent, result.vanilla_percent);
    }

    #[test]
    fn test_slow_transit_clamps_to_zero() {
        let data = waveform(&[0, 40, 40, 40, 0, 0, 0, 0, 0, 0], 20_000);
        let result = detect(&data);

        assert_eq!(result.vanilla_percent, 0.0);
        assert_eq!(result.ucf_percent, 0.0);
    }

    #[test]
    fn test_percentages_stay_in_bounds() {
        // deterministic pseudo-random inputs with extreme timings
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..500 {
            let len = 2 + (seed % 60) as usize;
            let samples: Vec<Sample> = (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    let x = (seed % 256) as u8 as i8;
                    let dt = match seed % 4 {
                        0 => 0,
                        1 => 1,
                        2 => seed % 40_000,
                        _ => u32::MAX,
                    };
                    Sample::new(x, 0, dt)
                })
                .collect();
            let data = WaveformData::from_samples(samples, 1000);

            if let Detection::Detected(result) = DashbackAnalyzer.analyze(&data).unwrap() {
                assert!((0.0..=100.0).contains(&result.vanilla_percent));
                assert!((0.0..=100.0).contains(&result.ucf_percent));
                assert!(result.ucf_time_in_range_ms <= result.time_in_range_ms);
            }
        }
    }
}
