use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use stickscope::analysis::{self, Detection, TestKind, TestReport};
use stickscope::capture::{
    CaptureHandle, CaptureHandleSettings, CapturePhase, CaptureSettings, WaveformData,
};
use stickscope::source::{PollingRate, ReplaySource, SourceHandle, StickReading};

const PIVOT_XS: [i8; 12] = [40, 85, 85, 85, 50, 0, -50, -85, -85, -85, -40, 0];

fn pivot_readings() -> Vec<StickReading> {
    let mut readings = vec![StickReading::new(0, 0); 5];
    readings.extend(PIVOT_XS.iter().map(|&x| StickReading::new(x, 2)));
    readings
}

fn settings() -> CaptureHandleSettings {
    CaptureHandleSettings {
        capture: CaptureSettings {
            origin_timeout_us: 10_000,
            cooldown_cycles: 2,
            ..CaptureSettings::default()
        },
        cycle_interval: Duration::from_millis(5),
        ..CaptureHandleSettings::default()
    }
}

async fn wait_for_snapshot(
    rx: &mut watch::Receiver<Option<Arc<WaveformData>>>,
) -> Arc<WaveformData> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(data) = rx.borrow_and_update().clone() {
                return data;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("capture never completed")
}

#[tokio::test]
async fn test_replayed_pivot_is_captured_and_analyzed() {
    let (rate_tx, rate_rx) = watch::channel(PollingRate::Normal(120));
    let (sample_tx, sample_rx) = mpsc::channel(1000);

    let source = SourceHandle::spawn(
        ReplaySource::new(pivot_readings()).then_rest(),
        rate_rx.clone(),
        sample_tx,
    );
    let capture = CaptureHandle::spawn(settings(), sample_rx, rate_tx);
    assert_eq!(*rate_rx.borrow(), PollingRate::High(1000));

    let mut snapshots = capture.subscribe();
    let data = wait_for_snapshot(&mut snapshots).await;

    assert!(data.is_ready());
    assert_eq!(data.samples()[0].ax, 40);
    assert_eq!(*capture.phase().borrow(), CapturePhase::Complete);

    match analysis::analyze(TestKind::Snapback, &data).unwrap() {
        TestReport::Snapback(result) => {
            assert_eq!((result.min_x, result.max_x), (-85, 85));
            assert_eq!((result.min_y, result.max_y), (0, 2));
        }
        other => panic!("unexpected report {:?}", other),
    }
    match analysis::analyze(TestKind::Pivot, &data).unwrap() {
        TestReport::Pivot(Detection::Detected(result)) => {
            assert_eq!((result.start_index, result.end_index), (7, 9));
        }
        other => panic!("unexpected report {:?}", other),
    }
    match analysis::analyze(TestKind::Dashback, &data).unwrap() {
        TestReport::Dashback(Detection::Detected(result)) => {
            assert_eq!((result.start_index, result.end_index), (0, 0));
        }
        other => panic!("unexpected report {:?}", other),
    }

    capture.shutdown().await;
    assert_eq!(*rate_rx.borrow(), PollingRate::Normal(120));
    source.shutdown().await;
}

#[tokio::test]
async fn test_reset_clears_published_capture() {
    let (rate_tx, rate_rx) = watch::channel(PollingRate::Normal(120));
    let (sample_tx, sample_rx) = mpsc::channel(1000);

    let source = SourceHandle::spawn(
        ReplaySource::new(pivot_readings()).then_rest(),
        rate_rx,
        sample_tx,
    );
    let capture = CaptureHandle::spawn(settings(), sample_rx, rate_tx);

    let mut snapshots = capture.subscribe();
    let held = wait_for_snapshot(&mut snapshots).await;

    capture.reset().await.unwrap();
    assert!(snapshots.borrow().is_none());
    // readers keep their copy after a reset
    assert!(held.is_ready());
    assert_eq!(held.samples()[0].ax, 40);

    capture.shutdown().await;
    source.shutdown().await;
}
