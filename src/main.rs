use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use stickscope::analysis::{self, TestKind};
use stickscope::capture::{CaptureHandle, WaveformData};
use stickscope::config::ScopeConfig;
use stickscope::export::Exporter;
use stickscope::report::CaptureSummary;
use stickscope::source::{GilrsSource, PollingRate, ReplaySource, SourceHandle};

/// Capture file replayed instead of reading a gamepad
const REPLAY_ENV: &str = "STICKSCOPE_REPLAY";

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = ScopeConfig::load_or_default().await?;
    let handle_settings = config.handle_settings();

    let (rate_tx, rate_rx) = watch::channel(PollingRate::Normal(config.polling.normal_hz));
    let (sample_tx, sample_rx) = mpsc::channel(1000);

    let source = spawn_source(rate_rx, sample_tx).await?;
    let capture = CaptureHandle::spawn(handle_settings, sample_rx, rate_tx);

    let mut exporter = Exporter::new(config.export_dir()?);
    let mut test = config.default_test;
    info!("Selected test: {} - {}", test, test.instructions());
    info!("Commands: r = reset, t = next test, e = export, q = quit");

    let mut snapshots = capture.subscribe();
    let mut phase = capture.phase();
    let mut latest: Option<Arc<WaveformData>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Capture task stopped publishing");
                    break;
                }
                latest = snapshots.borrow_and_update().clone();
                if let Some(data) = &latest {
                    show_report(test, data);
                }
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("{}", *phase.borrow_and_update());
            }
            line = lines.next_line() => {
                let Some(line) = read_command(line) else {
                    break;
                };
                match line.trim() {
                    "r" => match capture.reset().await {
                        Ok(()) => info!("Capture reset"),
                        Err(e) => warn!("Reset refused: {}", e),
                    },
                    "t" => {
                        test = test.next();
                        info!("Selected test: {} - {}", test, test.instructions());
                        if let Some(data) = &latest {
                            show_report(test, data);
                        }
                    }
                    "e" => match &latest {
                        Some(data) => {
                            if let Err(e) = exporter.export(data).await {
                                error!("Export failed: {}", e);
                            }
                        }
                        None => warn!("No finished capture to export"),
                    },
                    "q" => break,
                    "" => {}
                    other => warn!("Unknown command '{}', use r, t, e or q", other),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    capture.shutdown().await;
    source.shutdown().await;
    info!("Stickscope stopped");
    Ok(())
}

async fn spawn_source(
    rate_rx: watch::Receiver<PollingRate>,
    sample_tx: mpsc::Sender<stickscope::capture::Sample>,
) -> Result<SourceHandle> {
    match std::env::var(REPLAY_ENV) {
        Ok(path) => {
            let path = PathBuf::from(path);
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| eyre!("Failed to read replay file {}: {}", path.display(), e))?;
            let line = content
                .lines()
                .find(|line| !line.trim().is_empty())
                .ok_or_else(|| eyre!("Replay file {} is empty", path.display()))?;
            let replay = ReplaySource::from_csv_line(line)
                .map_err(|e| eyre!("Invalid replay file {}: {}", path.display(), e))?
                .then_rest();
            info!("Replaying {} readings from {}", replay.len(), path.display());
            Ok(SourceHandle::spawn(replay, rate_rx, sample_tx))
        }
        Err(_) => {
            let gamepad =
                GilrsSource::create().map_err(|e| eyre!("Failed to open gamepad: {}", e))?;
            Ok(SourceHandle::spawn(gamepad, rate_rx, sample_tx))
        }
    }
}

/// Unwraps one stdin line; `None` ends the command loop
fn read_command(line: std::io::Result<Option<String>>) -> Option<String> {
    match line {
        Ok(Some(line)) => Some(line),
        Ok(None) => {
            info!("Input closed");
            None
        }
        Err(e) => {
            error!("Failed to read command: {}", e);
            None
        }
    }
}

fn show_report(test: TestKind, data: &WaveformData) {
    info!(
        "{} at {}Hz",
        CaptureSummary::from(data),
        data.polling_rate_hz()
    );
    match analysis::analyze(test, data) {
        Ok(report) => info!("{}: {}", test, report),
        Err(e) => warn!("{} analysis failed: {}", test, e),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

/// Level filter from `RUST_LOG`, falling back to `info`
fn log_filter(value: Option<&str>) -> EnvFilter {
    value
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn setup_logging_env() {
    let rust_log = std::env::var("RUST_LOG").ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
