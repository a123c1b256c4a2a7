//! CSV export of finished captures
//!
//! A capture is written as a single line of comma separated `x,y` pairs.
//! Files are named after the local time plus a rolling 0-9 index so several
//! exports within one second do not collide.

use chrono::Local;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::capture::waveform::WaveformData;

const FILE_INDEX_WRAP: u8 = 10;

/// Renders a capture as one CSV line, `x,y,x,y,...` plus a trailing newline
pub fn to_csv_line(data: &WaveformData) -> String {
    let mut line = data
        .samples()
        .iter()
        .map(|s| format!("{},{}", s.ax, s.ay))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

pub struct Exporter {
    directory: PathBuf,
    next_index: u8,
}

impl Exporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            next_index: 0,
        }
    }

    fn next_file_name(&mut self) -> String {
        let name = format!(
            "{}_{}.csv",
            Local::now().format("%Y-%m-%d_%H-%M-%S"),
            self.next_index
        );
        self.next_index = (self.next_index + 1) % FILE_INDEX_WRAP;
        name
    }

    /// Writes `data` to a new file and returns its path
    pub async fn export(&mut self, data: &WaveformData) -> Result<PathBuf> {
        if !data.is_ready() {
            return Err(eyre!("Capture is not finished, nothing to export"));
        }

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| eyre!("Failed to create export directory: {}", e))?;

        let file_name = self.next_file_name();
        let path = self.directory.join(file_name);
        debug!("Exporting {} samples to {}", data.count(), path.display());

        write_new_file(&path, data).await?;

        info!("Exported capture to {}", path.display());
        Ok(path)
    }
}

/// Creates `path` and writes the capture into it; an existing file is an error
async fn write_new_file(path: &Path, data: &WaveformData) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| eyre!("Failed to create export file {}: {}", path.display(), e))?;
    file.write_all(to_csv_line(data).as_bytes())
        .await
        .map_err(|e| eyre!("Failed to write export file: {}", e))?;
    file.flush()
        .await
        .map_err(|e| eyre!("Failed to flush export file: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::waveform::{Sample, WaveformBuffer};
    use crate::source::{ReplaySource, SampleSource, StickReading};

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stickscope-export-{}-{}", std::process::id(), name))
    }

    fn capture() -> WaveformData {
        WaveformData::from_samples(
            vec![
                Sample::new(10, 5, 0),
                Sample::new(-30, 20, 1000),
                Sample::new(15, -25, 1000),
            ],
            1000,
        )
    }

    #[test]
    fn test_csv_line() {
        assert_eq!(to_csv_line(&capture()), "10,5,-30,20,15,-25\n");
    }

    #[test]
    fn test_csv_line_replays() {
        let mut source = ReplaySource::from_csv_line(&to_csv_line(&capture())).unwrap();
        assert_eq!(source.read().unwrap(), StickReading::new(10, 5));
        assert_eq!(source.read().unwrap(), StickReading::new(-30, 20));
        assert_eq!(source.read().unwrap(), StickReading::new(15, -25));
    }

    #[test]
    fn test_file_index_wraps() {
        let mut exporter = Exporter::new(temp_dir("names"));
        let names: Vec<String> = (0..11).map(|_| exporter.next_file_name()).collect();
        assert!(names[0].ends_with("_0.csv"));
        assert!(names[9].ends_with("_9.csv"));
        assert!(names[10].ends_with("_0.csv"));
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let dir = temp_dir("write");
        let mut exporter = Exporter::new(&dir);

        let path = exporter.export(&capture()).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "10,5,-30,20,15,-25\n");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_export_refuses_unfinished_capture() {
        let dir = temp_dir("unfinished");
        let mut exporter = Exporter::new(&dir);
        let mut buffer = WaveformBuffer::new(10, 1000);
        buffer.append(Sample::new(40, 0, 0)).unwrap();

        assert!(exporter.export(buffer.peek()).await.is_err());
    }

    #[tokio::test]
    async fn test_export_never_overwrites() {
        let dir = temp_dir("overwrite");
        let mut exporter = Exporter::new(&dir);
        let first = exporter.export(&capture()).await.unwrap();

        assert!(write_new_file(&first, &capture()).await.is_err());
        let content = tokio::fs::read_to_string(&first).await.unwrap();
        assert_eq!(content, "10,5,-30,20,15,-25\n");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
