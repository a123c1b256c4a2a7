//! Error definitions for the capture subsystem

use thiserror::Error;

/// Errors raised while recording or handing out a capture
///
/// None of these are fatal. The session logs them and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Append attempted on a buffer that already holds `capacity` samples
    #[error("Waveform buffer full ({capacity} samples)")]
    BufferFull { capacity: usize },

    /// Snapshot requested before the capture finished
    #[error("Capture not ready")]
    NotReady,

    /// Motion arrived while a finished capture has not been reset yet
    #[error("Previous capture has not been reset")]
    NotReset,

    /// Reset requested while recording under the reject policy
    #[error("Reset rejected: capture in progress ({count} samples recorded)")]
    ResetRejected { count: usize },

    /// Capture task is gone or did not answer
    #[error("Channel error: {0}")]
    ChannelError(String),
}
