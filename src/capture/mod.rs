//! Capture subsystem for stick waveforms
//!
//! Implements the recording side of the scope:
//!
//! 1. [`waveform`] - Bounded sample buffer and the frozen [`WaveformData`]
//! 2. [`machine`] - Idle / Recording / Locked / Complete state machine
//! 3. [`session`] - Owner of machine and buffer, hands out snapshots
//! 4. [`handle`] - Tokio task wrapper with sample, command and snapshot channels
//!
//! # Architecture
//!
//! ```text
//! Sample ──► CaptureMachine ──► WaveformBuffer ──► Arc<WaveformData> ──► analysis
//!            (decides to write)  (sole writer)     (watch channel)
//! ```

pub mod error;
pub mod handle;
pub mod machine;
pub mod session;
pub mod waveform;

pub use error::CaptureError;
pub use handle::{CaptureCommand, CaptureHandle, CaptureHandleSettings};
pub use machine::{CaptureEvent, CapturePhase, CaptureSettings, ResetPolicy, StopReason};
pub use session::CaptureSession;
pub use waveform::{Sample, WaveformBuffer, WaveformData, MAX_SAMPLES};
