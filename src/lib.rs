//! Stickscope - joystick oscilloscope
//!
//! Captures analog stick motion at a high polling rate, freezes the
//! waveform once the stick returns to rest and times it against the
//! Snapback, Pivot and Dashback checks.
//!
//! ```text
//! SampleSource → SourceHandle ─[Sample]→ CaptureHandle ─[Arc<WaveformData>]→ analysis
//!                     ▲                        │
//!                     └──── PollingRate ───────┘
//! ```

pub mod analysis;
pub mod capture;
pub mod config;
pub mod export;
pub mod report;
pub mod source;
