//! serial-spectrum: live amplitude spectra from serial displacement sensors
//!
//! A sensor streams one decimal reading per line. The crate turns that stream
//! into a rolling display window, a periodically recomputed magnitude
//! spectrum with its dominant peaks, and at the end of a session a
//! full-capture spectrum computed over the whole (optionally resampled)
//! history.
//!
//! ## Layout
//!
//! - **acquisition**: sample sources (serial port, stdin, replay file) and
//!   line parsing
//! - **processing**: ring buffers, spike filter, FFT, Savitzky–Golay
//!   smoothing, peak picking, PCHIP resampling
//! - **pipeline**: the acquisition loop, the live snapshot feed and the
//!   session controller
//! - **session**: session state, history, batch analysis and reports
//! - **export**: two-column CSV output

pub mod acquisition;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod processing;
pub mod session;

pub use acquisition::{
    parse_sample_line, LineEvent, MalformedReason, MemorySource, RawLine, ReaderSource,
    SampleSource, SerialSource, SourceError, TimeBase,
};
pub use config::{AnalyzerConfig, ConfigError};
pub use pipeline::{AcquisitionStats, LiveFeed, LiveSnapshot, SessionController};
pub use processing::{Peak, PeakAnalyzer, PeakReport, ProcessingError, Spectrum, SpectralEngine};
pub use session::{SessionError, SessionHistory, SessionReport, SessionState};
