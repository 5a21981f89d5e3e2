//! Acquisition pipeline
//!
//! ```text
//!  SampleSource ──▶ AcquisitionLoop (blocking worker)
//!                      │  parse ─▶ spike filter ─▶ window / spectral buffer / history
//!                      │  every C samples: FFT ─▶ smoothing ─▶ peaks
//!                      ▼
//!                   LiveFeed (ArcSwap) ──▶ periodic consumers
//!
//!  stop: cancel ─▶ join worker ─▶ BatchAnalyzer ─▶ SessionReport
//! ```
//!
//! The acquisition worker never waits on a consumer; consumers only ever load
//! the latest complete snapshot.

mod acquisition_loop;
mod controller;
mod live;
mod stats;

pub use acquisition_loop::{AcquisitionCore, AcquisitionLoop, Ingest, LoopExit, LoopOutcome};
pub use controller::SessionController;
pub use live::{LiveFeed, LiveSnapshot};
pub use stats::{AcquisitionCounters, AcquisitionStats};
