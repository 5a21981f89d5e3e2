//! Session lifecycle, full-capture history and post-session analysis.
//!
//! ```text
//!   Idle ──start──▶ Sampling ──stop──▶ Stopped
//!                      ▲                  │
//!                      └──────start───────┘   (history cleared)
//! ```

mod batch;
mod report;

pub use batch::{BatchAnalyzer, BatchError, BatchResult};
pub use report::SessionReport;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::SourceError;
use crate::processing::ProcessingError;

// ============================================================================
// Session State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Sampling,
    Stopped,
}

impl SessionState {
    pub fn can_start(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Stopped)
    }

    pub fn can_stop(self) -> bool {
        self == SessionState::Sampling
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Sampling => write!(f, "Sampling"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session transition {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Sample source error: {0}")]
    Source(#[from] SourceError),

    #[error("Acquisition task did not finish cleanly: {0}")]
    AcquisitionPanicked(String),

    #[error("Batch analysis task did not finish cleanly: {0}")]
    BatchPanicked(String),

    #[error("Session is sampling but has no acquisition worker")]
    WorkerMissing,

    #[error("Invalid live processing settings: {0}")]
    Processing(#[from] ProcessingError),
}

// ============================================================================
// Session History
// ============================================================================

/// One accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Position among accepted samples this session, from 0
    pub sequence: u64,
    pub value: f64,
    /// Seconds since session start when the line arrived
    pub arrival_secs: f64,
}

/// Append-only record of every accepted sample in a session.
///
/// Owned by the acquisition loop while sampling; handed back read-only when
/// the session stops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHistory {
    samples: Vec<Sample>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and return its sequence number.
    pub fn record(&mut self, value: f64, arrival_secs: f64) -> u64 {
        let sequence = self.samples.len() as u64;
        self.samples.push(Sample {
            sequence,
            value,
            arrival_secs,
        });
        sequence
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn arrival_times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.arrival_secs).collect()
    }

    /// `(min, max)` of recorded values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.samples.iter().map(|s| s.value);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}
