//! Acquisition diagnostics counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, written by the acquisition loop and readable from any
/// thread at any time.
#[derive(Debug, Default)]
pub struct AcquisitionCounters {
    lines_read: AtomicU64,
    malformed_lines: AtomicU64,
    rejected_spikes: AtomicU64,
    accepted_samples: AtomicU64,
    spectra_computed: AtomicU64,
    smoothing_failures: AtomicU64,
}

impl AcquisitionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AcquisitionStats {
        AcquisitionStats {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            rejected_spikes: self.rejected_spikes.load(Ordering::Relaxed),
            accepted_samples: self.accepted_samples.load(Ordering::Relaxed),
            spectra_computed: self.spectra_computed.load(Ordering::Relaxed),
            smoothing_failures: self.smoothing_failures.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter (new session).
    pub fn reset(&self) {
        for counter in [
            &self.lines_read,
            &self.malformed_lines,
            &self.rejected_spikes,
            &self.accepted_samples,
            &self.spectra_computed,
            &self.smoothing_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn spike_rejected(&self) {
        self.rejected_spikes.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new accepted total.
    pub(crate) fn sample_accepted(&self) -> u64 {
        self.accepted_samples.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn spectrum_computed(&self) {
        self.spectra_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn smoothing_failed(&self) {
        self.smoothing_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`AcquisitionCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub lines_read: u64,
    pub malformed_lines: u64,
    pub rejected_spikes: u64,
    pub accepted_samples: u64,
    pub spectra_computed: u64,
    pub smoothing_failures: u64,
}

impl std::fmt::Display for AcquisitionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lines={} accepted={} malformed={} spikes={} spectra={} smoothing_failures={}",
            self.lines_read,
            self.accepted_samples,
            self.malformed_lines,
            self.rejected_spikes,
            self.spectra_computed,
            self.smoothing_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_reset() {
        let c = AcquisitionCounters::new();
        c.line_read();
        c.line_read();
        c.malformed();
        assert_eq!(c.sample_accepted(), 1);
        assert_eq!(c.sample_accepted(), 2);
        c.spike_rejected();

        let s = c.snapshot();
        assert_eq!(s.lines_read, 2);
        assert_eq!(s.malformed_lines, 1);
        assert_eq!(s.accepted_samples, 2);
        assert_eq!(s.rejected_spikes, 1);

        c.reset();
        assert_eq!(c.snapshot(), AcquisitionStats::default());
    }

    #[test]
    fn test_display() {
        let s = AcquisitionStats {
            lines_read: 6,
            accepted_samples: 5,
            rejected_spikes: 1,
            ..Default::default()
        };
        assert!(s.to_string().contains("accepted=5"));
    }
}
