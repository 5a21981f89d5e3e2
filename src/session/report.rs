//! End-of-session report.
//!
//! Plain data: the front end decides whether it becomes JSON, CSV, a plot or
//! console text.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BatchResult, Sample, SessionHistory};
use crate::pipeline::AcquisitionStats;
use crate::processing::{PeakReport, Spectrum, UniformSeries};

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub source: String,
    /// Set when the transport failed mid-session
    pub source_error: Option<String>,
    pub stats: AcquisitionStats,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub arrival_jitter: Option<f64>,
    pub effective_sample_rate: Option<f64>,
    pub spectrum: Option<Spectrum>,
    pub peaks: Option<PeakReport>,
    pub resampled: Option<UniformSeries>,
    /// Why the batch pass stopped short, if it did
    pub batch_error: Option<String>,
    pub raw_history: Vec<Sample>,
}

impl SessionReport {
    pub fn new(
        started_at: DateTime<Utc>,
        elapsed_secs: f64,
        source: String,
        source_error: Option<String>,
        stats: AcquisitionStats,
        history: SessionHistory,
        batch: BatchResult,
    ) -> Self {
        let range = history.value_range();
        Self {
            started_at,
            elapsed_secs,
            source,
            source_error,
            stats,
            min_value: range.map(|(lo, _)| lo),
            max_value: range.map(|(_, hi)| hi),
            arrival_jitter: batch.arrival_jitter,
            effective_sample_rate: batch.effective_sample_rate,
            spectrum: batch.spectrum,
            peaks: batch.peaks,
            resampled: batch.resampled,
            batch_error: batch.error.map(|e| e.to_string()),
            raw_history: history.into_samples(),
        }
    }

    pub fn raw_values(&self) -> Vec<f64> {
        self.raw_history.iter().map(|s| s.value).collect()
    }

    /// Human-readable summary for the console.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Session Summary\n");
        out.push_str("===============\n");
        out.push_str(&format!(
            "Started: {}  Duration: {:.2} s  Source: {}\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.elapsed_secs,
            self.source
        ));
        out.push_str(&format!("Counters: {}\n", self.stats));

        if let (Some(lo), Some(hi)) = (self.min_value, self.max_value) {
            out.push_str(&format!("Range: {lo} .. {hi}\n"));
        }
        if let Some(rate) = self.effective_sample_rate {
            let how = if self.resampled.is_some() {
                "resampled"
            } else {
                "raw"
            };
            out.push_str(&format!("Effective rate: {rate:.1} Hz ({how})\n"));
        }
        if let Some(e) = &self.source_error {
            out.push_str(&format!("Source error: {e}\n"));
        }

        match (&self.peaks, &self.batch_error) {
            (Some(report), _) if !report.is_empty() => {
                out.push_str("\nDominant peaks:\n");
                for (i, p) in report.peaks.iter().enumerate() {
                    out.push_str(&format!(
                        "{}. {:.3} Hz  magnitude {:.4}\n",
                        i + 1,
                        p.frequency,
                        p.magnitude
                    ));
                }
                if let Some(next) = report.next_peak {
                    out.push_str(&format!(
                        "Next-peak baseline: {:.4} at {:.3} Hz\n",
                        next.magnitude, next.frequency
                    ));
                }
            }
            (Some(_), _) => out.push_str("\nNo peaks above the noise cutoff\n"),
            (None, Some(e)) => out.push_str(&format!("\nBatch analysis skipped: {e}\n")),
            (None, None) => {}
        }

        out
    }
}
