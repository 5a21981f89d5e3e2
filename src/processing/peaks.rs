//! Dominant peak extraction from a smoothed spectrum.

use serde::{Deserialize, Serialize};

use super::{savgol_filter, ProcessingError, Spectrum};
use crate::config::PeakConfig;

/// One spectral peak. `magnitude` is taken from the smoothed spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub frequency: f64,
    pub magnitude: f64,
}

/// Result of one peak analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakReport {
    /// At most K peaks, magnitude descending
    pub peaks: Vec<Peak>,
    /// The (K+1)-th candidate, a noise-floor reference
    pub next_peak: Option<Peak>,
    /// Smoothed magnitudes, same bins as the analyzed spectrum
    pub smoothed: Vec<f64>,
}

impl PeakReport {
    pub fn empty() -> Self {
        Self {
            peaks: Vec::new(),
            next_peak: None,
            smoothed: Vec::new(),
        }
    }

    pub fn top(&self) -> Option<&Peak> {
        self.peaks.first()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Magnitude of the next-strongest candidate, if any.
    pub fn baseline(&self) -> Option<f64> {
        self.next_peak.map(|p| p.magnitude)
    }
}

impl Default for PeakReport {
    fn default() -> Self {
        Self::empty()
    }
}

/// Smooth, cut off low frequencies, find strict local maxima, rank.
#[derive(Debug, Clone)]
pub struct PeakAnalyzer {
    window: usize,
    polyorder: usize,
    noise_cutoff: f64,
    count: usize,
    threshold: Option<f64>,
}

impl PeakAnalyzer {
    /// Analyzer for the post-session pass: no amplitude gate.
    pub fn new(config: &PeakConfig) -> Self {
        Self {
            window: config.smoothing_window_length,
            polyorder: config.smoothing_polyorder,
            noise_cutoff: config.noise_freq_cutoff,
            count: config.peak_count,
            threshold: None,
        }
    }

    /// Discard candidates whose smoothed magnitude is below `threshold`.
    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn peak_count(&self) -> usize {
        self.count
    }

    /// Analyze `spectrum`.
    ///
    /// Returns an empty report (not an error) when no bin lies above the
    /// noise cutoff or no local maximum survives.
    pub fn analyze(&self, spectrum: &Spectrum) -> Result<PeakReport, ProcessingError> {
        let smoothed = savgol_filter(&spectrum.magnitudes, self.window, self.polyorder)?;

        let Some(start) = spectrum
            .frequencies
            .iter()
            .position(|&f| f > self.noise_cutoff)
        else {
            return Ok(PeakReport {
                peaks: Vec::new(),
                next_peak: None,
                smoothed,
            });
        };

        let (peaks, next_peak) = rank_maxima(
            &spectrum.frequencies,
            &smoothed,
            start,
            self.threshold,
            self.count,
        );

        tracing::trace!(
            peaks = peaks.len(),
            top_hz = peaks.first().map(|p| p.frequency),
            "Peak analysis complete"
        );

        Ok(PeakReport {
            peaks,
            next_peak,
            smoothed,
        })
    }
}

/// Strict local maxima of `values[start..]`, strongest first, split into the
/// top `count` and the runner-up.
///
/// `values[start]` has no in-band left neighbour and the final element has
/// no right neighbour, so neither can be a peak.
fn rank_maxima(
    frequencies: &[f64],
    values: &[f64],
    start: usize,
    threshold: Option<f64>,
    count: usize,
) -> (Vec<Peak>, Option<Peak>) {
    let n = values.len().min(frequencies.len());
    let mut candidates: Vec<Peak> = (start + 1..n.saturating_sub(1))
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1])
        .filter(|&i| threshold.map_or(true, |t| values[i] >= t))
        .map(|i| Peak {
            frequency: frequencies[i],
            magnitude: values[i],
        })
        .collect();

    // Stable: equal magnitudes keep ascending frequency order
    candidates.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));

    let next_peak = candidates.get(count).copied();
    candidates.truncate(count);
    (candidates, next_peak)
}
