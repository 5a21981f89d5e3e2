//! Full-capture analysis run once a session has stopped.
//!
//! The batch FFT length is the whole (possibly resampled) history, so
//! frequency resolution improves with capture duration. Peak picking uses the
//! same smoothing and cutoff as the live path, without the live threshold.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::SessionHistory;
use crate::acquisition::TimeBase;
use crate::config::{BatchConfig, PeakConfig, ResampleMode};
use crate::processing::{
    arrival_jitter, compute_spectrum, resample_uniform, InterpolationError, PeakAnalyzer,
    PeakReport, ProcessingError, Spectrum, UniformSeries,
};

/// Why the batch pass stopped short
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Resampling failed: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("Spectral analysis failed: {0}")]
    Processing(#[from] ProcessingError),
}

/// Output of one batch pass. Fields past the failure point are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Relative std-dev of inter-arrival intervals
    pub arrival_jitter: Option<f64>,
    pub resampled: Option<UniformSeries>,
    /// Rate the batch spectrum's bins are derived from (Hz)
    pub effective_sample_rate: Option<f64>,
    pub spectrum: Option<Spectrum>,
    pub peaks: Option<PeakReport>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<BatchError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<BatchError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl BatchResult {
    fn failed(arrival_jitter: Option<f64>, error: BatchError) -> Self {
        Self {
            arrival_jitter,
            resampled: None,
            effective_sample_rate: None,
            spectrum: None,
            peaks: None,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Re-runs spectral and peak analysis over a whole session.
#[derive(Debug, Clone)]
pub struct BatchAnalyzer {
    peaks: PeakConfig,
    batch: BatchConfig,
    nominal_rate: f64,
    time_base: TimeBase,
}

impl BatchAnalyzer {
    /// `nominal_rate` is used when the elapsed time cannot give a rate.
    pub fn new(peaks: PeakConfig, batch: BatchConfig, nominal_rate: f64) -> Self {
        Self {
            peaks,
            batch,
            nominal_rate,
            time_base: TimeBase::Arrival,
        }
    }

    /// On [`TimeBase::Nominal`] the history is already on a uniform grid at
    /// `nominal_rate`: resampling is skipped and the elapsed time ignored.
    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    /// Analyze `history` captured over `elapsed_secs`.
    pub fn analyze(&self, history: &SessionHistory, elapsed_secs: f64) -> BatchResult {
        let values = history.values();
        let times = history.arrival_times();
        let jitter = arrival_jitter(&times);

        if values.len() < 2 {
            warn!(samples = values.len(), "Too few samples for batch analysis");
            return BatchResult::failed(
                jitter,
                InterpolationError::TooFewSamples {
                    available: values.len(),
                }
                .into(),
            );
        }

        let resample = match (self.time_base, self.batch.resample_mode) {
            (TimeBase::Nominal, _) | (_, ResampleMode::Never) => false,
            (TimeBase::Arrival, ResampleMode::Always) => true,
            (TimeBase::Arrival, ResampleMode::Auto) => {
                jitter.is_some_and(|j| j > self.batch.jitter_tolerance)
            }
        };
        debug!(
            mode = %self.batch.resample_mode,
            time_base = ?self.time_base,
            jitter = ?jitter,
            resample,
            "Batch resampling decision"
        );

        let (series, rate, resampled) = if resample {
            let (t, v) = strictly_increasing(&times, &values);
            match resample_uniform(&t, &v, self.batch.resample_points) {
                Ok(uniform) => {
                    let rate = uniform.sample_rate;
                    (uniform.values.clone(), rate, Some(uniform))
                }
                Err(e) => {
                    warn!(error = %e, "Batch resampling failed, raw history kept");
                    return BatchResult::failed(jitter, e.into());
                }
            }
        } else {
            let rate = match self.time_base {
                TimeBase::Nominal => self.nominal_rate,
                TimeBase::Arrival => self.raw_rate(history.len(), elapsed_secs),
            };
            (values, rate, None)
        };

        let spectrum = match compute_spectrum(&series, rate) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Batch spectrum failed");
                return BatchResult {
                    resampled,
                    effective_sample_rate: Some(rate),
                    ..BatchResult::failed(jitter, e.into())
                };
            }
        };

        let (peaks, error) = match PeakAnalyzer::new(&self.peaks).analyze(&spectrum) {
            Ok(report) => (Some(report), None),
            Err(e) => {
                warn!(error = %e, bins = spectrum.len(), "Batch peak analysis skipped");
                (None, Some(BatchError::from(e)))
            }
        };

        if let Some(report) = &peaks {
            info!(
                samples = series.len(),
                rate_hz = rate,
                resolution_hz = spectrum.bin_width(),
                top_hz = ?report.top().map(|p| p.frequency),
                "Batch analysis complete"
            );
        }

        BatchResult {
            arrival_jitter: jitter,
            resampled,
            effective_sample_rate: Some(rate),
            spectrum: Some(spectrum),
            peaks,
            error,
        }
    }

    /// Samples per second over the session, or the nominal rate when the
    /// elapsed time is unusable.
    fn raw_rate(&self, samples: usize, elapsed_secs: f64) -> f64 {
        if elapsed_secs.is_finite() && elapsed_secs > 0.0 {
            samples as f64 / elapsed_secs
        } else {
            self.nominal_rate
        }
    }
}

/// Drop samples whose timestamp does not advance, keeping the first of each
/// run of equal times.
fn strictly_increasing(times: &[f64], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut t_out = Vec::with_capacity(times.len());
    let mut v_out = Vec::with_capacity(values.len());
    for (&t, &v) in times.iter().zip(values) {
        if t_out.last().map_or(true, |&last| t > last) {
            t_out.push(t);
            v_out.push(v);
        }
    }
    if t_out.len() < times.len() {
        debug!(
            dropped = times.len() - t_out.len(),
            "Dropped samples with repeated arrival times"
        );
    }
    (t_out, v_out)
}
