//! Signal processing module - buffers, FFT, smoothing, peak picking and
//! resampling for displacement spectra

mod fft;
mod peaks;
mod resample;
mod ring_buffer;
mod smoothing;
mod spike_filter;

pub use fft::{compute_spectrum, SpectralCadence, SpectralEngine};
pub use peaks::{Peak, PeakAnalyzer, PeakReport};
pub use resample::{arrival_jitter, resample_uniform, InterpolationError, Pchip, UniformSeries};
pub use ring_buffer::{RingBuffer, SlidingWindow, SpectrumBuffer};
pub use smoothing::{savgol_coefficients, savgol_filter};
pub use spike_filter::{SpikeDecision, SpikeFilter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in signal processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Invalid smoothing window {window} for spectrum of length {len}: must be odd and < length")]
    InvalidSmoothingWindow { window: usize, len: usize },

    #[error("Invalid smoothing polyorder {order}: must be < window length {window}")]
    InvalidPolyOrder { order: usize, window: usize },

    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Invalid sampling rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Buffer length {actual} does not match FFT size {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

/// Magnitude spectrum over the non-negative frequency bins.
///
/// `frequencies[k] = k * sample_rate / fft_size` for `k = 0..fft_size/2`.
/// Published as a whole and never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Frequency bins (Hz), ascending
    pub frequencies: Vec<f64>,
    /// |X[k]| at each bin, unnormalized
    pub magnitudes: Vec<f64>,
    /// Sample rate the bins were derived from (Hz)
    pub sample_rate: f64,
    /// Transform length F
    pub fft_size: usize,
}

impl Spectrum {
    /// All-zero spectrum with the bin layout of an `fft_size` transform.
    ///
    /// Used as the live value before the first recompute.
    pub fn zeroed(fft_size: usize, sample_rate: f64) -> Self {
        let bins = fft_size / 2;
        Self {
            frequencies: bin_frequencies(fft_size, sample_rate),
            magnitudes: vec![0.0; bins],
            sample_rate,
            fft_size,
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Frequency resolution Δf (Hz per bin).
    pub fn bin_width(&self) -> f64 {
        if self.fft_size == 0 {
            0.0
        } else {
            self.sample_rate / self.fft_size as f64
        }
    }

    /// Iterate `(frequency, magnitude)` pairs in ascending frequency.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.magnitudes.iter().copied())
    }
}

/// Frequencies of the first `fft_size / 2` bins.
pub(crate) fn bin_frequencies(fft_size: usize, sample_rate: f64) -> Vec<f64> {
    let resolution = sample_rate / fft_size as f64;
    (0..fft_size / 2).map(|k| k as f64 * resolution).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_spectrum_layout() {
        let s = Spectrum::zeroed(100, 50.0);
        assert_eq!(s.len(), 50);
        assert_eq!(s.frequencies[0], 0.0);
        assert!((s.frequencies[1] - 0.5).abs() < 1e-12);
        assert!((s.frequencies[49] - 24.5).abs() < 1e-12);
        assert!((s.bin_width() - 0.5).abs() < 1e-12);
        assert!(s.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_odd_fft_size_floors_bin_count() {
        let s = Spectrum::zeroed(7, 7.0);
        assert_eq!(s.len(), 3);
        assert_eq!(s.frequencies, vec![0.0, 1.0, 2.0]);
    }
}
