//! FFT computation using rustfft
//!
//! Magnitude spectra for the live display and the post-session batch pass.
//!
//! # Conventions
//!
//! - Transform length is exactly the buffer length (no power-of-two padding)
//! - No window function, no normalization: magnitudes are raw `|X[k]|`
//! - Only bins `0..F/2` are reported, DC included
//!
//! # Example
//!
//! ```ignore
//! use serial_spectrum::processing::SpectralEngine;
//!
//! let engine = SpectralEngine::new(2000, 3000.0)?;
//! let spectrum = engine.compute(&spectrum_buffer.padded())?;
//! ```

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use super::{bin_frequencies, ProcessingError, Spectrum};

// ============================================================================
// Standalone FFT
// ============================================================================

/// Magnitude spectrum of an arbitrary-length buffer.
///
/// Plans a fresh transform of `samples.len()`. Used by the batch pass where
/// the length is only known at stop time; the live path keeps a
/// [`SpectralEngine`] instead.
pub fn compute_spectrum(samples: &[f64], sample_rate: f64) -> Result<Spectrum, ProcessingError> {
    if samples.len() < 2 {
        return Err(ProcessingError::InsufficientData {
            needed: 2,
            available: samples.len(),
        });
    }

    SpectralEngine::new(samples.len(), sample_rate)?.compute(samples)
}

// ============================================================================
// Spectral Engine (pre-planned for the live path)
// ============================================================================

/// FFT engine with a pre-planned forward transform of fixed size F.
///
/// `compute` is a pure function of its input, so the same buffer always
/// yields the same spectrum.
pub struct SpectralEngine {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
    sample_rate: f64,
    frequencies: Vec<f64>,
}

impl SpectralEngine {
    /// Plan a transform of `size` points for data sampled at `sample_rate` Hz.
    pub fn new(size: usize, sample_rate: f64) -> Result<Self, ProcessingError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ProcessingError::InvalidSampleRate(sample_rate));
        }
        if size < 2 {
            return Err(ProcessingError::InsufficientData {
                needed: 2,
                available: size,
            });
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        Ok(Self {
            fft,
            size,
            sample_rate,
            frequencies: bin_frequencies(size, sample_rate),
        })
    }

    /// Transform `buffer`, which must hold exactly F samples.
    pub fn compute(&self, buffer: &[f64]) -> Result<Spectrum, ProcessingError> {
        if buffer.len() != self.size {
            return Err(ProcessingError::BufferSizeMismatch {
                expected: self.size,
                actual: buffer.len(),
            });
        }

        let mut data: Vec<Complex<f64>> = buffer.iter().map(|&x| Complex::new(x, 0.0)).collect();
        self.fft.process(&mut data);

        let magnitudes: Vec<f64> = data
            .iter()
            .take(self.size / 2)
            .map(|c| c.norm())
            .collect();

        Ok(Spectrum {
            frequencies: self.frequencies.clone(),
            magnitudes,
            sample_rate: self.sample_rate,
            fft_size: self.size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Hz per bin
    pub fn frequency_resolution(&self) -> f64 {
        self.sample_rate / self.size as f64
    }
}

// ============================================================================
// Recompute cadence
// ============================================================================

/// Fires once every `every` accepted samples.
///
/// Bounds FFT cost on the acquisition thread: at 3 kHz with a cadence of 4
/// the live spectrum refreshes 750 times a second.
#[derive(Debug, Clone)]
pub struct SpectralCadence {
    every: usize,
    count: usize,
}

impl SpectralCadence {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            count: 0,
        }
    }

    /// Record one accepted sample; true when a recompute is due.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.every {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_engine_layout() {
        let engine = SpectralEngine::new(100, 50.0).unwrap();
        assert_eq!(engine.size(), 100);
        assert!((engine.frequency_resolution() - 0.5).abs() < 1e-12);

        let spectrum = engine.compute(&vec![0.0; 100]).unwrap();
        assert_eq!(spectrum.len(), 50);
        assert_eq!(spectrum.frequencies.len(), spectrum.magnitudes.len());
        assert_eq!(spectrum.frequencies[0], 0.0);
    }

    #[test]
    fn test_sine_lands_on_its_bin() {
        let engine = SpectralEngine::new(100, 50.0).unwrap();
        let spectrum = engine.compute(&sine(10.0, 50.0, 100)).unwrap();

        let (idx, _) = spectrum
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((spectrum.frequencies[idx] - 10.0).abs() < 1e-9);
        // Unnormalized: a unit sine over N points peaks at N/2
        assert!((spectrum.magnitudes[idx] - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_dc_bin_is_sum() {
        let engine = SpectralEngine::new(8, 8.0).unwrap();
        let spectrum = engine.compute(&[2.0; 8]).unwrap();
        assert!((spectrum.magnitudes[0] - 16.0).abs() < 1e-9);
        assert!(spectrum.magnitudes[1..].iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_all_zero_input() {
        let engine = SpectralEngine::new(16, 100.0).unwrap();
        let spectrum = engine.compute(&[0.0; 16]).unwrap();
        assert!(spectrum.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let engine = SpectralEngine::new(64, 64.0).unwrap();
        let data = sine(5.0, 64.0, 64);
        assert_eq!(engine.compute(&data).unwrap(), engine.compute(&data).unwrap());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let engine = SpectralEngine::new(16, 100.0).unwrap();
        assert_eq!(
            engine.compute(&[0.0; 15]).unwrap_err(),
            ProcessingError::BufferSizeMismatch {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(matches!(
            SpectralEngine::new(16, 0.0),
            Err(ProcessingError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            SpectralEngine::new(16, f64::NAN),
            Err(ProcessingError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_compute_spectrum_standalone() {
        let spectrum = compute_spectrum(&sine(50.0, 1000.0, 500), 1000.0).unwrap();
        assert_eq!(spectrum.fft_size, 500);
        assert_eq!(spectrum.len(), 250);

        assert!(matches!(
            compute_spectrum(&[1.0], 10.0),
            Err(ProcessingError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_cadence_fires_every_n() {
        let mut cadence = SpectralCadence::new(4);
        let fired: Vec<bool> = (0..8).map(|_| cadence.tick()).collect();
        assert_eq!(
            fired,
            vec![false, false, false, true, false, false, false, true]
        );

        cadence.tick();
        cadence.reset();
        assert!(!cadence.tick());
    }

    #[test]
    fn test_cadence_of_one_always_fires() {
        let mut cadence = SpectralCadence::new(1);
        assert!((0..5).all(|_| cadence.tick()));
    }
}
