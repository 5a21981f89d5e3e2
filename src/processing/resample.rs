//! Shape-preserving resampling of irregularly timed samples.
//!
//! Serial arrival times jitter with OS scheduling and USB framing, so the
//! recorded history is not uniformly spaced. Before the batch FFT it is
//! re-gridded with a monotone piecewise cubic (PCHIP, Fritsch–Carlson
//! slopes), which never overshoots the data between samples.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

/// Errors while building or sampling an interpolant
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("Need at least 2 samples to interpolate, have {available}")]
    TooFewSamples { available: usize },

    #[error("Timestamps must be strictly increasing (violated at index {index})")]
    NonMonotonicTime { index: usize },

    #[error("Time and value series differ in length ({times} vs {values})")]
    LengthMismatch { times: usize, values: usize },

    #[error("Resample grid needs at least 2 points, got {points}")]
    InvalidGrid { points: usize },
}

// ============================================================================
// PCHIP interpolant
// ============================================================================

/// Piecewise cubic Hermite interpolant with monotonicity-preserving slopes.
#[derive(Debug, Clone)]
pub struct Pchip {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
}

impl Pchip {
    /// Build from strictly increasing `x` and matching `y`.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, InterpolationError> {
        if x.len() != y.len() {
            return Err(InterpolationError::LengthMismatch {
                times: x.len(),
                values: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(InterpolationError::TooFewSamples {
                available: x.len(),
            });
        }
        if let Some(index) = x.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(InterpolationError::NonMonotonicTime { index: index + 1 });
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let delta: Vec<f64> = y
            .windows(2)
            .zip(&h)
            .map(|(w, hk)| (w[1] - w[0]) / hk)
            .collect();

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            slopes: pchip_slopes(&h, &delta),
        })
    }

    /// Interpolated value at `t`, clamped to the data's time span.
    pub fn evaluate(&self, t: f64) -> f64 {
        let n = self.x.len();
        let t = t.clamp(self.x[0], self.x[n - 1]);

        // Interval k with x[k] <= t <= x[k+1]
        let k = self.x.partition_point(|&xi| xi <= t).clamp(1, n - 1) - 1;

        let h = self.x[k + 1] - self.x[k];
        let s = (t - self.x[k]) / h;
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * self.y[k]
            + h10 * h * self.slopes[k]
            + h01 * self.y[k + 1]
            + h11 * h * self.slopes[k + 1]
    }

    pub fn span(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }
}

/// Node slopes: weighted harmonic mean of adjacent secants in the interior,
/// zero at local extrema, one-sided three-point estimate at the ends.
fn pchip_slopes(h: &[f64], delta: &[f64]) -> Vec<f64> {
    let n = delta.len() + 1;
    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (m0, m1) = (delta[k - 1], delta[k]);
        if m0 * m1 <= 0.0 {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / m0 + w2 / m1);
    }

    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

fn end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

// ============================================================================
// Uniform resampling
// ============================================================================

/// Series on an evenly spaced time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformSeries {
    /// Grid times (seconds since session start)
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    /// `(points - 1) / span`
    pub sample_rate: f64,
}

impl UniformSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resample `(times, values)` onto `points` evenly spaced instants spanning
/// the first to the last timestamp.
pub fn resample_uniform(
    times: &[f64],
    values: &[f64],
    points: usize,
) -> Result<UniformSeries, InterpolationError> {
    if points < 2 {
        return Err(InterpolationError::InvalidGrid { points });
    }

    let interpolant = Pchip::new(times, values)?;
    let (t0, t1) = interpolant.span();
    let step = (t1 - t0) / (points - 1) as f64;

    let grid: Vec<f64> = (0..points)
        .map(|i| if i == points - 1 { t1 } else { t0 + i as f64 * step })
        .collect();
    let resampled = grid.iter().map(|&t| interpolant.evaluate(t)).collect();

    Ok(UniformSeries {
        times: grid,
        values: resampled,
        sample_rate: 1.0 / step,
    })
}

/// Relative spread of inter-arrival intervals (std dev / mean).
///
/// `None` with fewer than three timestamps, where the spread is undefined.
pub fn arrival_jitter(times: &[f64]) -> Option<f64> {
    if times.len() < 3 {
        return None;
    }
    let intervals: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = intervals.iter().mean();
    if !(mean > 0.0) {
        return None;
    }
    Some(intervals.iter().std_dev() / mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_knots() {
        let x = [0.0, 0.1, 0.25, 0.3, 0.5];
        let y = [1.0, 3.0, 2.0, 2.5, -1.0];
        let p = Pchip::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert!((p.evaluate(*xi) - yi).abs() < 1e-12);
        }
    }

    #[test]
    fn test_linear_data_stays_linear() {
        let x = [0.0, 0.5, 1.2, 2.0, 3.1];
        let y: Vec<f64> = x.iter().map(|t| 2.0 * t + 1.0).collect();
        let p = Pchip::new(&x, &y).unwrap();
        for i in 0..=31 {
            let t = i as f64 * 0.1;
            assert!((p.evaluate(t) - (2.0 * t + 1.0)).abs() < 1e-9, "t={t}");
        }
    }

    #[test]
    fn test_no_overshoot_on_step() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 0.0, 1.0, 1.0, 1.0];
        let p = Pchip::new(&x, &y).unwrap();
        for i in 0..=400 {
            let v = p.evaluate(i as f64 * 0.01);
            assert!((-1e-12..=1.0 + 1e-12).contains(&v), "overshoot {v}");
        }
    }

    #[test]
    fn test_monotone_data_gives_monotone_curve() {
        let x = [0.0, 0.3, 0.4, 1.0, 1.1];
        let y = [0.0, 1.0, 1.1, 5.0, 5.01];
        let p = Pchip::new(&x, &y).unwrap();
        let samples: Vec<f64> = (0..=110).map(|i| p.evaluate(i as f64 * 0.01)).collect();
        assert!(samples.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn test_two_points_is_linear() {
        let p = Pchip::new(&[0.0, 2.0], &[1.0, 5.0]).unwrap();
        assert!((p.evaluate(1.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_clamps_outside_span() {
        let p = Pchip::new(&[0.0, 1.0, 2.0], &[1.0, 2.0, 4.0]).unwrap();
        assert!((p.evaluate(-5.0) - 1.0).abs() < 1e-12);
        assert!((p.evaluate(9.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            Pchip::new(&[0.0], &[1.0]).unwrap_err(),
            InterpolationError::TooFewSamples { available: 1 }
        );
        assert_eq!(
            Pchip::new(&[0.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            InterpolationError::NonMonotonicTime { index: 2 }
        );
        assert!(matches!(
            Pchip::new(&[0.0, 1.0], &[1.0]),
            Err(InterpolationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_resample_uniform_grid() {
        let times = [0.0, 0.09, 0.21, 0.30, 0.41, 0.50];
        let values: Vec<f64> = times.iter().map(|t| 10.0 * t).collect();
        let series = resample_uniform(&times, &values, 11).unwrap();

        assert_eq!(series.len(), 11);
        assert_eq!(series.times[0], 0.0);
        assert_eq!(series.times[10], 0.5);
        assert!((series.sample_rate - 20.0).abs() < 1e-9);
        for (t, v) in series.times.iter().zip(&series.values) {
            assert!((v - 10.0 * t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_resample_needs_two_grid_points() {
        assert_eq!(
            resample_uniform(&[0.0, 1.0], &[0.0, 1.0], 1).unwrap_err(),
            InterpolationError::InvalidGrid { points: 1 }
        );
    }

    #[test]
    fn test_arrival_jitter() {
        let even: Vec<f64> = (0..10).map(|i| i as f64 * 0.01).collect();
        assert!(arrival_jitter(&even).unwrap() < 1e-9);

        let uneven = [0.0, 0.01, 0.05, 0.06, 0.10];
        assert!(arrival_jitter(&uneven).unwrap() > 0.5);

        assert!(arrival_jitter(&[0.0, 1.0]).is_none());
    }
}
