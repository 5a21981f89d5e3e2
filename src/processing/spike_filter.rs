//! Single-sample transient rejection.
//!
//! A plain delta test against the previous accepted value, not a
//! statistical outlier test. Serial framing glitches show up as one wildly
//! wrong reading between two sane ones; this drops that reading.

/// Outcome of checking one candidate sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpikeDecision {
    Accept,
    Reject { previous: f64, delta: f64 },
}

/// Rejects `v` when the previous accepted value `p` is non-zero and
/// `|v - p| > threshold`. The first sample is always accepted.
#[derive(Debug, Clone)]
pub struct SpikeFilter {
    threshold: f64,
    previous: Option<f64>,
    rejected: u64,
}

impl SpikeFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            previous: None,
            rejected: 0,
        }
    }

    /// Check `value`; on acceptance it becomes the new reference.
    pub fn check(&mut self, value: f64) -> SpikeDecision {
        if let Some(p) = self.previous {
            let delta = (value - p).abs();
            if p != 0.0 && delta > self.threshold {
                self.rejected += 1;
                return SpikeDecision::Reject { previous: p, delta };
            }
        }
        self.previous = Some(value);
        SpikeDecision::Accept
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Forget the reference value and zero the rejection count.
    pub fn reset(&mut self) {
        self.previous = None;
        self.rejected = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_always_accepted() {
        let mut f = SpikeFilter::new(10.0);
        assert_eq!(f.check(1_000.0), SpikeDecision::Accept);
    }

    #[test]
    fn test_rejects_large_jump_and_keeps_reference() {
        let mut f = SpikeFilter::new(10.0);
        assert_eq!(f.check(30.0), SpikeDecision::Accept);
        assert_eq!(
            f.check(45.0),
            SpikeDecision::Reject {
                previous: 30.0,
                delta: 15.0
            }
        );
        // Reference is still 30, so 30 is fine
        assert_eq!(f.check(30.0), SpikeDecision::Accept);
        assert_eq!(f.rejected(), 1);
    }

    #[test]
    fn test_boundary_delta_is_accepted() {
        let mut f = SpikeFilter::new(10.0);
        f.check(30.0);
        assert_eq!(f.check(40.0), SpikeDecision::Accept);
    }

    #[test]
    fn test_zero_reference_disables_rejection() {
        let mut f = SpikeFilter::new(10.0);
        f.check(0.0);
        assert_eq!(f.check(35.0), SpikeDecision::Accept);
        assert_eq!(f.rejected(), 0);
    }

    #[test]
    fn test_reset() {
        let mut f = SpikeFilter::new(1.0);
        f.check(5.0);
        f.check(50.0);
        assert_eq!(f.rejected(), 1);
        f.reset();
        assert_eq!(f.rejected(), 0);
        assert_eq!(f.check(50.0), SpikeDecision::Accept);
    }
}
