//! Latest-value channel between the acquisition loop and display consumers.
//!
//! The loop builds a complete [`LiveSnapshot`] and swaps it in atomically.
//! Readers load whatever is current; they never see a half-written buffer
//! and never hold anything that could stall the writer.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::config::LiveConfig;
use crate::processing::{PeakReport, Spectrum};
use crate::session::SessionState;

/// Everything a consumer needs to draw one frame.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    pub state: SessionState,
    /// Most recent W accepted samples, oldest first, zero-padded on the left
    pub window: Vec<f64>,
    /// Latest spectrum; replaced only on recompute ticks
    pub spectrum: Arc<Spectrum>,
    /// Peaks of `spectrum`, or the last good result if smoothing failed
    pub peaks: Arc<PeakReport>,
    pub last_value: Option<f64>,
    pub accepted_samples: u64,
}

impl LiveSnapshot {
    /// Zeroed window and spectrum for a session that has not seen data.
    pub fn empty(state: SessionState, config: &LiveConfig) -> Self {
        Self {
            state,
            window: vec![0.0; config.window_size],
            spectrum: Arc::new(Spectrum::zeroed(config.fft_size, config.sample_rate)),
            peaks: Arc::new(PeakReport::empty()),
            last_value: None,
            accepted_samples: 0,
        }
    }
}

/// Cloneable handle to the current [`LiveSnapshot`].
#[derive(Clone)]
pub struct LiveFeed {
    current: Arc<ArcSwap<LiveSnapshot>>,
}

impl LiveFeed {
    pub fn new(initial: LiveSnapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Most recent complete snapshot.
    pub fn load(&self) -> Arc<LiveSnapshot> {
        self.current.load_full()
    }

    pub(crate) fn publish(&self, snapshot: LiveSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Republish the current snapshot with a new state.
    pub(crate) fn set_state(&self, state: SessionState) {
        self.current.rcu(|snap| {
            let mut next = LiveSnapshot::clone(snap);
            next.state = state;
            next
        });
    }
}

impl std::fmt::Debug for LiveFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.current.load();
        f.debug_struct("LiveFeed")
            .field("state", &snap.state)
            .field("accepted_samples", &snap.accepted_samples)
            .finish()
    }
}
