//! Session controller: start/stop lifecycle around the acquisition loop.
//!
//! `start` hands the source to a blocking worker. `stop` cancels it and
//! waits for the worker to return the source and the history before the
//! batch pass reads anything, so the history is never read while still being
//! appended to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::acquisition_loop::{AcquisitionCore, AcquisitionLoop, LoopExit, LoopOutcome};
use super::live::{LiveFeed, LiveSnapshot};
use super::stats::{AcquisitionCounters, AcquisitionStats};
use crate::acquisition::{SampleSource, SourceError};
use crate::config::AnalyzerConfig;
use crate::session::{BatchAnalyzer, SessionError, SessionReport, SessionState};

struct RunningSession<S> {
    handle: JoinHandle<LoopOutcome<S>>,
    cancel_token: CancellationToken,
    finished: CancellationToken,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Owns the sample source between sessions and the acquisition worker
/// during one.
pub struct SessionController<S: SampleSource> {
    config: AnalyzerConfig,
    state: SessionState,
    source: Option<S>,
    source_name: String,
    running: Option<RunningSession<S>>,
    counters: Arc<AcquisitionCounters>,
    live: LiveFeed,
}

impl<S: SampleSource> SessionController<S> {
    pub fn new(config: AnalyzerConfig, source: S) -> Self {
        let live = LiveFeed::new(LiveSnapshot::empty(SessionState::Idle, &config.live));
        Self {
            source_name: source.source_name().to_string(),
            config,
            state: SessionState::Idle,
            source: Some(source),
            running: None,
            counters: Arc::new(AcquisitionCounters::new()),
            live,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for display consumers.
    pub fn live(&self) -> LiveFeed {
        self.live.clone()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Fires when the acquisition worker exits on its own (source closed or
    /// failed) or after a stop. `None` unless sampling.
    pub fn acquisition_finished(&self) -> Option<CancellationToken> {
        self.running.as_ref().map(|r| r.finished.clone())
    }

    /// Begin a session: `Idle`/`Stopped` → `Sampling`.
    ///
    /// Buffers, history and counters start from zero. Must be called from
    /// within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if !self.state.can_start() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Sampling,
            });
        }

        self.counters.reset();
        let core = AcquisitionCore::new(&self.config, self.counters.clone(), self.live.clone())
            .map_err(SessionError::Processing)?;
        let source = self.source.take().ok_or(SessionError::Source(SourceError::Closed))?;

        self.live
            .publish(LiveSnapshot::empty(SessionState::Sampling, &self.config.live));

        let cancel_token = CancellationToken::new();
        let started = Instant::now();
        let acquisition = AcquisitionLoop::new(
            source,
            core,
            cancel_token.clone(),
            Duration::from_millis(self.config.acquisition.idle_poll_ms),
            started,
        );
        let finished = acquisition.finished_token();
        let handle = tokio::task::spawn_blocking(move || acquisition.run());

        self.running = Some(RunningSession {
            handle,
            cancel_token,
            finished,
            started_at: Utc::now(),
            started,
        });
        self.state = SessionState::Sampling;

        info!(source = %self.source_name, "Session started");
        Ok(())
    }

    /// End the session: `Sampling` → `Stopped`, then run the batch pass.
    pub async fn stop(&mut self) -> Result<SessionReport, SessionError> {
        if !self.state.can_stop() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Stopped,
            });
        }
        let running = self.running.take().ok_or(SessionError::WorkerMissing)?;

        running.cancel_token.cancel();
        let joined = running.handle.await;
        let elapsed_secs = running.started.elapsed().as_secs_f64();

        self.state = SessionState::Stopped;
        self.live.set_state(SessionState::Stopped);

        let outcome =
            joined.map_err(|e| SessionError::AcquisitionPanicked(e.to_string()))?;
        let time_base = outcome.source.time_base();
        self.source = Some(outcome.source);

        let source_error = match outcome.exit {
            LoopExit::SourceFailed(e) => {
                warn!(error = %e, "Session ended by source failure");
                Some(e.to_string())
            }
            LoopExit::SourceClosed | LoopExit::Cancelled => None,
        };

        let stats = self.counters.snapshot();
        info!(
            elapsed_secs,
            samples = outcome.history.len(),
            %stats,
            ?time_base,
            "Session stopped, running batch analysis"
        );

        let analyzer = BatchAnalyzer::new(
            self.config.peaks.clone(),
            self.config.batch.clone(),
            self.config.live.sample_rate,
        )
        .with_time_base(time_base);
        let history = outcome.history;
        let (history, batch) = tokio::task::spawn_blocking(move || {
            let batch = analyzer.analyze(&history, elapsed_secs);
            (history, batch)
        })
        .await
        .map_err(|e| SessionError::BatchPanicked(e.to_string()))?;

        Ok(SessionReport::new(
            running.started_at,
            elapsed_secs,
            self.source_name.clone(),
            source_error,
            stats,
            history,
            batch,
        ))
    }
}

impl<S: SampleSource> Drop for SessionController<S> {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel_token.cancel();
        }
    }
}
