//! The acquisition loop: the only reader of the sample source.
//!
//! Per line: parse, spike-check, append to the display window, the spectral
//! window and the session history, then every C accepted samples recompute
//! the spectrum and peaks. Each accepted sample publishes a fresh
//! [`LiveSnapshot`]. Nothing here waits on a consumer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::live::{LiveFeed, LiveSnapshot};
use super::stats::AcquisitionCounters;
use crate::acquisition::{
    LineEvent, MalformedReason, RawLine, SampleSource, SourceError, TimeBase,
};
use crate::config::AnalyzerConfig;
use crate::processing::{
    PeakAnalyzer, PeakReport, ProcessingError, SlidingWindow, SpectralCadence, SpectralEngine,
    Spectrum, SpectrumBuffer, SpikeDecision, SpikeFilter,
};
use crate::session::{SessionHistory, SessionState};

// ============================================================================
// Acquisition Core (per-sample state machine)
// ============================================================================

/// What happened to one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ingest {
    Accepted { recomputed: bool },
    Rejected,
    Malformed(MalformedReason),
}

/// Per-session processing state, independent of any transport or thread.
///
/// A new session gets a new core, so buffers, filter reference, cadence and
/// history all start empty.
pub struct AcquisitionCore {
    filter: SpikeFilter,
    window: SlidingWindow,
    buffer: SpectrumBuffer,
    engine: SpectralEngine,
    cadence: SpectralCadence,
    analyzer: PeakAnalyzer,
    history: SessionHistory,
    sample_rate: f64,
    spectrum: Arc<Spectrum>,
    peaks: Arc<PeakReport>,
    last_value: Option<f64>,
    /// Last smoothing failure, so a persistent misconfiguration warns once
    smoothing_error: Option<ProcessingError>,
    counters: Arc<AcquisitionCounters>,
    live: LiveFeed,
}

impl AcquisitionCore {
    pub fn new(
        config: &AnalyzerConfig,
        counters: Arc<AcquisitionCounters>,
        live: LiveFeed,
    ) -> Result<Self, ProcessingError> {
        let engine = SpectralEngine::new(config.live.fft_size, config.live.sample_rate)?;
        let spectrum = Arc::new(Spectrum::zeroed(config.live.fft_size, config.live.sample_rate));

        Ok(Self {
            filter: SpikeFilter::new(config.acquisition.spike_reject_threshold),
            window: SlidingWindow::new(config.live.window_size),
            buffer: SpectrumBuffer::new(config.live.fft_size),
            engine,
            cadence: SpectralCadence::new(config.live.recompute_cadence),
            analyzer: PeakAnalyzer::new(&config.peaks)
                .with_threshold(config.live.live_peak_threshold),
            history: SessionHistory::new(),
            sample_rate: config.live.sample_rate,
            spectrum,
            peaks: Arc::new(PeakReport::empty()),
            last_value: None,
            smoothing_error: None,
            counters,
            live,
        })
    }

    /// Handle one raw line that arrived `arrival_secs` into the session.
    pub fn ingest(&mut self, line: &RawLine, arrival_secs: f64) -> Ingest {
        self.counters.line_read();

        match line.parse() {
            LineEvent::Sample(value) => self.push_sample(value, arrival_secs),
            LineEvent::Malformed(reason) => {
                self.counters.malformed();
                debug!(%reason, "Skipping malformed line");
                Ingest::Malformed(reason)
            }
        }
    }

    /// Handle one already-parsed value.
    pub fn push_sample(&mut self, value: f64, arrival_secs: f64) -> Ingest {
        if let SpikeDecision::Reject { previous, delta } = self.filter.check(value) {
            self.counters.spike_rejected();
            debug!(value, previous, delta, "Rejected spike");
            return Ingest::Rejected;
        }

        self.window.push(value);
        self.buffer.push(value);
        self.history.record(value, arrival_secs);
        self.last_value = Some(value);
        let accepted = self.counters.sample_accepted();

        let recomputed = self.cadence.tick();
        if recomputed {
            self.recompute();
        }

        self.live.publish(LiveSnapshot {
            state: SessionState::Sampling,
            window: self.window.padded(),
            spectrum: Arc::clone(&self.spectrum),
            peaks: Arc::clone(&self.peaks),
            last_value: self.last_value,
            accepted_samples: accepted,
        });

        Ingest::Accepted { recomputed }
    }

    /// Recompute the spectrum from the spectral window and re-pick peaks.
    ///
    /// A smoothing failure keeps the previous peaks.
    fn recompute(&mut self) {
        let spectrum = match self.engine.compute(&self.buffer.padded()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Live spectrum computation failed");
                return;
            }
        };
        self.counters.spectrum_computed();

        match self.analyzer.analyze(&spectrum) {
            Ok(report) => {
                self.peaks = Arc::new(report);
                self.smoothing_error = None;
            }
            Err(e) => {
                self.counters.smoothing_failed();
                if self.smoothing_error.as_ref() != Some(&e) {
                    warn!(error = %e, "Live peak analysis failed, keeping previous peaks");
                    self.smoothing_error = Some(e);
                }
            }
        }
        self.spectrum = Arc::new(spectrum);
    }

    /// Current display window, oldest first (unpadded).
    pub fn window(&self) -> Vec<f64> {
        self.window.to_vec()
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    pub fn peaks(&self) -> &PeakReport {
        &self.peaks
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Timestamp of the next accepted sample on the nominal time base.
    pub fn nominal_arrival(&self) -> f64 {
        self.history.len() as f64 / self.sample_rate
    }

    pub fn rejected_spikes(&self) -> u64 {
        self.filter.rejected()
    }

    pub fn into_history(self) -> SessionHistory {
        self.history
    }
}

// ============================================================================
// Acquisition Loop (owns the source)
// ============================================================================

/// Why the loop returned.
#[derive(Debug)]
pub enum LoopExit {
    Cancelled,
    SourceClosed,
    SourceFailed(SourceError),
}

/// Everything handed back when the loop stops.
pub struct LoopOutcome<S> {
    /// The transport, for reuse by the next session
    pub source: S,
    pub history: SessionHistory,
    pub exit: LoopExit,
}

/// Drives an [`AcquisitionCore`] from a [`SampleSource`] until cancelled.
///
/// Blocking: run it on a dedicated thread (`spawn_blocking`).
pub struct AcquisitionLoop<S: SampleSource> {
    source: S,
    core: AcquisitionCore,
    cancel_token: CancellationToken,
    /// Cancelled when `run` returns, however it returns
    finished: CancellationToken,
    idle_poll: Duration,
    started: Instant,
}

impl<S: SampleSource> AcquisitionLoop<S> {
    pub fn new(
        source: S,
        core: AcquisitionCore,
        cancel_token: CancellationToken,
        idle_poll: Duration,
        started: Instant,
    ) -> Self {
        Self {
            source,
            core,
            cancel_token,
            finished: CancellationToken::new(),
            idle_poll,
            started,
        }
    }

    /// Token that fires once the loop has exited.
    pub fn finished_token(&self) -> CancellationToken {
        self.finished.clone()
    }

    /// Poll the source until cancellation or a source error.
    pub fn run(mut self) -> LoopOutcome<S> {
        let _finished = self.finished.clone().drop_guard();
        let time_base = self.source.time_base();
        info!(
            source = %self.source.source_name(),
            ?time_base,
            "Acquisition loop started"
        );

        let exit = loop {
            if self.cancel_token.is_cancelled() {
                break LoopExit::Cancelled;
            }

            match self.source.next_line() {
                Ok(Some(line)) => {
                    let arrival = match time_base {
                        TimeBase::Arrival => self.started.elapsed().as_secs_f64(),
                        TimeBase::Nominal => self.core.nominal_arrival(),
                    };
                    self.core.ingest(&line, arrival);
                }
                Ok(None) => std::thread::sleep(self.idle_poll),
                Err(SourceError::Closed) => {
                    info!(source = %self.source.source_name(), "Sample source closed");
                    break LoopExit::SourceClosed;
                }
                Err(e) => {
                    error!(source = %self.source.source_name(), error = %e, "Sample source failed");
                    break LoopExit::SourceFailed(e);
                }
            }
        };

        info!(
            samples = self.core.history().len(),
            rejected = self.core.rejected_spikes(),
            exit = ?exit,
            "Acquisition loop stopped"
        );

        LoopOutcome {
            source: self.source,
            history: self.core.into_history(),
            exit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MemorySource;

    fn small_config() -> AnalyzerConfig {
        let mut config = AnalyzerConfig::default();
        config.live.window_size = 5;
        config.live.fft_size = 32;
        config.live.sample_rate = 32.0;
        config.live.recompute_cadence = 4;
        config
    }

    fn core(config: &AnalyzerConfig) -> (AcquisitionCore, Arc<AcquisitionCounters>, LiveFeed) {
        let counters = Arc::new(AcquisitionCounters::new());
        let live = LiveFeed::new(LiveSnapshot::empty(SessionState::Sampling, &config.live));
        let core = AcquisitionCore::new(config, counters.clone(), live.clone()).unwrap();
        (core, counters, live)
    }

    #[test]
    fn test_spike_kept_out_of_every_buffer() {
        let config = small_config();
        let (mut core, counters, live) = core(&config);

        let outcomes: Vec<Ingest> = [30.0, 30.0, 30.0, 45.0, 30.0, 30.0]
            .iter()
            .enumerate()
            .map(|(i, v)| core.push_sample(*v, i as f64 * 0.01))
            .collect();

        assert_eq!(outcomes[3], Ingest::Rejected);
        assert_eq!(core.window(), vec![30.0; 5]);
        assert_eq!(core.history().values(), vec![30.0; 5]);
        assert_eq!(counters.snapshot().rejected_spikes, 1);
        assert_eq!(live.load().window, vec![30.0; 5]);
        assert_eq!(live.load().accepted_samples, 5);
    }

    #[test]
    fn test_malformed_lines_counted_not_recorded() {
        let config = small_config();
        let (mut core, counters, _) = core(&config);

        assert_eq!(
            core.ingest(&RawLine::from("abc\r"), 0.0),
            Ingest::Malformed(MalformedReason::NotANumber)
        );
        assert!(matches!(
            core.ingest(&RawLine::from("12.5\r"), 0.1),
            Ingest::Accepted { .. }
        ));

        let stats = counters.snapshot();
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.malformed_lines, 1);
        assert_eq!(stats.accepted_samples, 1);
        assert_eq!(core.history().len(), 1);
    }

    #[test]
    fn test_recompute_on_cadence() {
        let config = small_config();
        let (mut core, counters, live) = core(&config);

        let recomputes: Vec<bool> = (0..8)
            .map(|i| match core.push_sample(1.0 + (i % 2) as f64, i as f64) {
                Ingest::Accepted { recomputed } => recomputed,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            recomputes,
            vec![false, false, false, true, false, false, false, true]
        );
        assert_eq!(counters.snapshot().spectra_computed, 2);
        assert_eq!(live.load().spectrum.fft_size, 32);
        // Spectral window is still mostly zeros, but the DC bin has the sum
        assert!((live.load().spectrum.magnitudes[0] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_failure_keeps_previous_peaks() {
        let mut config = small_config();
        // 16 bins, window 17 can never fit
        config.peaks.smoothing_window_length = 17;
        let (mut core, counters, _) = core(&config);

        for i in 0..8 {
            core.push_sample(1.0, i as f64);
        }
        let stats = counters.snapshot();
        assert_eq!(stats.spectra_computed, 2);
        assert_eq!(stats.smoothing_failures, 2);
        assert!(core.peaks().is_empty());
        assert_eq!(core.spectrum().len(), 16);
    }

    #[test]
    fn test_loop_drains_source_then_reports_closed() {
        let config = small_config();
        let (core, counters, _) = core(&config);
        let source = MemorySource::new(["1.0\r", "oops\r", "2.0\r", "3.0\r"]);

        let acquisition = AcquisitionLoop::new(
            source,
            core,
            CancellationToken::new(),
            Duration::from_millis(1),
            Instant::now(),
        );
        let finished = acquisition.finished_token();
        let outcome = acquisition.run();

        assert!(matches!(outcome.exit, LoopExit::SourceClosed));
        assert!(finished.is_cancelled());
        assert_eq!(outcome.history.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(counters.snapshot().malformed_lines, 1);
        assert_eq!(outcome.source.remaining(), 0);
    }

    #[test]
    fn test_loop_honours_cancellation() {
        let config = small_config();
        let (core, _, _) = core(&config);
        let source = MemorySource::new(["1.0\r"]).keep_open();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = AcquisitionLoop::new(source, core, cancel, Duration::from_millis(1), Instant::now()).run();
        assert!(matches!(outcome.exit, LoopExit::Cancelled));
        assert!(outcome.history.is_empty());
    }

    #[test]
    fn test_arrival_times_non_decreasing() {
        let config = small_config();
        let (core, _, _) = core(&config);
        let values: Vec<f64> = (0..50).map(|i| (i % 5) as f64).collect();
        let outcome = AcquisitionLoop::new(
            MemorySource::from_values(&values).with_time_base(TimeBase::Arrival),
            core,
            CancellationToken::new(),
            Duration::from_millis(1),
            Instant::now(),
        )
        .run();

        let times = outcome.history.arrival_times();
        assert_eq!(times.len(), 50);
        assert!(times.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_untimed_source_stamps_by_sequence() {
        let config = small_config();
        let (core, _, _) = core(&config);
        // 99.0 is rejected, so it must not consume a time slot
        let source = MemorySource::new(["1.0\r", "2.0\r", "99.0\r", "3.0\r"]);
        let outcome = AcquisitionLoop::new(
            source,
            core,
            CancellationToken::new(),
            Duration::from_millis(1),
            Instant::now(),
        )
        .run();

        assert_eq!(outcome.history.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(
            outcome.history.arrival_times(),
            vec![0.0, 1.0 / 32.0, 2.0 / 32.0]
        );
    }
}
