//! Session lifecycle integration tests
//!
//! Start/stop through [`SessionController`] with in-memory and file-backed
//! sources, including restarts and mid-stream stops.

use std::f64::consts::PI;
use std::io::Write;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use serial_spectrum::config::AnalyzerConfig;
use serial_spectrum::{
    MemorySource, RawLine, ReaderSource, SampleSource, SessionController, SessionError,
    SessionState, SourceError, TimeBase,
};

fn config() -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.live.sample_rate = 50.0;
    config.live.fft_size = 100;
    config.live.window_size = 20;
    config.live.recompute_cadence = 10;
    config
}

fn tone_values(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 20.0 + (2.0 * PI * 10.0 * i as f64 / 50.0).sin())
        .collect()
}

/// Poll the live feed until `count` samples have been accepted.
async fn wait_for_samples<S: SampleSource>(
    controller: &SessionController<S>,
    count: u64,
) {
    let live = controller.live();
    for _ in 0..500 {
        if live.load().accepted_samples >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "only {} of {count} samples arrived",
        live.load().accepted_samples
    );
}

#[tokio::test]
async fn drained_source_ends_session_with_full_history() {
    let values = tone_values(150);
    let mut controller = SessionController::new(config(), MemorySource::from_values(&values));

    controller.start().unwrap();
    controller.acquisition_finished().unwrap().cancelled().await;
    let report = controller.stop().await.unwrap();

    assert_eq!(report.raw_values(), values);
    assert_eq!(report.stats.accepted_samples, 150);
    assert_eq!(report.stats.spectra_computed, 15);
    assert!(report.source_error.is_none());
    assert!(report.spectrum.is_some());
    assert!(report.peaks.is_some());
}

#[tokio::test]
async fn stop_mid_stream_keeps_what_arrived() {
    let values = tone_values(40);
    let source = MemorySource::from_values(&values).keep_open();
    let mut controller = SessionController::new(config(), source);

    controller.start().unwrap();
    wait_for_samples(&controller, 40).await;

    let snap = controller.live().load();
    assert_eq!(snap.state, SessionState::Sampling);
    assert_eq!(snap.window.len(), 20);
    assert_eq!(snap.window, values[20..].to_vec());

    let report = controller.stop().await.unwrap();
    assert_eq!(controller.state(), SessionState::Stopped);
    assert_eq!(report.raw_history.len(), 40);

    // sequence numbers and arrival times follow acceptance order
    for pair in report.raw_history.windows(2) {
        assert_eq!(pair[1].sequence, pair[0].sequence + 1);
        assert!(pair[1].arrival_secs >= pair[0].arrival_secs);
    }
}

/// Live transport fed from the test body, so one controller can run several
/// sessions over the same source.
struct ChannelSource {
    rx: Receiver<String>,
}

impl SampleSource for ChannelSource {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        match self.rx.try_recv() {
            Ok(line) => Ok(Some(RawLine::from(line))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SourceError::Closed),
        }
    }

    fn source_name(&self) -> &str {
        "channel"
    }
}

fn send_values(tx: &Sender<String>, values: &[f64]) {
    for v in values {
        tx.send(format!("{v}\r")).unwrap();
    }
}

#[tokio::test]
async fn restart_resets_filter_cadence_and_counters() {
    let (tx, rx) = mpsc::channel();
    let mut controller = SessionController::new(config(), ChannelSource { rx });

    // Session 1: one spike, last accepted value 21.0
    controller.start().unwrap();
    send_values(&tx, &[20.0, 20.5, 45.0, 21.0]);
    wait_for_samples(&controller, 3).await;
    let first = controller.stop().await.unwrap();
    assert_eq!(first.raw_values(), vec![20.0, 20.5, 21.0]);
    assert_eq!(first.stats.rejected_spikes, 1);
    assert_eq!(first.stats.spectra_computed, 0);

    // Session 2 starts from zeroed buffers and a fresh snapshot
    controller.start().unwrap();
    let snap = controller.live().load();
    assert_eq!(snap.accepted_samples, 0);
    assert_eq!(snap.window, vec![0.0; 20]);
    assert!(snap.peaks.is_empty());
    assert_eq!(controller.stats(), Default::default());

    // 50.0 is 29 away from session 1's last value, but the spike reference
    // was reset, so it is accepted as a first sample
    let second_values: Vec<f64> = (0..10).map(|i| 50.0 + 0.1 * i as f64).collect();
    send_values(&tx, &second_values[..9]);
    wait_for_samples(&controller, 9).await;
    assert_eq!(controller.stats().rejected_spikes, 0);
    assert_eq!(controller.stats().spectra_computed, 0);

    // Cadence phase restarted too: the 10th sample of this session recomputes
    send_values(&tx, &second_values[9..]);
    wait_for_samples(&controller, 10).await;
    assert_eq!(controller.stats().spectra_computed, 1);

    let second = controller.stop().await.unwrap();
    assert_eq!(second.raw_values(), second_values);
    assert_eq!(second.stats.rejected_spikes, 0);
    assert_eq!(second.raw_history[0].sequence, 0);
}

#[tokio::test]
async fn drained_source_restart_yields_empty_session() {
    let values = tone_values(30);
    let mut controller = SessionController::new(config(), MemorySource::from_values(&values));

    controller.start().unwrap();
    controller.acquisition_finished().unwrap().cancelled().await;
    let first = controller.stop().await.unwrap();
    assert_eq!(first.raw_history.len(), 30);

    controller.start().unwrap();
    controller.acquisition_finished().unwrap().cancelled().await;
    let second = controller.stop().await.unwrap();
    assert!(second.raw_history.is_empty());
    assert_eq!(second.stats.accepted_samples, 0);
    assert!(second.spectrum.is_none());
    assert!(second.batch_error.is_some());
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let mut controller =
        SessionController::new(config(), MemorySource::from_values(&[1.0]).keep_open());
    assert_eq!(controller.state(), SessionState::Idle);

    assert!(matches!(
        controller.stop().await,
        Err(SessionError::InvalidTransition { .. })
    ));

    controller.start().unwrap();
    assert!(matches!(
        controller.start(),
        Err(SessionError::InvalidTransition { .. })
    ));

    controller.stop().await.unwrap();
    assert!(matches!(
        controller.stop().await,
        Err(SessionError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn invalid_live_settings_fail_start() {
    let mut cfg = config();
    cfg.live.fft_size = 1;
    let mut controller = SessionController::new(cfg, MemorySource::from_values(&[1.0]));

    assert!(matches!(
        controller.start(),
        Err(SessionError::Processing(_))
    ));
    assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn replay_file_session() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "30.0\r").unwrap();
    writeln!(file, "30.2\r").unwrap();
    writeln!(file, "garbage\r").unwrap();
    writeln!(file, "95.0\r").unwrap();
    writeln!(file, "30.1\r").unwrap();
    file.flush().unwrap();

    let source = ReaderSource::open_file(file.path(), Duration::from_millis(20)).unwrap();
    let mut controller = SessionController::new(config(), source);

    controller.start().unwrap();
    controller.acquisition_finished().unwrap().cancelled().await;
    let report = controller.stop().await.unwrap();

    assert_eq!(report.raw_values(), vec![30.0, 30.2, 30.1]);
    assert_eq!(report.stats.lines_read, 5);
    assert_eq!(report.stats.malformed_lines, 1);
    assert_eq!(report.stats.rejected_spikes, 1);
    assert!(report.source.starts_with("file:"));
}

#[tokio::test]
async fn replayed_capture_uses_configured_rate() {
    // Read back far faster than 50 Hz; the batch spectrum must still be on
    // the capture's own time base
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let values = tone_values(1000);
    for v in &values {
        writeln!(file, "{v}\r").unwrap();
    }
    file.flush().unwrap();

    let source = ReaderSource::open_file(file.path(), Duration::from_millis(20)).unwrap();
    assert_eq!(source.time_base(), TimeBase::Nominal);
    let mut controller = SessionController::new(config(), source);

    controller.start().unwrap();
    controller.acquisition_finished().unwrap().cancelled().await;
    let report = controller.stop().await.unwrap();

    assert_eq!(report.raw_history.len(), 1000);
    assert!((report.raw_history[999].arrival_secs - 999.0 / 50.0).abs() < 1e-9);
    assert!(report.resampled.is_none());
    assert_eq!(report.effective_sample_rate, Some(50.0));

    let spectrum = report.spectrum.as_ref().unwrap();
    assert!((spectrum.bin_width() - 0.05).abs() < 1e-12);
    let top = report.peaks.as_ref().unwrap().peaks[0];
    assert!((top.frequency - 10.0).abs() <= 0.5, "batch top peak at {}", top.frequency);
}
