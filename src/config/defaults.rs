//! System-wide default constants.
//!
//! Every tunable in [`AnalyzerConfig`](super::AnalyzerConfig) defaults to one
//! of these values. Grouped by subsystem for easy discovery.

// ============================================================================
// Acquisition
// ============================================================================

/// Serial port opened when no `--port` / `acquisition.port` is given.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Serial line rate. The bench sensor streams at 921 600 baud.
pub const DEFAULT_BAUD_RATE: u32 = 921_600;

/// Upper bound on how long `next_line()` may block waiting for bytes (ms).
pub const SOURCE_READ_TIMEOUT_MS: u64 = 10;

/// Sleep between polls when the source had nothing to offer (ms).
pub const IDLE_POLL_MS: u64 = 1;

/// Maximum jump between consecutive accepted samples (domain units).
///
/// Larger deltas are treated as serial framing glitches and dropped.
pub const SPIKE_REJECT_THRESHOLD: f64 = 10.0;

/// Lines buffered between a reader thread and the acquisition loop.
pub const READER_CHANNEL_CAPACITY: usize = 8_192;

/// Longest line accepted from a transport before it is discarded as garbage.
pub const MAX_LINE_BYTES: usize = 256;

// ============================================================================
// Live Analysis
// ============================================================================

/// Nominal sensor sample rate (Hz).
pub const SAMPLE_RATE_HZ: f64 = 3_000.0;

/// Display window length W (samples).
pub const WINDOW_SIZE: usize = 500;

/// FFT length F (samples). 2 000 at 3 kHz gives 1.5 Hz resolution.
pub const FFT_SIZE: usize = 2_000;

/// Accepted samples between live spectral recomputes.
pub const RECOMPUTE_CADENCE: usize = 4;

// ============================================================================
// Peak Analysis
// ============================================================================

/// Savitzky–Golay window length L (must be odd).
pub const SMOOTHING_WINDOW_LENGTH: usize = 11;

/// Savitzky–Golay polynomial order P (must be < L).
pub const SMOOTHING_POLYORDER: usize = 2;

/// Bins at or below this frequency are treated as DC / drift (Hz).
pub const NOISE_FREQ_CUTOFF_HZ: f64 = 2.0;

/// Number of ranked peaks reported (K).
pub const PEAK_COUNT: usize = 3;

// ============================================================================
// Batch Analysis
// ============================================================================

/// Uniform grid size used when resampling a full session history.
pub const RESAMPLE_POINTS: usize = 500;

/// Relative std-dev of inter-arrival intervals above which `auto` mode
/// resamples the history before the batch FFT.
pub const JITTER_TOLERANCE: f64 = 0.05;

// ============================================================================
// Front End
// ============================================================================

/// Period of the console consumer that reports live peaks (ms).
pub const CONSOLE_REFRESH_MS: u64 = 500;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "spectrum.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SPECTRUM_CONFIG";
