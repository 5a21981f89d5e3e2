//! Analyzer Configuration - every acquisition and analysis knob as a TOML value
//!
//! Each struct implements `Default` with values from [`super::defaults`],
//! so an empty or missing config file behaves exactly like the built-in
//! settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one analyzer deployment.
///
/// Load with [`AnalyzerConfig::load`] which searches:
/// 1. An explicit path
/// 2. `$SPECTRUM_CONFIG`
/// 3. `./spectrum.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Transport and sample-level filtering
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Live display window and spectral cadence
    #[serde(default)]
    pub live: LiveConfig,

    /// Smoothing and peak ranking (shared by live and batch analysis)
    #[serde(default)]
    pub peaks: PeakConfig,

    /// Full-session analysis on stop
    #[serde(default)]
    pub batch: BatchConfig,
}

impl AnalyzerConfig {
    /// Load configuration using the standard search order.
    ///
    /// Load failures at any step are logged and the search falls through to
    /// the next candidate, ending at built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        // 1. Explicit path (CLI)
        if let Some(p) = explicit {
            match Self::load_from_file(p) {
                Ok(config) => {
                    info!(path = %p.display(), "Loaded analyzer config from --config");
                    return config;
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "Failed to load --config file, falling back");
                }
            }
        }

        // 2. Env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analyzer config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 3. ./spectrum.toml
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analyzer config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        // 4. Defaults
        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys only produce warnings; range violations are fatal.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML (used by `--print-config`).
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check cross-field and range constraints, collecting every violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_ranges(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Acquisition
// ============================================================================

/// Transport settings plus the per-sample spike filter.
///
/// `port` and `baud_rate` are opaque to the core; only the serial transport
/// interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bounded wait inside `next_line()` (ms)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Back-off when the source is empty (ms)
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Maximum |v - previous| before a sample is dropped as a spike
    #[serde(default = "default_spike_reject_threshold")]
    pub spike_reject_threshold: f64,
}

fn default_port() -> String {
    defaults::DEFAULT_PORT.to_string()
}
fn default_baud_rate() -> u32 {
    defaults::DEFAULT_BAUD_RATE
}
fn default_read_timeout_ms() -> u64 {
    defaults::SOURCE_READ_TIMEOUT_MS
}
fn default_idle_poll_ms() -> u64 {
    defaults::IDLE_POLL_MS
}
fn default_spike_reject_threshold() -> f64 {
    defaults::SPIKE_REJECT_THRESHOLD
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            idle_poll_ms: default_idle_poll_ms(),
            spike_reject_threshold: default_spike_reject_threshold(),
        }
    }
}

// ============================================================================
// Live Analysis
// ============================================================================

/// Display window W, spectral window F and the recompute cadence C.
///
/// W and F are independent on purpose: F sets frequency resolution
/// (`sample_rate / F`), W sets how much history the time plot shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    /// Accepted samples between spectral recomputes
    #[serde(default = "default_recompute_cadence")]
    pub recompute_cadence: usize,

    /// Live peaks below this smoothed magnitude are discarded
    #[serde(default)]
    pub live_peak_threshold: Option<f64>,
}

fn default_sample_rate() -> f64 {
    defaults::SAMPLE_RATE_HZ
}
fn default_window_size() -> usize {
    defaults::WINDOW_SIZE
}
fn default_fft_size() -> usize {
    defaults::FFT_SIZE
}
fn default_recompute_cadence() -> usize {
    defaults::RECOMPUTE_CADENCE
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            window_size: default_window_size(),
            fft_size: default_fft_size(),
            recompute_cadence: default_recompute_cadence(),
            live_peak_threshold: None,
        }
    }
}

// ============================================================================
// Peak Analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Savitzky–Golay window length L (odd)
    #[serde(default = "default_smoothing_window_length")]
    pub smoothing_window_length: usize,

    /// Savitzky–Golay polynomial order P
    #[serde(default = "default_smoothing_polyorder")]
    pub smoothing_polyorder: usize,

    /// Hz; bins at or below are ignored
    #[serde(default = "default_noise_freq_cutoff")]
    pub noise_freq_cutoff: f64,

    /// K
    #[serde(default = "default_peak_count")]
    pub peak_count: usize,
}

fn default_smoothing_window_length() -> usize {
    defaults::SMOOTHING_WINDOW_LENGTH
}
fn default_smoothing_polyorder() -> usize {
    defaults::SMOOTHING_POLYORDER
}
fn default_noise_freq_cutoff() -> f64 {
    defaults::NOISE_FREQ_CUTOFF_HZ
}
fn default_peak_count() -> usize {
    defaults::PEAK_COUNT
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            smoothing_window_length: default_smoothing_window_length(),
            smoothing_polyorder: default_smoothing_polyorder(),
            noise_freq_cutoff: default_noise_freq_cutoff(),
            peak_count: default_peak_count(),
        }
    }
}

// ============================================================================
// Batch Analysis
// ============================================================================

/// When the batch analyzer resamples the session history onto a uniform grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMode {
    /// Resample only when arrival intervals are uneven
    #[default]
    Auto,
    Always,
    Never,
}

impl std::fmt::Display for ResampleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResampleMode::Auto => write!(f, "auto"),
            ResampleMode::Always => write!(f, "always"),
            ResampleMode::Never => write!(f, "never"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_resample_points")]
    pub resample_points: usize,

    #[serde(default)]
    pub resample_mode: ResampleMode,

    /// Relative std-dev of arrival intervals tolerated before `auto` resamples
    #[serde(default = "default_jitter_tolerance")]
    pub jitter_tolerance: f64,
}

fn default_resample_points() -> usize {
    defaults::RESAMPLE_POINTS
}
fn default_jitter_tolerance() -> f64 {
    defaults::JITTER_TOLERANCE
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            resample_points: default_resample_points(),
            resample_mode: ResampleMode::default(),
            jitter_tolerance: default_jitter_tolerance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(cfg.acquisition.spike_reject_threshold, 10.0);
        assert_eq!(cfg.live.window_size, 500);
        assert_eq!(cfg.live.fft_size, 2_000);
        assert_eq!(cfg.peaks.smoothing_window_length, 11);
        assert_eq!(cfg.peaks.smoothing_polyorder, 2);
        assert_eq!(cfg.peaks.peak_count, 3);
        assert_eq!(cfg.batch.resample_points, 500);
        assert_eq!(cfg.batch.resample_mode, ResampleMode::Auto);
        assert!(cfg.live.live_peak_threshold.is_none());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let cfg = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AnalyzerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let cfg = AnalyzerConfig::from_toml_str(
            r#"
[live]
sample_rate = 50.0
fft_size = 100
live_peak_threshold = 12.5

[batch]
resample_mode = "never"
"#,
        )
        .unwrap();
        assert_eq!(cfg.live.sample_rate, 50.0);
        assert_eq!(cfg.live.fft_size, 100);
        assert_eq!(cfg.live.window_size, 500);
        assert_eq!(cfg.live.live_peak_threshold, Some(12.5));
        assert_eq!(cfg.batch.resample_mode, ResampleMode::Never);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AnalyzerConfig::from_toml_str(
            r#"
[peaks]
smoothing_window_length = 10
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("smoothing_window_length"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let cfg = AnalyzerConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(AnalyzerConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AnalyzerConfig::load_from_file(Path::new("/nonexistent/spectrum.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
