//! Analyzer Configuration Module
//!
//! Provides operator-tunable acquisition and analysis settings loaded from
//! TOML files.
//!
//! ## Loading Order
//!
//! 1. Explicit path (the `--config` CLI flag)
//! 2. `SPECTRUM_CONFIG` environment variable (path to TOML file)
//! 3. `spectrum.toml` in the current working directory
//! 4. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! The binary calls `config::init()` once at startup, then `config::get()`
//! anywhere. Library types never read the global; they take the relevant
//! section by value.
//!
//! ```ignore
//! config::init(AnalyzerConfig::load(None));
//! let cadence = config::get().live.recompute_cadence;
//! ```

mod analyzer_config;
pub mod defaults;
pub mod validation;

pub use analyzer_config::*;

use std::sync::OnceLock;

/// Global analyzer configuration, initialized once at startup.
static ANALYZER_CONFIG: OnceLock<AnalyzerConfig> = OnceLock::new();

/// Initialize the global analyzer configuration.
///
/// Second and later calls are ignored with a warning.
pub fn init(config: AnalyzerConfig) {
    if ANALYZER_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global analyzer configuration.
///
/// Panics if `init()` has not been called. A missing config is a fatal
/// startup error, not a recoverable condition.
#[allow(clippy::expect_used)]
pub fn get() -> &'static AnalyzerConfig {
    ANALYZER_CONFIG
        .get()
        .expect("config::get() called before config::init(); this is a startup bug")
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    ANALYZER_CONFIG.get().is_some()
}
