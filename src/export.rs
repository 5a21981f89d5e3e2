//! Two-column sample export.
//!
//! ```text
//! Timestamp, Amplitude
//! 0,20.1
//! 0.03333333333333333,20.3
//! ```
//!
//! Floats use Rust's shortest round-trip formatting, so a re-read file
//! reproduces the exact values.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: &str = "Timestamp, Amplitude";

/// Write `values` with `timestamp = index / sample_rate`.
///
/// Timestamps follow sample order, not wall-clock arrival.
pub fn write_samples_csv<W: Write>(writer: W, values: &[f64], sample_rate: f64) -> io::Result<()> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid sample rate {sample_rate}"),
        ));
    }
    let mut out = BufWriter::new(writer);
    writeln!(out, "{CSV_HEADER}")?;
    for (i, v) in values.iter().enumerate() {
        writeln!(out, "{},{}", i as f64 / sample_rate, v)?;
    }
    out.flush()
}

/// Write `(times[i], values[i])` pairs, e.g. a resampled batch series.
pub fn write_series_csv<W: Write>(writer: W, times: &[f64], values: &[f64]) -> io::Result<()> {
    if times.len() != values.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "time and value columns differ in length ({} vs {})",
                times.len(),
                values.len()
            ),
        ));
    }
    let mut out = BufWriter::new(writer);
    writeln!(out, "{CSV_HEADER}")?;
    for (t, v) in times.iter().zip(values) {
        writeln!(out, "{t},{v}")?;
    }
    out.flush()
}

/// Create (or truncate) `path` and write `values` to it.
pub fn export_samples(path: &Path, values: &[f64], sample_rate: f64) -> io::Result<()> {
    let file = File::create(path)?;
    write_samples_csv(file, values, sample_rate)?;
    tracing::info!(path = %path.display(), rows = values.len(), "Exported samples");
    Ok(())
}
