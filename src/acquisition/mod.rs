//! Sensor data acquisition module
//!
//! Turns a line-oriented text transport into discrete float samples.
//! Transports deliver one ASCII floating-point value per `\n`-terminated
//! line; everything else about the sensor's wire format is out of scope.
//!
//! ## Sources
//!
//! - [`SerialSource`]: serial port via the `serialport` crate
//! - [`ReaderSource`]: any `Read` (stdin, replay file) on a reader thread
//! - [`MemorySource`]: pre-loaded lines, for tests and replays

mod memory_source;
mod reader_source;
mod serial_source;

pub use memory_source::MemorySource;
pub use reader_source::ReaderSource;
pub use serial_source::SerialSource;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level failures.
///
/// `Unavailable` at startup is fatal. Mid-stream, any of these ends the
/// acquisition loop; reopening the transport is the caller's decision.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Transport unavailable ({name}): {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed")]
    Closed,
}

/// One complete line as delivered by the transport, without the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    bytes: Vec<u8>,
    truncated: bool,
}

impl RawLine {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            truncated: false,
        }
    }

    /// A line that exceeded the transport's length limit; always malformed.
    pub fn overlong(prefix: Vec<u8>) -> Self {
        Self {
            bytes: prefix,
            truncated: true,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode this line into a sample or a malformed-line outcome.
    pub fn parse(&self) -> LineEvent {
        if self.truncated {
            return LineEvent::Malformed(MalformedReason::TooLong);
        }
        parse_sample_line(&self.bytes)
    }
}

impl From<&str> for RawLine {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

/// Why a line could not be turned into a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    InvalidUtf8,
    Empty,
    NotANumber,
    NonFinite,
    TooLong,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::InvalidUtf8 => write!(f, "invalid UTF-8"),
            MalformedReason::Empty => write!(f, "empty line"),
            MalformedReason::NotANumber => write!(f, "not a number"),
            MalformedReason::NonFinite => write!(f, "non-finite value"),
            MalformedReason::TooLong => write!(f, "line too long"),
        }
    }
}

/// Outcome of decoding a [`RawLine`].
///
/// `Malformed` is never an error: the acquisition loop counts it and moves
/// on to the next line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineEvent {
    Sample(f64),
    Malformed(MalformedReason),
}

/// Where a session's sample timestamps come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Wall-clock arrival time; the transport is paced by the sensor
    #[default]
    Arrival,
    /// `sequence / sample_rate`; the transport delivers as fast as it is read
    Nominal,
}

/// Line-oriented sample transport.
///
/// Only the acquisition loop calls `next_line()`; the transport is
/// single-owner. Implementations must return `Ok(None)` promptly (within a
/// small bounded timeout) when no complete line is available.
pub trait SampleSource: Send + 'static {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError>;

    /// Human-readable name for logging (e.g. "serial:/dev/ttyACM0", "stdin").
    fn source_name(&self) -> &str;

    /// Whether arrival times reflect the sensor's sampling. Replays and
    /// buffered pipes arrive at read speed and report [`TimeBase::Nominal`].
    fn time_base(&self) -> TimeBase {
        TimeBase::Arrival
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        (**self).next_line()
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }

    fn time_base(&self) -> TimeBase {
        (**self).time_base()
    }
}

/// Decode one transport line: UTF-8, trim whitespace, parse a finite `f64`.
pub fn parse_sample_line(bytes: &[u8]) -> LineEvent {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => return LineEvent::Malformed(MalformedReason::InvalidUtf8),
    };

    let text = text.trim();
    if text.is_empty() {
        return LineEvent::Malformed(MalformedReason::Empty);
    }

    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => LineEvent::Sample(v),
        Ok(_) => LineEvent::Malformed(MalformedReason::NonFinite),
        Err(_) => LineEvent::Malformed(MalformedReason::NotANumber),
    }
}

/// Splits a byte stream into `\n`-terminated lines.
///
/// Shared by the transports that receive arbitrary chunks. A trailing `\r`
/// is left in place; `parse_sample_line` trims it. Lines longer than
/// `max_len` are emitted as [`RawLine::overlong`] so the loop counts them as
/// malformed instead of parsing a truncated number.
#[derive(Debug)]
pub(crate) struct LineAssembler {
    pending: Vec<u8>,
    overflowed: bool,
    max_len: usize,
}

impl LineAssembler {
    pub(crate) fn new(max_len: usize) -> Self {
        Self {
            pending: Vec::with_capacity(max_len.min(1024)),
            overflowed: false,
            max_len,
        }
    }

    /// Feed bytes and push every completed line onto `out`.
    pub(crate) fn push(&mut self, chunk: &[u8], out: &mut std::collections::VecDeque<RawLine>) {
        for &b in chunk {
            if b == b'\n' {
                let bytes = std::mem::take(&mut self.pending);
                if self.overflowed {
                    self.overflowed = false;
                    out.push_back(RawLine::overlong(bytes));
                } else {
                    out.push_back(RawLine::new(bytes));
                }
            } else if self.pending.len() < self.max_len {
                self.pending.push(b);
            } else {
                self.overflowed = true;
            }
        }
    }

    /// Flush a final unterminated line at end of input.
    pub(crate) fn finish(&mut self) -> Option<RawLine> {
        let overflowed = std::mem::replace(&mut self.overflowed, false);
        if self.pending.is_empty() && !overflowed {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        Some(if overflowed {
            RawLine::overlong(bytes)
        } else {
            RawLine::new(bytes)
        })
    }
}
