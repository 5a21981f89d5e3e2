//! Pre-loaded line source (replays and tests).

use std::collections::VecDeque;

use super::{RawLine, SampleSource, SourceError, TimeBase};

/// Replays pre-loaded lines, one per `next_line()` call.
///
/// By default the source reports [`SourceError::Closed`] once drained, which
/// ends the acquisition loop the same way an unplugged sensor would. Use
/// [`keep_open`](MemorySource::keep_open) to model an idle-but-alive
/// transport instead.
///
/// Lines arrive at read speed, so samples are timestamped by sequence.
#[derive(Debug)]
pub struct MemorySource {
    lines: VecDeque<RawLine>,
    keep_open: bool,
    time_base: TimeBase,
}

impl MemorySource {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<RawLine>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            keep_open: false,
            time_base: TimeBase::Nominal,
        }
    }

    /// Build from numeric values, formatted the way a sensor would print them.
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            lines: values
                .iter()
                .map(|v| RawLine::new(format!("{v}\r").into_bytes()))
                .collect(),
            keep_open: false,
            time_base: TimeBase::Nominal,
        }
    }

    /// Report `Ok(None)` forever once drained instead of closing.
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl From<String> for RawLine {
    fn from(s: String) -> Self {
        RawLine::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for RawLine {
    fn from(bytes: Vec<u8>) -> Self {
        RawLine::new(bytes)
    }
}

impl SampleSource for MemorySource {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.keep_open => Ok(None),
            None => Err(SourceError::Closed),
        }
    }

    fn source_name(&self) -> &str {
        "memory"
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }
}
