//! Reader-backed line source (stdin, replay files, pipes).
//!
//! Blocking readers cannot honour the bounded `next_line()` contract on
//! their own, so a dedicated reader thread does the blocking reads and hands
//! complete lines over a bounded channel. `next_line()` only ever waits on
//! that channel, for at most the configured timeout.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use super::{LineAssembler, RawLine, SampleSource, SourceError, TimeBase};
use crate::config::defaults::{MAX_LINE_BYTES, READER_CHANNEL_CAPACITY};

type LineResult = Result<RawLine, std::io::Error>;

/// Line source fed by a background reader thread.
///
/// End of input is reported as [`SourceError::Closed`] after every line read
/// before EOF has been delivered. A reader blocked on stdin cannot be
/// interrupted; it exits on its next read once the source is dropped.
///
/// Lines are timestamped by sequence (`TimeBase::Nominal`) unless the
/// producer is known to be paced, see [`with_time_base`](Self::with_time_base).
pub struct ReaderSource {
    name: String,
    rx: Receiver<LineResult>,
    timeout: Duration,
    time_base: TimeBase,
}

impl ReaderSource {
    /// Spawn a reader thread over `reader`.
    pub fn spawn<R>(name: impl Into<String>, reader: R, timeout: Duration) -> Result<Self, SourceError>
    where
        R: Read + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::sync_channel(READER_CHANNEL_CAPACITY);
        std::thread::Builder::new()
            .name(format!("reader-{name}"))
            .spawn(move || read_lines(reader, tx))
            .map_err(SourceError::Io)?;

        tracing::info!(source = %name, "Reader source started");
        Ok(Self {
            name,
            rx,
            timeout,
            time_base: TimeBase::Nominal,
        })
    }

    /// Use wall-clock arrival times, e.g. for stdin fed by a live producer.
    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    /// Read samples from the process's standard input.
    pub fn stdin(timeout: Duration) -> Result<Self, SourceError> {
        Self::spawn("stdin", std::io::stdin(), timeout)
    }

    /// Replay a text file of one value per line.
    pub fn open_file(path: &std::path::Path, timeout: Duration) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path).map_err(|e| SourceError::Unavailable {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::spawn(format!("file:{}", path.display()), file, timeout)
    }
}

/// Reader thread body: chunked reads, split into lines, forward until EOF,
/// an I/O error, or the receiving side goes away.
fn read_lines<R: Read>(mut reader: R, tx: SyncSender<LineResult>) {
    let mut assembler = LineAssembler::new(MAX_LINE_BYTES);
    let mut ready = VecDeque::new();
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                if let Some(last) = assembler.finish() {
                    ready.push_back(last);
                }
                for line in ready.drain(..) {
                    if tx.send(Ok(line)).is_err() {
                        return;
                    }
                }
                tracing::debug!("Reader reached end of input");
                return;
            }
            Ok(n) => {
                assembler.push(&buf[..n], &mut ready);
                for line in ready.drain(..) {
                    if tx.send(Ok(line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

impl SampleSource for ReaderSource {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(SourceError::Io(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Closed),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }
}
