//! Serial port line source.
//!
//! Opens the sensor's serial port with a short read timeout so a quiet line
//! never blocks the acquisition loop for longer than that timeout.

use std::collections::VecDeque;
use std::io::Read;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::{LineAssembler, RawLine, SampleSource, SourceError};
use crate::config::defaults::MAX_LINE_BYTES;

/// Sensor attached over a serial port (USB CDC, UART bridge).
pub struct SerialSource {
    name: String,
    port: Box<dyn SerialPort>,
    assembler: LineAssembler,
    ready: VecDeque<RawLine>,
    buf: Vec<u8>,
    bytes_read: u64,
}

impl SerialSource {
    /// Open `port` at `baud_rate`, discarding anything already buffered.
    pub fn open(port: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, SourceError> {
        tracing::info!(port = %port, baud_rate, "Opening serial port");

        let handle = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| SourceError::Unavailable {
                name: port.to_string(),
                reason: e.to_string(),
            })?;

        // Stale bytes from before we attached are usually a partial line.
        if let Err(e) = handle.clear(ClearBuffer::Input) {
            tracing::warn!(port = %port, error = %e, "Failed to flush serial input buffer");
        }

        tracing::info!(port = %port, "Serial port open, waiting for samples");
        Ok(Self {
            name: format!("serial:{port}"),
            port: handle,
            assembler: LineAssembler::new(MAX_LINE_BYTES),
            ready: VecDeque::new(),
            buf: vec![0u8; 1024],
            bytes_read: 0,
        })
    }

    /// List serial ports visible to the OS (for `--list-ports`).
    pub fn available_ports() -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate serial ports");
                Vec::new()
            }
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl SampleSource for SerialSource {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        if let Some(line) = self.ready.pop_front() {
            return Ok(Some(line));
        }

        match self.port.read(&mut self.buf) {
            Ok(0) => {}
            Ok(n) => {
                self.bytes_read += n as u64;
                self.assembler.push(&self.buf[..n], &mut self.ready);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(SourceError::Io(e)),
        }

        Ok(self.ready.pop_front())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
