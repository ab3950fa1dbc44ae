//! Serial port line channel

use super::{LineChannel, TransportError, TransportStats};
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Line terminator appended to every outgoing line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Line Feed only
    #[default]
    Lf,
    /// Carriage Return only
    Cr,
    /// Both CR and LF
    CrLf,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::Cr => b"\r",
            Self::CrLf => b"\r\n",
        }
    }
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Time to wait after opening before the first exchange; the board
    /// resets when the port opens
    pub settle_ms: u64,
    /// Outgoing line terminator
    pub line_ending: LineEnding,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout_ms: 50,
            settle_ms: 2000,
            line_ending: LineEnding::Lf,
        }
    }
}

impl SerialSettings {
    /// Per-read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Line channel backed by a serial port
pub struct SerialLineChannel {
    port_name: String,
    settings: SerialSettings,
    port: Box<dyn SerialPort>,
    /// Bytes read past the last newline, kept for the next call
    pending: Vec<u8>,
    stats: TransportStats,
}

impl SerialLineChannel {
    /// Open `port_name` and wait for the board to settle
    pub fn open(port_name: &str, settings: &SerialSettings) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, settings.baud_rate)
            .timeout(settings.read_timeout())
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(port_name.to_string()),
                serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    TransportError::PortNotFound(port_name.to_string())
                }
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    TransportError::PermissionDenied(port_name.to_string())
                }
                _ => TransportError::ConnectionFailed(format!("{}: {}", port_name, e)),
            })?;

        tracing::info!("Opened {} @ {} baud", port_name, settings.baud_rate);

        if settings.settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(settings.settle_ms));
        }

        Ok(Self {
            port_name: port_name.to_string(),
            settings: settings.clone(),
            port,
            pending: Vec::with_capacity(256),
            stats: TransportStats::default(),
        })
    }

    /// Get statistics
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }
}

impl LineChannel for SerialLineChannel {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.settings.line_ending.bytes());

        self.port.write_all(&data)?;
        self.port.flush()?;
        self.stats.lines_sent += 1;
        Ok(())
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.take_line() {
            self.stats.lines_received += 1;
            return Ok(Some(line));
        }

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.port
                .set_timeout(remaining)
                .map_err(|e| TransportError::IoError(e.into()))?;

            match self.port.read(&mut buf) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if let Some(line) = self.take_line() {
                        self.stats.lines_received += 1;
                        return Ok(Some(line));
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(TransportError::IoError(e)),
            }
        }

        self.stats.timeouts += 1;
        Ok(None)
    }

    fn connection_info(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.settings.baud_rate)
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}
