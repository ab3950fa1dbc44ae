//! Line-oriented transport to the tap device
//!
//! The device speaks ASCII, one token per line. A [`LineChannel`] is the only
//! thing the protocol layers need: send one line, or wait a bounded time for
//! the next one.

mod serial;

pub use serial::{list_ports, LineEnding, SerialLineChannel, SerialSettings};

use std::time::Duration;
use thiserror::Error;

/// Transport error types
///
/// All of these are link errors: fatal for the session that owns the channel.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The other end went away
    #[error("Disconnected")]
    Disconnected,
}

/// Transport statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Lines written
    pub lines_sent: u64,
    /// Non-timeout reads that produced a line
    pub lines_received: u64,
    /// Reads that returned nothing before the timeout
    pub timeouts: u64,
}

/// Exclusive, unbuffered, line-at-a-time duplex pipe to one device
#[cfg_attr(test, mockall::automock)]
pub trait LineChannel: Send {
    /// Write one line; the implementation appends the line terminator
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Next line with surrounding whitespace trimmed, or `None` if nothing
    /// arrived within `timeout`
    fn receive_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError>;

    /// Human-readable description of the connection
    fn connection_info(&self) -> String;
}

impl<T: LineChannel + ?Sized> LineChannel for Box<T> {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        (**self).send_line(line)
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        (**self).receive_line(timeout)
    }

    fn connection_info(&self) -> String {
        (**self).connection_info()
    }
}
