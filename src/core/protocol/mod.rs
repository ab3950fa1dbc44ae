//! Device wire protocol
//!
//! Provides:
//! - The closed set of host commands and their argument validation
//! - The send-until-echo handshake used for every command
//! - The literal tokens and framing markers the device emits

pub mod command;
pub mod handshake;

pub use command::{ms_to_increment, truncate_ms, AccelRange, Command, Verb};
pub use handshake::{exchange, ExchangeReport};

use crate::core::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Acknowledgement token the device answers `ping` with
pub const ACK: &str = "ack";

/// Framing markers emitted by the device during one tap cycle, in order
pub mod markers {
    /// Cue delivered, device is sampling
    pub const WAITING_FOR_TAP: &str = "waiting for tap";
    /// End of the accelerometer samples
    pub const SAMPLING_FINISHED: &str = "sampling finished";
    /// Next non-empty line is the cycle start time
    pub const START_TIME: &str = "start time";
    /// Tap events follow
    pub const TAP_TIMES: &str = "tap times";
    /// End of the cycle
    pub const END_OF_DATA: &str = "end of data";

    /// All markers in required order
    pub const ALL: [&str; 5] = [
        WAITING_FOR_TAP,
        SAMPLING_FINISHED,
        START_TIME,
        TAP_TIMES,
        END_OF_DATA,
    ];
}

/// Protocol error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The link failed underneath the exchange
    #[error(transparent)]
    Link(#[from] TransportError),

    /// The device never produced what was awaited within the retry budget
    #[error("Timed out waiting for {stage:?} after {attempts} attempts ({elapsed:?})")]
    Timeout {
        /// Token, value or marker that was awaited
        stage: String,
        /// Attempts made before giving up
        attempts: u32,
        /// Time spent
        elapsed: Duration,
    },
}

impl ProtocolError {
    /// Is this a retry-budget exhaustion rather than a link failure?
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
