//! Send-until-echo handshake
//!
//! The device confirms a command only by echoing the exact token it received.
//! Anything else it says in the meantime is diagnostic noise. Each phase
//! resends on every read that did not confirm, bounded by a [`RetryPolicy`].

use super::{Command, ProtocolError};
use crate::core::state_machine::RetryPolicy;
use crate::core::transport::LineChannel;
use std::time::Duration;

/// Outcome of one successful command exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExchangeReport {
    /// Times the verb was sent
    pub verb_attempts: u32,
    /// Times the value was sent (0 for commands without an argument)
    pub value_attempts: u32,
    /// Lines received that did not confirm anything
    pub discarded: u32,
}

impl ExchangeReport {
    /// Sends beyond the first in each phase
    pub fn retries(&self) -> u32 {
        self.verb_attempts.saturating_sub(1) + self.value_attempts.saturating_sub(1)
    }

    /// Confirmed round trips, one per phase
    pub fn exchanges(&self) -> u32 {
        u32::from(self.verb_attempts > 0) + u32::from(self.value_attempts > 0)
    }
}

/// Run one command through the verb phase and, if it carries an argument,
/// the value phase. Each phase gets a fresh budget from `policy`.
pub fn exchange<C: LineChannel + ?Sized>(
    channel: &mut C,
    command: &Command,
    policy: &RetryPolicy,
    read_timeout: Duration,
) -> Result<ExchangeReport, ProtocolError> {
    let mut report = ExchangeReport::default();
    let verb = command.verb();
    let confirmation = verb.confirmation();

    // Verb phase
    let mut budget = policy.budget();
    loop {
        if !budget.try_attempt() {
            return Err(ProtocolError::Timeout {
                stage: confirmation.to_string(),
                attempts: budget.attempts(),
                elapsed: budget.elapsed(),
            });
        }
        channel.send_line(verb.as_str())?;
        report.verb_attempts += 1;

        match channel.receive_line(read_timeout)? {
            Some(line) if line == confirmation => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                break;
            }
            Some(line) if !line.is_empty() => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                report.discarded += 1;
            }
            _ => {}
        }
    }

    let Some(value) = command.value() else {
        return Ok(report);
    };

    // Value phase
    let token = value.to_string();
    let mut budget = policy.budget();
    loop {
        if !budget.try_attempt() {
            return Err(ProtocolError::Timeout {
                stage: format!("{} {}", verb, token),
                attempts: budget.attempts(),
                elapsed: budget.elapsed(),
            });
        }
        channel.send_line(&token)?;
        report.value_attempts += 1;

        match channel.receive_line(read_timeout)? {
            Some(line) if line.parse::<i64>().ok() == Some(value) => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                break;
            }
            Some(line) if !line.is_empty() => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                report.discarded += 1;
            }
            _ => {}
        }
    }

    tracing::debug!(
        "{} confirmed ({} retries, {} discarded)",
        command,
        report.retries(),
        report.discarded
    );
    Ok(report)
}
