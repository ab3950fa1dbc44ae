//! One cue-and-measure cycle against the device

use super::processor::{parse_start_time, RawTapPayload};
use crate::core::device::DeviceError;
use crate::core::finger::Finger;
use crate::core::protocol::{exchange, Command, ProtocolError};
use crate::core::state_machine::{CyclePhase, LineDisposition, RetryPolicy};
use crate::core::transport::LineChannel;
use chrono::Local;
use std::time::Duration;

/// Bounds for one cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleLimits {
    /// Budget for the `tap` verb and finger echoes
    pub command: RetryPolicy,
    /// Budget for every marker wait; attempts are consecutive reads that make no progress
    pub markers: RetryPolicy,
    /// Per-read timeout
    pub read_timeout: Duration,
}

impl Default for CycleLimits {
    fn default() -> Self {
        Self {
            command: RetryPolicy::command(),
            markers: RetryPolicy::cycle(),
            read_timeout: Duration::from_millis(50),
        }
    }
}

/// Cue `finger` and collect the framed payload the device reports
pub fn run_cycle<C: LineChannel + ?Sized>(
    channel: &mut C,
    finger: Finger,
    limits: &CycleLimits,
) -> Result<RawTapPayload, DeviceError> {
    exchange(channel, &Command::Tap(finger), &limits.command, limits.read_timeout)?;
    tracing::debug!("Tap cued on {}", finger);

    let mut phase = CyclePhase::AwaitWaiting;
    let mut samples = Vec::new();
    let mut taps = Vec::new();
    let mut start_time = None;

    let mut budget = limits.markers.budget();
    while phase != CyclePhase::Done {
        if !budget.try_attempt() {
            return Err(ProtocolError::Timeout {
                stage: phase.awaiting().to_string(),
                attempts: budget.attempts(),
                elapsed: budget.elapsed(),
            }
            .into());
        }

        let Some(line) = channel.receive_line(limits.read_timeout)? else {
            continue;
        };
        if line.is_empty() {
            continue;
        }

        // Discarded chatter spends the budget like silence does.
        match phase.classify(&line) {
            LineDisposition::Advance => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                phase = phase.next();
            }
            LineDisposition::Sample => samples.push(line),
            LineDisposition::TapEvent => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                taps.push(line);
            }
            LineDisposition::StartTime => {
                start_time = Some(parse_start_time(&line)?);
                phase = phase.next();
            }
            LineDisposition::Discard => {
                tracing::debug!(target: "tapcue::device", "device: {}", line);
                continue;
            }
        }
        budget.reset_attempts();
    }

    let start_time_ms = start_time.ok_or_else(|| ProtocolError::Timeout {
        stage: CyclePhase::ReadStartTime.awaiting().to_string(),
        attempts: budget.attempts(),
        elapsed: budget.elapsed(),
    })?;

    tracing::debug!(
        "Cycle for {} complete: {} samples, {} taps",
        finger,
        samples.len(),
        taps.len()
    );

    Ok(RawTapPayload {
        cued: finger,
        start_time_ms,
        sample_lines: samples,
        tap_lines: taps,
        completed_at: Local::now(),
    })
}
