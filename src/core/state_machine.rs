//! Retry budgets and the tap-cycle phase machine
//!
//! Every wait on the device is bounded: echo loops by a [`RetryPolicy`] and
//! marker waits by the same policy counted over reads that make no
//! progress (silence or discarded chatter). The phases of one
//! tap cycle are an explicit [`CyclePhase`] machine driven by marker lines.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Bound on how long one protocol step may keep retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts before giving up
    pub max_attempts: u32,
    /// Wall-clock limit for the whole step, in milliseconds (0 = none)
    pub deadline_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::command()
    }
}

impl RetryPolicy {
    /// Default bound for a verb or value echo loop
    pub fn command() -> Self {
        Self {
            max_attempts: 100,
            deadline_ms: 10_000,
        }
    }

    /// Default bound for marker waits during a tap cycle; attempts count
    /// consecutive reads that made no progress
    pub fn cycle() -> Self {
        Self {
            max_attempts: 1200,
            deadline_ms: 60_000,
        }
    }

    /// Policy with only an attempt bound
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            deadline_ms: 0,
        }
    }

    /// Wall-clock deadline, if any
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }

    /// Start tracking one step against this policy
    pub fn budget(&self) -> Budget {
        Budget {
            policy: *self,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// Attempt counter for one step, checked against its [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct Budget {
    policy: RetryPolicy,
    started: Instant,
    attempts: u32,
}

impl Budget {
    /// Record one attempt. Returns `false` once the policy is exhausted.
    pub fn try_attempt(&mut self) -> bool {
        if self.attempts >= self.policy.max_attempts {
            return false;
        }
        if let Some(deadline) = self.policy.deadline() {
            if self.started.elapsed() >= deadline {
                return false;
            }
        }
        self.attempts += 1;
        true
    }

    /// Forget attempts made so far, keeping the deadline running
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time since the step started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Phase of one tap cycle, after the finger has been confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePhase {
    /// Discarding lines until `waiting for tap`
    AwaitWaiting,
    /// Collecting sample lines until `sampling finished`
    Sampling,
    /// Discarding lines until `start time`
    AwaitStartTime,
    /// Expecting the single start-time line
    ReadStartTime,
    /// Discarding lines until `tap times`
    AwaitTapTimes,
    /// Collecting tap-event lines until `end of data`
    CollectingTaps,
    /// All markers seen
    Done,
}

/// What the cycle reader should do with a line in the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDisposition {
    /// Marker seen; phase advanced
    Advance,
    /// Keep as an accelerometer sample
    Sample,
    /// Keep as the start time
    StartTime,
    /// Keep as a tap event
    TapEvent,
    /// Ignore
    Discard,
}

impl CyclePhase {
    /// Marker that ends this phase, if it is ended by a marker
    pub fn terminating_marker(&self) -> Option<&'static str> {
        use crate::core::protocol::markers;
        match self {
            Self::AwaitWaiting => Some(markers::WAITING_FOR_TAP),
            Self::Sampling => Some(markers::SAMPLING_FINISHED),
            Self::AwaitStartTime => Some(markers::START_TIME),
            Self::AwaitTapTimes => Some(markers::TAP_TIMES),
            Self::CollectingTaps => Some(markers::END_OF_DATA),
            Self::ReadStartTime | Self::Done => None,
        }
    }

    /// Phase that follows this one
    pub fn next(&self) -> Self {
        match self {
            Self::AwaitWaiting => Self::Sampling,
            Self::Sampling => Self::AwaitStartTime,
            Self::AwaitStartTime => Self::ReadStartTime,
            Self::ReadStartTime => Self::AwaitTapTimes,
            Self::AwaitTapTimes => Self::CollectingTaps,
            Self::CollectingTaps | Self::Done => Self::Done,
        }
    }

    /// Classify a received, trimmed line
    pub fn classify(&self, line: &str) -> LineDisposition {
        if line.is_empty() {
            return LineDisposition::Discard;
        }
        if self.terminating_marker() == Some(line) {
            return LineDisposition::Advance;
        }
        match self {
            Self::Sampling => LineDisposition::Sample,
            Self::ReadStartTime => LineDisposition::StartTime,
            Self::CollectingTaps => LineDisposition::TapEvent,
            _ => LineDisposition::Discard,
        }
    }

    /// Name used in timeout errors
    pub fn awaiting(&self) -> &'static str {
        match self {
            Self::ReadStartTime => "start time value",
            Self::Done => "nothing",
            _ => self.terminating_marker().unwrap_or("marker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_counts_attempts() {
        let mut budget = RetryPolicy::attempts(3).budget();
        assert!(budget.try_attempt());
        assert!(budget.try_attempt());
        assert!(budget.try_attempt());
        assert!(!budget.try_attempt());
        assert_eq!(budget.attempts(), 3);
    }

    #[test]
    fn test_budget_reset_keeps_deadline() {
        let mut budget = RetryPolicy::attempts(1).budget();
        assert!(budget.try_attempt());
        assert!(!budget.try_attempt());
        budget.reset_attempts();
        assert!(budget.try_attempt());
    }

    #[test]
    fn test_expired_deadline_stops_attempts() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            deadline_ms: 1,
        };
        let mut budget = policy.budget();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!budget.try_attempt());
    }

    #[test]
    fn test_zero_deadline_means_none() {
        assert_eq!(RetryPolicy::attempts(5).deadline(), None);
        assert_eq!(
            RetryPolicy::command().deadline(),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_phase_walk() {
        let lines = [
            ("noise", LineDisposition::Discard),
            ("waiting for tap", LineDisposition::Advance),
            ("1,2,3,4", LineDisposition::Sample),
            ("sampling finished", LineDisposition::Advance),
            ("start time", LineDisposition::Advance),
            ("1234", LineDisposition::StartTime),
            ("tap times", LineDisposition::Advance),
            ("index,1300", LineDisposition::TapEvent),
            ("end of data", LineDisposition::Advance),
        ];

        let mut phase = CyclePhase::AwaitWaiting;
        for (line, expected) in lines {
            let disposition = phase.classify(line);
            assert_eq!(disposition, expected, "line {:?} in {:?}", line, phase);
            if matches!(disposition, LineDisposition::Advance | LineDisposition::StartTime) {
                phase = phase.next();
            }
        }
        assert_eq!(phase, CyclePhase::Done);
    }

    #[test]
    fn test_markers_out_of_order_are_discarded() {
        assert_eq!(
            CyclePhase::AwaitWaiting.classify("tap times"),
            LineDisposition::Discard
        );
        assert_eq!(CyclePhase::Sampling.classify(""), LineDisposition::Discard);
    }
}
