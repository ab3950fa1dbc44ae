//! Tap data processing
//!
//! Turns the raw text of one cycle into time series relative to the cycle
//! start. Pure: no I/O, no clock reads. Any malformed line fails the whole
//! cycle.

use crate::core::finger::Finger;
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Number of leading taps reported per cycle
pub const FIRST_TAPS: usize = 3;

/// Malformed frame in one cycle's payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Sample line is not four comma-separated integers
    #[error("malformed sample line {index} {line:?}: {reason}")]
    Sample {
        /// Position among the cycle's sample lines
        index: usize,
        /// Offending line
        line: String,
        /// What was wrong with it
        reason: String,
    },

    /// Tap-event line is not `finger,timestamp`
    #[error("malformed tap line {index} {line:?}: {reason}")]
    TapEvent {
        /// Position among the cycle's tap lines
        index: usize,
        /// Offending line
        line: String,
        /// What was wrong with it
        reason: String,
    },

    /// Start-time line is not an integer
    #[error("malformed start time {line:?}")]
    StartTime {
        /// Offending line
        line: String,
    },
}

/// Unparsed text collected during one tap cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RawTapPayload {
    /// Finger that was cued
    pub cued: Finger,
    /// Cycle start on the device clock, ms
    pub start_time_ms: i64,
    /// Accelerometer sample lines in arrival order
    pub sample_lines: Vec<String>,
    /// Tap-event lines in arrival order
    pub tap_lines: Vec<String>,
    /// Host time at which the cycle finished
    pub completed_at: DateTime<Local>,
}

impl RawTapPayload {
    /// Payload completed now
    pub fn new<S: Into<String>>(
        cued: Finger,
        start_time_ms: i64,
        sample_lines: impl IntoIterator<Item = S>,
        tap_lines: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            cued,
            start_time_ms,
            sample_lines: sample_lines.into_iter().map(Into::into).collect(),
            tap_lines: tap_lines.into_iter().map(Into::into).collect(),
            completed_at: Local::now(),
        }
    }
}

/// One accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccelSample {
    /// Seconds since cycle start, 3 decimals
    pub time: f64,
    /// X axis
    pub x: i64,
    /// Y axis
    pub y: i64,
    /// Z axis
    pub z: i64,
}

/// One detected tap
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FingerTap {
    /// Finger that tapped
    pub finger: Finger,
    /// Seconds since cycle start, 3 decimals
    pub time: f64,
}

/// Entry of the first-taps list; `NoData` pads cycles with fewer taps
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapSlot {
    /// A detected tap
    Tap(FingerTap),
    /// No tap detected
    NoData,
}

impl TapSlot {
    /// Sentinel text for an empty slot
    pub const NA: &'static str = "NA";

    /// Tap time, if any
    pub fn time(&self) -> Option<f64> {
        match self {
            Self::Tap(tap) => Some(tap.time),
            Self::NoData => None,
        }
    }

    /// Tapped finger, if any
    pub fn finger(&self) -> Option<Finger> {
        match self {
            Self::Tap(tap) => Some(tap.finger),
            Self::NoData => None,
        }
    }

    /// Time formatted for reports, `NA` when empty
    pub fn time_label(&self) -> String {
        self.time()
            .map_or_else(|| Self::NA.to_string(), |t| t.to_string())
    }

    /// Finger formatted for reports, `NA` when empty
    pub fn finger_label(&self) -> &'static str {
        self.finger().map_or(Self::NA, Finger::name)
    }
}

impl fmt::Display for TapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tap(tap) => write!(f, "{} @ {}s", tap.finger, tap.time),
            Self::NoData => f.write_str(Self::NA),
        }
    }
}

impl Serialize for TapSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Tap(tap) => tap.serialize(serializer),
            Self::NoData => serializer.serialize_none(),
        }
    }
}

/// Time-normalized outcome of one tap cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TapResult {
    /// Finger that was cued
    pub cued: Finger,
    /// Host time the cycle finished
    pub completed_at: DateTime<Local>,
    /// Accelerometer series
    pub samples: Vec<AccelSample>,
    /// Tap times per finger in canonical order, arrival order within a finger
    pub taps: [Vec<f64>; 5],
    /// Every tap, sorted by time then canonical finger order
    pub ordered: Vec<FingerTap>,
    /// First three entries of `ordered`, padded with `NoData`
    pub first_taps: [TapSlot; FIRST_TAPS],
}

impl TapResult {
    /// Tap times recorded for one finger
    pub fn taps_for(&self, finger: Finger) -> &[f64] {
        &self.taps[finger.rank()]
    }

    /// First tap of the cycle
    pub fn first_tap(&self) -> TapSlot {
        self.first_taps[0]
    }

    /// Did the first tap come from the cued finger?
    pub fn is_correct(&self) -> bool {
        self.first_tap().finger() == Some(self.cued)
    }

    /// Seconds from cycle start to the first tap
    pub fn reaction_time(&self) -> Option<f64> {
        self.first_tap().time()
    }
}

/// Convert a device timestamp to seconds since `start_ms`, rounded to 3 places
pub fn relative_seconds(t_ms: f64, start_ms: i64) -> f64 {
    let seconds = t_ms / 1000.0 - start_ms as f64 / 1000.0;
    (seconds * 1000.0).round() / 1000.0
}

fn parse_sample(index: usize, line: &str, start_ms: i64) -> Result<AccelSample, FrameError> {
    let malformed = |reason: String| FrameError::Sample {
        index,
        line: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(malformed(format!("expected 4 fields, found {}", fields.len())));
    }

    let mut values = [0i64; 4];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .parse()
            .map_err(|_| malformed(format!("{:?} is not an integer", field)))?;
    }

    Ok(AccelSample {
        time: relative_seconds(values[0] as f64, start_ms),
        x: values[1],
        y: values[2],
        z: values[3],
    })
}

fn parse_tap(index: usize, line: &str, start_ms: i64) -> Result<FingerTap, FrameError> {
    let malformed = |reason: String| FrameError::TapEvent {
        index,
        line: line.to_string(),
        reason,
    };

    let (name, stamp) = line
        .split_once(',')
        .ok_or_else(|| malformed("expected finger,timestamp".to_string()))?;
    let finger: Finger = name.trim().parse().map_err(|e| malformed(format!("{}", e)))?;
    let stamp: f64 = stamp
        .trim()
        .parse()
        .map_err(|_| malformed(format!("{:?} is not a timestamp", stamp.trim())))?;
    if !stamp.is_finite() {
        return Err(malformed(format!("{:?} is not a timestamp", stamp)));
    }

    Ok(FingerTap {
        finger,
        time: relative_seconds(stamp, start_ms),
    })
}

/// Parse a start-time line
pub fn parse_start_time(line: &str) -> Result<i64, FrameError> {
    line.trim().parse().map_err(|_| FrameError::StartTime {
        line: line.to_string(),
    })
}

/// Process one cycle's payload into a [`TapResult`]
pub fn process(payload: &RawTapPayload) -> Result<TapResult, FrameError> {
    let start = payload.start_time_ms;

    let samples = payload
        .sample_lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_sample(i, line, start))
        .collect::<Result<Vec<_>, _>>()?;

    let events = payload
        .tap_lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_tap(i, line, start))
        .collect::<Result<Vec<_>, _>>()?;

    let mut taps: [Vec<f64>; 5] = Default::default();
    for event in &events {
        taps[event.finger.rank()].push(event.time);
    }

    // Stable: equal (time, finger) keeps arrival order.
    let mut ordered = events;
    ordered.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then_with(|| a.finger.rank().cmp(&b.finger.rank()))
    });

    let mut first_taps = [TapSlot::NoData; FIRST_TAPS];
    for (slot, tap) in first_taps.iter_mut().zip(&ordered) {
        *slot = TapSlot::Tap(*tap);
    }

    Ok(TapResult {
        cued: payload.cued,
        completed_at: payload.completed_at,
        samples,
        taps,
        ordered,
        first_taps,
    })
}
