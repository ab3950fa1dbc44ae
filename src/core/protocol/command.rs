//! Host commands and argument validation

use crate::core::finger::Finger;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command verbs, exactly as written on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Liveness check
    Ping,
    /// Calibrate the accelerometer of one finger
    Setup,
    /// Cue a tap on one finger and report the cycle
    Tap,
    /// Sampling window length
    SamplingTime,
    /// Tap debounce time
    TapDebounce,
    /// Vibration motor on-time
    MotorDuration,
    /// Vibration motor PWM intensity
    Intensity,
    /// Accelerometer full-scale range
    Range,
    /// Tap detection threshold
    Threshold,
    /// Maximum tap duration
    ThreshDuration,
}

impl Verb {
    /// All verbs
    pub const ALL: [Verb; 10] = [
        Verb::Ping,
        Verb::Setup,
        Verb::Tap,
        Verb::SamplingTime,
        Verb::TapDebounce,
        Verb::MotorDuration,
        Verb::Intensity,
        Verb::Range,
        Verb::Threshold,
        Verb::ThreshDuration,
    ];

    /// Parse a wire token
    pub fn from_wire(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == token)
    }

    /// Wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Setup => "setup",
            Self::Tap => "tap",
            Self::SamplingTime => "samplingTime",
            Self::TapDebounce => "tapDebounce",
            Self::MotorDuration => "motorduration",
            Self::Intensity => "intensity",
            Self::Range => "range",
            Self::Threshold => "threshold",
            Self::ThreshDuration => "threshduration",
        }
    }

    /// Token that confirms this verb
    pub fn confirmation(&self) -> &'static str {
        match self {
            Self::Ping => super::ACK,
            _ => self.as_str(),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accelerometer full-scale range in G
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccelRange {
    /// ±2 G
    G2,
    /// ±4 G
    G4,
    /// ±8 G
    G8,
    /// ±16 G
    #[default]
    G16,
}

impl AccelRange {
    /// Range in G
    pub fn g(self) -> u8 {
        match self {
            Self::G2 => 2,
            Self::G4 => 4,
            Self::G8 => 8,
            Self::G16 => 16,
        }
    }

    /// Map a requested range onto a supported one; anything else falls back
    /// to 16 G with a warning
    pub fn from_g_or_default(g: i64) -> Self {
        match g {
            2 => Self::G2,
            4 => Self::G4,
            8 => Self::G8,
            16 => Self::G16,
            other => {
                tracing::warn!(
                    "{} not a valid accelerometer range. Set to default ({}G)",
                    other,
                    Self::default().g()
                );
                Self::default()
            }
        }
    }
}

impl TryFrom<u8> for AccelRange {
    type Error = String;

    fn try_from(g: u8) -> Result<Self, Self::Error> {
        match g {
            2 => Ok(Self::G2),
            4 => Ok(Self::G4),
            8 => Ok(Self::G8),
            16 => Ok(Self::G16),
            other => Err(format!("unsupported accelerometer range {}G (2, 4, 8 or 16)", other)),
        }
    }
}

impl From<AccelRange> for u8 {
    fn from(range: AccelRange) -> Self {
        range.g()
    }
}

/// Threshold hardware resolution in milliseconds per increment
pub const THRESHOLD_MS_PER_INCREMENT: f64 = 0.625;

/// Largest threshold the hardware accepts, in milliseconds
pub const THRESHOLD_MAX_MS: f64 = 255.0 * THRESHOLD_MS_PER_INCREMENT;

/// Convert a threshold in milliseconds to the hardware increment,
/// clamping out-of-range input with a warning
pub fn ms_to_increment(ms: f64) -> u8 {
    if ms > THRESHOLD_MAX_MS {
        tracing::warn!("max is {} ms", THRESHOLD_MAX_MS);
        255
    } else if ms < 0.0 || ms.is_nan() {
        tracing::warn!("min is 0 ms but you should probably use a higher number");
        0
    } else {
        (ms / THRESHOLD_MS_PER_INCREMENT).round() as u8
    }
}

/// Truncate a duration in milliseconds to the whole milliseconds the
/// firmware takes. Negative input becomes 0 with a warning.
pub fn truncate_ms(ms: f64) -> u32 {
    if ms < 0.0 || ms.is_nan() {
        tracing::warn!("duration {} ms is not valid, using 0", ms);
        0
    } else {
        // Saturates above u32::MAX.
        ms.trunc() as u32
    }
}

/// One host command and its validated argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Liveness check, confirmed by [`super::ACK`]
    Ping,
    /// Calibrate a finger
    Setup(Finger),
    /// Cue a tap on a finger
    Tap(Finger),
    /// Sampling time in ms
    SamplingTime(u32),
    /// Debounce time in ms
    TapDebounce(u32),
    /// Motor on-time in ms
    MotorDuration(u32),
    /// Motor intensity, 0 disables the motor
    MotorIntensity(u8),
    /// Accelerometer range
    AccelRange(AccelRange),
    /// Tap threshold as a hardware increment
    TapThreshold(u8),
    /// Maximum tap duration in ms
    ThresholdDuration(u32),
}

impl Command {
    /// Motor intensity from a raw request, clamped to 0..=255
    pub fn motor_intensity(requested: i64) -> Self {
        let intensity = if requested > 255 {
            tracing::warn!("max intensity is {}", 255);
            255
        } else if requested <= 0 {
            tracing::warn!("setting motor to 0 means it will not activate");
            0
        } else {
            requested as u8
        };
        Self::MotorIntensity(intensity)
    }

    /// Accelerometer range from a raw request, defaulting to 16 G
    pub fn accel_range(g: i64) -> Self {
        Self::AccelRange(AccelRange::from_g_or_default(g))
    }

    /// Tap threshold given in milliseconds
    pub fn tap_threshold_ms(ms: f64) -> Self {
        Self::TapThreshold(ms_to_increment(ms))
    }

    /// Verb sent first
    pub fn verb(&self) -> Verb {
        match self {
            Self::Ping => Verb::Ping,
            Self::Setup(_) => Verb::Setup,
            Self::Tap(_) => Verb::Tap,
            Self::SamplingTime(_) => Verb::SamplingTime,
            Self::TapDebounce(_) => Verb::TapDebounce,
            Self::MotorDuration(_) => Verb::MotorDuration,
            Self::MotorIntensity(_) => Verb::Intensity,
            Self::AccelRange(_) => Verb::Range,
            Self::TapThreshold(_) => Verb::Threshold,
            Self::ThresholdDuration(_) => Verb::ThreshDuration,
        }
    }

    /// Argument sent after the verb is confirmed, if any
    pub fn value(&self) -> Option<i64> {
        match *self {
            Self::Ping => None,
            Self::Setup(finger) | Self::Tap(finger) => Some(i64::from(finger.index())),
            Self::SamplingTime(ms)
            | Self::TapDebounce(ms)
            | Self::MotorDuration(ms)
            | Self::ThresholdDuration(ms) => Some(i64::from(ms)),
            Self::MotorIntensity(v) | Self::TapThreshold(v) => Some(i64::from(v)),
            Self::AccelRange(range) => Some(i64::from(range.g())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{} {}", self.verb(), value),
            None => write!(f, "{}", self.verb()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_verbs() {
        assert_eq!(Command::MotorDuration(100).verb().as_str(), "motorduration");
        assert_eq!(Command::ThresholdDuration(150).verb().as_str(), "threshduration");
        assert_eq!(Command::SamplingTime(10).verb().as_str(), "samplingTime");
        assert_eq!(Command::TapDebounce(10).verb().as_str(), "tapDebounce");
        assert_eq!(Command::Ping.verb().confirmation(), "ack");
        assert_eq!(Command::Setup(Finger::Ring).verb().confirmation(), "setup");
    }

    #[test]
    fn test_values() {
        assert_eq!(Command::Ping.value(), None);
        assert_eq!(Command::Tap(Finger::Thumb).value(), Some(1));
        assert_eq!(Command::Setup(Finger::Pinky).value(), Some(5));
        assert_eq!(Command::accel_range(8).value(), Some(8));
    }

    #[test]
    fn test_intensity_clamping() {
        assert_eq!(Command::motor_intensity(300), Command::MotorIntensity(255));
        assert_eq!(Command::motor_intensity(-4), Command::MotorIntensity(0));
        assert_eq!(Command::motor_intensity(0), Command::MotorIntensity(0));
        assert_eq!(Command::motor_intensity(128), Command::MotorIntensity(128));
    }

    #[test]
    fn test_invalid_range_defaults_to_16() {
        assert_eq!(Command::accel_range(3), Command::AccelRange(AccelRange::G16));
        assert_eq!(Command::accel_range(4), Command::AccelRange(AccelRange::G4));
    }

    #[test]
    fn test_threshold_conversion() {
        assert_eq!(ms_to_increment(100.0), 160);
        assert_eq!(ms_to_increment(0.625), 1);
        assert_eq!(ms_to_increment(159.375), 255);
        assert_eq!(ms_to_increment(200.0), 255);
        assert_eq!(ms_to_increment(-1.0), 0);
    }

    #[test]
    fn test_range_serde_rejects_unsupported() {
        assert_eq!(AccelRange::try_from(8), Ok(AccelRange::G8));
        assert!(AccelRange::try_from(6).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::MotorIntensity(200).to_string(), "intensity 200");
        assert_eq!(Command::Ping.to_string(), "ping");
    }

    #[test]
    fn test_truncate_ms() {
        assert_eq!(truncate_ms(100.7), 100);
        assert_eq!(truncate_ms(0.2), 0);
        assert_eq!(truncate_ms(-5.0), 0);
        assert_eq!(truncate_ms(f64::NAN), 0);
        assert_eq!(truncate_ms(1e12), u32::MAX);
    }
}
