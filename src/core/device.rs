//! Device session
//!
//! A [`DeviceSession`] owns one device's line channel for its whole lifetime
//! and keeps the configuration the hardware has confirmed. Everything the
//! experiment loop does with a device goes through it.

use crate::core::finger::Finger;
use crate::core::protocol::{
    exchange, truncate_ms, AccelRange, Command, ExchangeReport, ProtocolError,
};
use crate::core::tap::{process, run_cycle, CycleLimits, FrameError, TapResult};
use crate::core::transport::{LineChannel, SerialLineChannel, SerialSettings, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Device error types
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Link failure or protocol timeout
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A tap cycle's payload did not parse; the cycle is discarded
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Finger index outside 1-5
    #[error("finger index {0} out of range (1 thumb - 5 pinky)")]
    InvalidFinger(u8),
}

impl From<TransportError> for DeviceError {
    fn from(err: TransportError) -> Self {
        Self::Protocol(ProtocolError::Link(err))
    }
}

impl DeviceError {
    /// Link failure: the session is unusable
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::Link(_)))
    }

    /// Retry budget exhausted; the caller may retry the command
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::Timeout { .. }))
    }
}

/// Resolve a 1-based finger index
pub fn finger_from_index(index: u8) -> Result<Finger, DeviceError> {
    Finger::from_index(index).ok_or(DeviceError::InvalidFinger(index))
}

/// Requested device settings, as entered by the experimenter
///
/// Values are clamped to the hardware's domain when pushed, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Motor activation duration, ms; fractions are truncated when sent
    pub motor_duration_ms: f64,
    /// Motor intensity, 0-255; 0 or less disables the motor
    pub motor_intensity: i64,
    /// Accelerometer range in G: 2, 4, 8 or 16
    pub accel_range_g: i64,
    /// Tap threshold, ms (0 - 159.375)
    pub tap_threshold_ms: f64,
    /// Maximum tap duration, ms
    pub threshold_duration_ms: f64,
    /// Sampling window after the cue, ms
    pub sampling_time_ms: f64,
    /// Tap debounce, ms
    pub tap_debounce_ms: f64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            motor_duration_ms: 100.0,
            motor_intensity: 255,
            accel_range_g: 16,
            tap_threshold_ms: 100.0,
            threshold_duration_ms: 150.0,
            sampling_time_ms: 2000.0,
            tap_debounce_ms: 100.0,
        }
    }
}

impl DeviceSettings {
    /// Commands that push these settings, in the order they are sent
    pub fn commands(&self) -> Vec<Command> {
        vec![
            Command::MotorDuration(truncate_ms(self.motor_duration_ms)),
            Command::motor_intensity(self.motor_intensity),
            Command::accel_range(self.accel_range_g),
            Command::tap_threshold_ms(self.tap_threshold_ms),
            Command::ThresholdDuration(truncate_ms(self.threshold_duration_ms)),
            Command::SamplingTime(truncate_ms(self.sampling_time_ms)),
            Command::TapDebounce(truncate_ms(self.tap_debounce_ms)),
        ]
    }
}

/// Values the device has confirmed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceConfiguration {
    /// Motor activation duration, ms
    pub motor_duration_ms: Option<u32>,
    /// Motor intensity
    pub motor_intensity: Option<u8>,
    /// Accelerometer range
    pub accel_range: Option<AccelRange>,
    /// Tap threshold as a hardware increment
    pub tap_threshold: Option<u8>,
    /// Maximum tap duration, ms
    pub threshold_duration_ms: Option<u32>,
    /// Sampling window, ms
    pub sampling_time_ms: Option<u32>,
    /// Debounce, ms
    pub tap_debounce_ms: Option<u32>,
    /// Fingers whose accelerometers have been set up
    pub calibrated: BTreeSet<Finger>,
}

impl DeviceConfiguration {
    /// Record a command the device has just confirmed
    fn record(&mut self, command: &Command) {
        match *command {
            Command::Ping | Command::Tap(_) => {}
            Command::Setup(finger) => {
                self.calibrated.insert(finger);
            }
            Command::SamplingTime(ms) => self.sampling_time_ms = Some(ms),
            Command::TapDebounce(ms) => self.tap_debounce_ms = Some(ms),
            Command::MotorDuration(ms) => self.motor_duration_ms = Some(ms),
            Command::MotorIntensity(v) => self.motor_intensity = Some(v),
            Command::AccelRange(range) => self.accel_range = Some(range),
            Command::TapThreshold(v) => self.tap_threshold = Some(v),
            Command::ThresholdDuration(ms) => self.threshold_duration_ms = Some(ms),
        }
    }

    /// Has `finger` been set up on this device?
    pub fn is_calibrated(&self, finger: Finger) -> bool {
        self.calibrated.contains(&finger)
    }
}

/// Counters over a session's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Confirmed commands
    pub commands: u64,
    /// Resends across all commands
    pub retries: u64,
    /// Device lines discarded as noise during handshakes
    pub discarded: u64,
    /// Completed tap cycles
    pub cycles: u64,
}

/// One device, its channel and its confirmed configuration
pub struct DeviceSession<C: LineChannel> {
    name: String,
    channel: C,
    limits: CycleLimits,
    configuration: DeviceConfiguration,
    stats: SessionStats,
}

impl DeviceSession<SerialLineChannel> {
    /// Open a serial device
    pub fn open_serial(
        name: &str,
        port: &str,
        settings: &SerialSettings,
        limits: CycleLimits,
    ) -> Result<Self, DeviceError> {
        let channel = SerialLineChannel::open(port, settings)?;
        Ok(Self::new(name, channel, limits))
    }
}

impl<C: LineChannel> DeviceSession<C> {
    /// Wrap an open channel
    pub fn new(name: &str, channel: C, limits: CycleLimits) -> Self {
        Self {
            name: name.to_string(),
            channel,
            limits,
            configuration: DeviceConfiguration::default(),
            stats: SessionStats::default(),
        }
    }

    /// Session name (e.g. the hand)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection description
    pub fn connection_info(&self) -> String {
        self.channel.connection_info()
    }

    /// Confirmed configuration
    pub fn configuration(&self) -> &DeviceConfiguration {
        &self.configuration
    }

    /// Lifetime counters
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Release the channel
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Exchange one command and record it once confirmed
    pub fn send_command(&mut self, command: Command) -> Result<ExchangeReport, DeviceError> {
        let report = exchange(
            &mut self.channel,
            &command,
            &self.limits.command,
            self.limits.read_timeout,
        )?;

        self.configuration.record(&command);
        self.stats.commands += 1;
        self.stats.retries += u64::from(report.retries());
        self.stats.discarded += u64::from(report.discarded);
        Ok(report)
    }

    /// Check the device is alive. A device that never acknowledges reads as
    /// `false`; a broken link is an error.
    pub fn ping(&mut self) -> Result<bool, DeviceError> {
        match self.send_command(Command::Ping) {
            Ok(_) => {
                tracing::info!("[{}] device answered ping", self.name);
                Ok(true)
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!("[{}] no answer to ping: {}", self.name, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Push every setting to the device
    pub fn configure(&mut self, settings: &DeviceSettings) -> Result<(), DeviceError> {
        for command in settings.commands() {
            self.send_command(command)?;
            tracing::info!("[{}] {} confirmed", self.name, command);
        }
        Ok(())
    }

    /// Calibrate one finger's accelerometer
    pub fn setup_finger(&mut self, finger: Finger) -> Result<(), DeviceError> {
        self.send_command(Command::Setup(finger))?;
        tracing::info!("[{}] {} set up", self.name, finger);
        Ok(())
    }

    /// Cue a tap on `finger` and return the processed cycle
    pub fn run_tap(&mut self, finger: Finger) -> Result<TapResult, DeviceError> {
        if !self.configuration.is_calibrated(finger) {
            tracing::warn!("[{}] cueing {} before it was set up", self.name, finger);
        }

        let payload = run_cycle(&mut self.channel, finger, &self.limits)?;
        let result = process(&payload)?;
        self.stats.cycles += 1;

        tracing::info!(
            "[{}] cued {}, first tap {}",
            self.name,
            finger,
            result.first_tap()
        );
        Ok(result)
    }
}
