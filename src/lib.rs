//! # Tapcue Core Library
//!
//! Host-side driver for serial finger-tap devices: a microcontroller with one
//! accelerometer per finger and a vibration motor, strapped to a hand. The
//! host cues a finger, the device reports what the accelerometers saw, and
//! the library turns that report into timed per-finger taps.
//!
//! ## Features
//!
//! - Send-until-echo command handshake with bounded retries
//! - Tap cycle acquisition driven by an explicit marker state machine
//! - Pure tap-data processing (relative times, ordered first taps)
//! - Simulated device with fault injection for tests and dry runs
//! - Experiment runs with CSV trial recording
//! - CLI with exit codes and text/JSON/CSV output
//!
//! ## Example
//!
//! ```rust,no_run
//! use tapcue_core::{CycleLimits, DeviceSession, DeviceSettings, Finger, SerialSettings};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut session = DeviceSession::open_serial(
//!         "right",
//!         "/dev/ttyACM0",
//!         &SerialSettings::default(),
//!         CycleLimits::default(),
//!     )?;
//!
//!     if session.ping()? {
//!         session.configure(&DeviceSettings::default())?;
//!         session.setup_finger(Finger::Index)?;
//!         let result = session.run_tap(Finger::Index)?;
//!         println!("first tap: {}", result.first_tap());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::device::{
    DeviceConfiguration, DeviceError, DeviceSession, DeviceSettings,
};
pub use crate::core::experiment::{
    Experiment, ExperimentError, ExperimentSettings, Hand, HandConfig, Stimulus,
};
pub use crate::core::finger::Finger;
pub use crate::core::protocol::{Command, ProtocolError};
pub use crate::core::recorder::TrialRecorder;
pub use crate::core::simulator::{SimulatedDevice, SimulatorHandle, TapScript};
pub use crate::core::state_machine::RetryPolicy;
pub use crate::core::tap::{CycleLimits, FrameError, TapResult, TapSlot};
pub use crate::core::transport::{LineChannel, SerialLineChannel, SerialSettings, TransportError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
