//! Core module containing the main functionality of Tapcue
//!
//! This module provides:
//! - Line transport to the device (serial)
//! - Command protocol with echo confirmation
//! - Retry budgets and the tap-cycle state machine
//! - Tap cycle acquisition and processing
//! - Device sessions holding confirmed configuration
//! - Simulated device with fault injection
//! - Experiment runs and trial recording

pub mod device;
pub mod experiment;
pub mod finger;
pub mod protocol;
pub mod recorder;
pub mod simulator;
pub mod state_machine;
pub mod tap;
pub mod transport;
