//! Tap cycles: acquisition from the device and processing of the payload

pub mod processor;
pub mod session;

pub use processor::{
    process, AccelSample, FingerTap, FrameError, RawTapPayload, TapResult, TapSlot, FIRST_TAPS,
};
pub use session::{run_cycle, CycleLimits};
