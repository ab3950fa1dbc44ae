//! Simulated tap device
//!
//! An in-memory [`LineChannel`] that honours the device wire contract: echo
//! confirmation of verbs and values, `ack` for `ping`, and a framed report
//! after each `tap`. Faults can be injected to exercise the retry paths, and
//! a [`SimulatorHandle`] lets callers inspect what the host sent after the
//! device itself has been moved into a session.

use crate::core::finger::Finger;
use crate::core::protocol::{markers, Verb, ACK};
use crate::core::transport::{LineChannel, TransportError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Lines the device reports for one tap cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapScript {
    /// Lines emitted before `waiting for tap`
    pub preamble: Vec<String>,
    /// Raw sample lines
    pub samples: Vec<String>,
    /// Device clock at cycle start, ms
    pub start_time_ms: i64,
    /// Raw tap-event lines
    pub taps: Vec<String>,
}

impl TapScript {
    /// Script with the given samples and taps
    pub fn new<S: Into<String>>(
        start_time_ms: i64,
        samples: impl IntoIterator<Item = S>,
        taps: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            preamble: Vec::new(),
            samples: samples.into_iter().map(Into::into).collect(),
            start_time_ms,
            taps: taps.into_iter().map(Into::into).collect(),
        }
    }

    /// Add diagnostic lines before the first marker
    #[must_use]
    pub fn with_preamble<S: Into<String>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.preamble = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Full line sequence as the device would send it
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.preamble.clone();
        lines.push(markers::WAITING_FOR_TAP.to_string());
        lines.extend(self.samples.iter().cloned());
        lines.push(markers::SAMPLING_FINISHED.to_string());
        lines.push(markers::START_TIME.to_string());
        lines.push(self.start_time_ms.to_string());
        lines.push(markers::TAP_TIMES.to_string());
        lines.extend(self.taps.iter().cloned());
        lines.push(markers::END_OF_DATA.to_string());
        lines
    }
}

/// Random fault injection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorInjectionConfig {
    /// Probability an echo is lost (0.0 - 1.0)
    pub drop_probability: f32,
    /// Probability an echo arrives garbled (0.0 - 1.0)
    pub corruption_probability: f32,
    /// Probability a diagnostic line precedes an echo (0.0 - 1.0)
    pub noise_probability: f32,
}

impl Default for ErrorInjectionConfig {
    fn default() -> Self {
        Self {
            drop_probability: 0.0,
            corruption_probability: 0.0,
            noise_probability: 0.0,
        }
    }
}

impl ErrorInjectionConfig {
    /// A moderately lossy link
    pub fn lossy() -> Self {
        Self {
            drop_probability: 0.1,
            corruption_probability: 0.05,
            noise_probability: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirmwareMode {
    Idle,
    AwaitValue(Verb),
}

#[derive(Debug)]
struct Outbound {
    line: String,
    arms_cycle: bool,
}

#[derive(Debug)]
struct DeviceState {
    mode: FirmwareMode,
    outbound: VecDeque<Outbound>,
    /// Report prepared by the last `tap`, released once its echo is read
    pending_cycle: Option<Vec<String>>,
    released_cycle: Option<Vec<String>>,
    scripts: VecDeque<TapScript>,
    last_value: Option<(Verb, i64)>,
    applied: Vec<(Verb, i64)>,
    calibrated: Vec<Finger>,
    sent: Vec<String>,
    drop_echoes: u32,
    corrupt_echoes: u32,
    stall_cycles: u32,
    silent: bool,
    faults: ErrorInjectionConfig,
    rng: StdRng,
    clock_ms: i64,
}

impl DeviceState {
    fn new(seed: u64) -> Self {
        Self {
            mode: FirmwareMode::Idle,
            outbound: VecDeque::new(),
            pending_cycle: None,
            released_cycle: None,
            scripts: VecDeque::new(),
            last_value: None,
            applied: Vec::new(),
            calibrated: Vec::new(),
            sent: Vec::new(),
            drop_echoes: 0,
            corrupt_echoes: 0,
            stall_cycles: 0,
            silent: false,
            faults: ErrorInjectionConfig::default(),
            rng: StdRng::seed_from_u64(seed),
            clock_ms: 5_000,
        }
    }

    fn emit_echo(&mut self, line: String, arms_cycle: bool) {
        if self.faults.noise_probability > 0.0 && self.rng.gen::<f32>() < self.faults.noise_probability {
            self.push("accelerometer status ok".to_string());
        }
        if self.drop_echoes > 0 {
            self.drop_echoes -= 1;
            return;
        }
        if self.corrupt_echoes > 0 {
            self.corrupt_echoes -= 1;
            self.push(format!("{}?", line));
            return;
        }
        if self.faults.drop_probability > 0.0 && self.rng.gen::<f32>() < self.faults.drop_probability {
            return;
        }
        if self.faults.corruption_probability > 0.0
            && self.rng.gen::<f32>() < self.faults.corruption_probability
        {
            self.push(format!("{}?", line));
            return;
        }
        self.outbound.push_back(Outbound { line, arms_cycle });
    }

    fn push(&mut self, line: String) {
        self.outbound.push_back(Outbound {
            line,
            arms_cycle: false,
        });
    }

    fn handle(&mut self, line: &str) {
        self.sent.push(line.to_string());
        if self.silent {
            return;
        }

        let verb = Verb::from_wire(line);
        let number = line.parse::<i64>().ok();

        match (self.mode, verb, number) {
            (_, Some(Verb::Ping), _) => {
                self.mode = FirmwareMode::Idle;
                self.emit_echo(ACK.to_string(), false);
            }
            (_, Some(verb), _) => {
                self.mode = FirmwareMode::AwaitValue(verb);
                self.emit_echo(verb.as_str().to_string(), false);
            }
            (FirmwareMode::AwaitValue(verb), None, Some(value)) => self.apply(verb, value),
            (FirmwareMode::Idle, None, Some(value)) => {
                // Host resending a value whose echo it never saw.
                if let Some((_, last)) = self.last_value.filter(|(_, last)| *last == value) {
                    let arms = self.pending_cycle.is_some();
                    self.emit_echo(last.to_string(), arms);
                }
            }
            _ => {}
        }
    }

    fn apply(&mut self, verb: Verb, value: i64) {
        self.mode = FirmwareMode::Idle;
        self.last_value = Some((verb, value));
        self.applied.push((verb, value));

        let mut arms = false;
        match verb {
            Verb::Setup => {
                if let Some(finger) = u8::try_from(value).ok().and_then(Finger::from_index) {
                    if !self.calibrated.contains(&finger) {
                        self.calibrated.push(finger);
                    }
                }
            }
            Verb::Tap => {
                if let Some(finger) = u8::try_from(value).ok().and_then(Finger::from_index) {
                    if self.stall_cycles > 0 {
                        // Confirms the cue, then never finishes sampling.
                        self.stall_cycles -= 1;
                        self.pending_cycle = Some(vec![markers::WAITING_FOR_TAP.to_string()]);
                    } else {
                        let script = match self.scripts.pop_front() {
                            Some(script) => script,
                            None => self.generate(finger),
                        };
                        self.pending_cycle = Some(script.lines());
                    }
                    arms = true;
                }
            }
            _ => {}
        }
        self.emit_echo(value.to_string(), arms);
    }

    fn setting(&self, verb: Verb) -> Option<i64> {
        self.applied
            .iter()
            .rev()
            .find(|(v, _)| *v == verb)
            .map(|(_, value)| *value)
    }

    /// Plausible cycle: quiet baseline with a spike where the participant
    /// taps, usually with the cued finger
    fn generate(&mut self, cued: Finger) -> TapScript {
        let sampling_ms = self.setting(Verb::SamplingTime).unwrap_or(1000).max(10);
        let start = self.clock_ms;
        let reaction = self.rng.gen_range(250..600).min(sampling_ms - 1);
        let tapped = if self.rng.gen_bool(0.85) {
            cued
        } else {
            Finger::ALL[self.rng.gen_range(0..Finger::ALL.len())]
        };

        let mut samples = Vec::new();
        let mut t = 0;
        while t < sampling_ms {
            let spike = if (t - reaction).abs() < 30 { 900 } else { 0 };
            let x = self.rng.gen_range(-8..=8) + spike / 3;
            let y = self.rng.gen_range(-8..=8);
            let z = 256 + self.rng.gen_range(-8..=8) + spike;
            samples.push(format!("{},{},{},{}", start + t, x, y, z));
            t += 10;
        }

        let mut taps = vec![format!("{},{}", tapped.name(), start + reaction)];
        if self.rng.gen_bool(0.2) {
            let other = Finger::ALL[self.rng.gen_range(0..Finger::ALL.len())];
            let later = reaction + self.rng.gen_range(40..200);
            taps.push(format!("{},{}", other.name(), start + later));
        }

        self.clock_ms += sampling_ms + 500;
        TapScript::new(start, samples, taps)
    }

    fn next_line(&mut self) -> Option<String> {
        if self.outbound.is_empty() {
            if let Some(cycle) = self.released_cycle.take() {
                for line in cycle {
                    self.push(line);
                }
            }
        }
        let entry = self.outbound.pop_front()?;
        if entry.arms_cycle {
            // Duplicate confirmations of the same cue must not clear it.
            if let Some(cycle) = self.pending_cycle.take() {
                self.released_cycle = Some(cycle);
            }
        }
        Some(entry.line)
    }
}

/// In-memory device speaking the tap wire protocol
pub struct SimulatedDevice {
    name: String,
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    /// New well-behaved device
    pub fn new(name: &str) -> Self {
        Self::with_seed(name, 0x7a9c)
    }

    /// New device with a fixed random seed for generated cycles
    pub fn with_seed(name: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(DeviceState::new(seed))),
        }
    }

    /// Device that never answers
    pub fn unresponsive(name: &str) -> Self {
        let device = Self::new(name);
        device.handle().set_silent(true);
        device
    }

    /// Enable random fault injection
    #[must_use]
    pub fn with_faults(self, faults: ErrorInjectionConfig) -> Self {
        self.state.lock().faults = faults;
        self
    }

    /// Handle sharing this device's state
    pub fn handle(&self) -> SimulatorHandle {
        SimulatorHandle {
            state: self.state.clone(),
        }
    }
}

impl LineChannel for SimulatedDevice {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.state.lock().handle(line.trim());
        Ok(())
    }

    /// Never blocks: an empty queue reads as a timeout
    fn receive_line(&mut self, _timeout: Duration) -> Result<Option<String>, TransportError> {
        Ok(self.state.lock().next_line())
    }

    fn connection_info(&self) -> String {
        format!("simulated device {}", self.name)
    }
}

/// Inspection and fault control for a [`SimulatedDevice`]
#[derive(Clone)]
pub struct SimulatorHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatorHandle {
    /// Every line the host has sent, in order
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Every value the firmware accepted, in order
    pub fn applied(&self) -> Vec<(Verb, i64)> {
        self.state.lock().applied.clone()
    }

    /// Last accepted value for `verb`
    pub fn setting(&self, verb: Verb) -> Option<i64> {
        self.state.lock().setting(verb)
    }

    /// Fingers calibrated so far
    pub fn calibrated(&self) -> Vec<Finger> {
        self.state.lock().calibrated.clone()
    }

    /// Lose the next `n` confirmations
    pub fn drop_next_echoes(&self, n: u32) {
        self.state.lock().drop_echoes = n;
    }

    /// Garble the next `n` confirmations
    pub fn corrupt_next_echoes(&self, n: u32) {
        self.state.lock().corrupt_echoes = n;
    }

    /// Stop the next `n` tap cycles after `waiting for tap`
    pub fn stall_next_cycles(&self, n: u32) {
        self.state.lock().stall_cycles = n;
    }

    /// Stop or resume answering
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Queue an unsolicited line
    pub fn push_line(&self, line: &str) {
        self.state.lock().push(line.to_string());
    }

    /// Report `script` on the next `tap` instead of a generated cycle
    pub fn queue_cycle(&self, script: TapScript) {
        self.state.lock().scripts.push_back(script);
    }
}
