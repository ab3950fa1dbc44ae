//! Cued-tap experiment runs
//!
//! An experiment drives one [`DeviceSession`] per hand through a shuffled
//! list of stimuli:
//! - ping every device, push the configuration, set up each finger in use
//! - cue each stimulus in turn and score the first tap
//! - record every trial unless the run is practice (test number 0)
//!
//! Any device error halts the run; nothing is fabricated for the trial that
//! failed.

use crate::core::device::{finger_from_index, DeviceError, DeviceSession, DeviceSettings};
use crate::core::finger::Finger;
use crate::core::recorder::{format_stamp, TrialRecorder};
use crate::core::tap::TapResult;
use crate::core::transport::{LineChannel, SerialSettings};
use chrono::Local;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Hand a device is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    /// Right hand
    Right,
    /// Left hand
    Left,
}

impl Hand {
    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hand {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right" => Ok(Self::Right),
            "left" => Ok(Self::Left),
            other => Err(ExperimentError::UnknownHand(other.to_string())),
        }
    }
}

/// Device assignment for one hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandConfig {
    /// Which hand
    pub hand: Hand,
    /// Serial port of that hand's device
    pub port: String,
    /// Fingers to cue, 1 (thumb) - 5 (pinky); empty leaves the hand unused
    #[serde(default)]
    pub fingers: Vec<u8>,
}

impl HandConfig {
    /// Fingers to cue, validated
    pub fn fingers(&self) -> Result<Vec<Finger>, ExperimentError> {
        self.fingers
            .iter()
            .map(|&index| {
                finger_from_index(index).map_err(|source| ExperimentError::Device {
                    hand: self.hand,
                    source,
                })
            })
            .collect()
    }

    /// Does this hand take part?
    pub fn is_used(&self) -> bool {
        !self.fingers.is_empty()
    }
}

/// Run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSettings {
    /// Participant code
    pub participant: String,
    /// Test number; 0 is practice and records nothing
    pub test_number: u32,
    /// Participant's dominant hand
    pub dominant_hand: Hand,
    /// How the hands are placed, free text
    pub hand_pose: String,
    /// Trials per (hand, finger)
    pub trials_per_finger: u32,
    /// Report correctness and reaction time after each trial
    pub feedback: bool,
    /// Directory for recorded data
    pub data_dir: PathBuf,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            participant: "000".to_string(),
            test_number: 1,
            dominant_hand: Hand::Right,
            hand_pose: "hands square".to_string(),
            trials_per_finger: 5,
            feedback: true,
            data_dir: PathBuf::from("TAP-data"),
        }
    }
}

impl ExperimentSettings {
    /// Practice runs are not recorded
    pub fn is_practice(&self) -> bool {
        self.test_number == 0
    }
}

/// One cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stimulus {
    /// Hand to cue
    pub hand: Hand,
    /// Finger to cue
    pub finger: Finger,
}

/// Every (hand, finger) in use, once each, in configuration order
pub fn stimulus_block(hands: &[HandConfig]) -> Result<Vec<Stimulus>, ExperimentError> {
    let mut base = Vec::new();
    for config in hands.iter().filter(|h| h.is_used()) {
        for finger in config.fingers()? {
            base.push(Stimulus {
                hand: config.hand,
                finger,
            });
        }
    }
    if base.is_empty() {
        return Err(ExperimentError::NoHands);
    }
    Ok(base)
}

/// `trials_per_finger` repetitions of the [`stimulus_block`], unshuffled
pub fn build_stimuli(
    hands: &[HandConfig],
    trials_per_finger: u32,
) -> Result<Vec<Stimulus>, ExperimentError> {
    let base = stimulus_block(hands)?;
    let mut stimuli = Vec::with_capacity(base.len() * trials_per_finger as usize);
    for _ in 0..trials_per_finger {
        stimuli.extend_from_slice(&base);
    }
    Ok(stimuli)
}

/// Shuffle each repetition of `block_len` stimuli on its own, so every
/// (hand, finger) is cued once per block before any is cued again
pub fn shuffle_stimuli<R: Rng + ?Sized>(stimuli: &mut [Stimulus], block_len: usize, rng: &mut R) {
    if block_len == 0 {
        return;
    }
    for block in stimuli.chunks_mut(block_len) {
        block.shuffle(rng);
    }
}

/// Experiment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExperimentStatus {
    /// Not started
    Pending,
    /// Devices configured, ready to run
    Prepared,
    /// Trials in progress
    Running,
    /// All trials done
    Completed,
    /// Stopped on request
    Cancelled,
    /// Halted by an error
    Failed,
}

/// One completed trial
#[derive(Debug, Clone, Serialize)]
pub struct TrialOutcome {
    /// 1-based trial number
    pub number: usize,
    /// Trials in the run
    pub total: usize,
    /// What was cued
    pub stimulus: Stimulus,
    /// What the device measured
    pub result: TapResult,
}

impl TrialOutcome {
    /// First tap came from the cued finger
    pub fn is_correct(&self) -> bool {
        self.result.is_correct()
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentSummary {
    /// Trials completed
    pub trials: usize,
    /// Trials planned
    pub planned: usize,
    /// Trials scored correct
    pub correct: usize,
    /// Prefix of the recorded files; `None` for practice
    pub saved_to: Option<PathBuf>,
    /// Run stopped before all trials were done
    pub cancelled: bool,
}

impl ExperimentSummary {
    /// Fraction of completed trials scored correct
    pub fn accuracy(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.correct as f64 / self.trials as f64
        }
    }
}

/// Experiment error types
#[derive(Error, Debug)]
pub enum ExperimentError {
    /// No hand has fingers to cue
    #[error("at least one hand must have fingers to use")]
    NoHands,

    /// Unrecognised hand name
    #[error("unknown hand {0:?} (expected right or left)")]
    UnknownHand(String),

    /// A stimulus targets a hand without a session
    #[error("no device attached for the {0} hand")]
    MissingDevice(Hand),

    /// The device never acknowledged the ping
    #[error("{0} device did not answer ping")]
    NoAnswer(Hand),

    /// A device operation failed
    #[error("{hand} device: {source}")]
    Device {
        /// Hand of the failing device
        hand: Hand,
        /// Underlying failure
        #[source]
        source: DeviceError,
    },

    /// Recording failed
    #[error("recording failed: {0}")]
    Record(#[from] std::io::Error),
}

impl ExperimentError {
    /// Underlying device failure, if any
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            Self::Device { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One run over a set of device sessions
pub struct Experiment<C: LineChannel> {
    settings: ExperimentSettings,
    device: DeviceSettings,
    hands: Vec<HandConfig>,
    serial: Option<SerialSettings>,
    print_device_messages: bool,
    sessions: BTreeMap<Hand, DeviceSession<C>>,
    status: ExperimentStatus,
    started: String,
    stop: Arc<AtomicBool>,
}

impl<C: LineChannel> Experiment<C> {
    /// New experiment; sessions are attached separately
    pub fn new(settings: ExperimentSettings, device: DeviceSettings, hands: Vec<HandConfig>) -> Self {
        Self {
            settings,
            device,
            hands,
            serial: None,
            print_device_messages: false,
            sessions: BTreeMap::new(),
            status: ExperimentStatus::Pending,
            started: format_stamp(&Local::now()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record the link parameters the sessions were opened with
    pub fn with_serial(mut self, serial: SerialSettings, print_device_messages: bool) -> Self {
        self.serial = Some(serial);
        self.print_device_messages = print_device_messages;
        self
    }

    /// Flag that stops the run before the next trial when set
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Current status
    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Run settings
    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    /// Hands taking part
    pub fn used_hands(&self) -> impl Iterator<Item = &HandConfig> {
        self.hands.iter().filter(|h| h.is_used())
    }

    /// Attach the session for `hand`
    pub fn attach(&mut self, hand: Hand, session: DeviceSession<C>) {
        self.sessions.insert(hand, session);
    }

    /// Session attached for `hand`
    pub fn session(&self, hand: Hand) -> Option<&DeviceSession<C>> {
        self.sessions.get(&hand)
    }

    /// Key/value rows describing this run, as written to the info file
    pub fn info_rows(&self) -> Vec<(String, String)> {
        let s = &self.settings;
        let d = &self.device;
        let mut rows = vec![
            ("participant".to_string(), s.participant.clone()),
            ("test number".to_string(), s.test_number.to_string()),
            ("dominant hand".to_string(), s.dominant_hand.to_string()),
            ("hand pose".to_string(), s.hand_pose.clone()),
            ("trials per finger".to_string(), s.trials_per_finger.to_string()),
            ("feedback".to_string(), s.feedback.to_string()),
            ("data folder".to_string(), s.data_dir.display().to_string()),
        ];
        for h in &self.hands {
            let fingers: Vec<String> = h.fingers.iter().map(u8::to_string).collect();
            rows.push((format!("{} fingers", h.hand), fingers.join(",")));
            rows.push((format!("{} port", h.hand), h.port.clone()));
        }
        rows.extend([
            ("motor duration (ms)".to_string(), d.motor_duration_ms.to_string()),
            ("motor intensity".to_string(), d.motor_intensity.to_string()),
            ("accelerometer range (G)".to_string(), d.accel_range_g.to_string()),
            ("tap threshold (ms)".to_string(), d.tap_threshold_ms.to_string()),
            ("max tap duration (ms)".to_string(), d.threshold_duration_ms.to_string()),
            ("sampling time (ms)".to_string(), d.sampling_time_ms.to_string()),
            ("tap debounce (ms)".to_string(), d.tap_debounce_ms.to_string()),
        ]);
        if let Some(serial) = &self.serial {
            rows.extend([
                ("serial baud rate".to_string(), serial.baud_rate.to_string()),
                ("serial timeout (ms)".to_string(), serial.read_timeout_ms.to_string()),
            ]);
        }
        rows.extend([
            (
                "print device messages".to_string(),
                self.print_device_messages.to_string(),
            ),
            ("date and time".to_string(), self.started.clone()),
        ]);
        rows
    }

    /// Ping, configure and set up every hand in use. Hands are prepared on
    /// their own threads; each session is touched by exactly one of them.
    pub fn prepare(&mut self) -> Result<(), ExperimentError> {
        let mut jobs = Vec::new();
        for config in self.hands.iter().filter(|h| h.is_used()) {
            let fingers = config.fingers()?;
            if !self.sessions.contains_key(&config.hand) {
                return Err(ExperimentError::MissingDevice(config.hand));
            }
            jobs.push((config.hand, fingers));
        }

        let device = &self.device;
        let results: Vec<Result<(), ExperimentError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .sessions
                .iter_mut()
                .filter_map(|(hand, session)| {
                    let (_, fingers) = jobs.iter().find(|(h, _)| h == hand)?;
                    let hand = *hand;
                    Some(scope.spawn(move || prepare_hand(hand, session, device, fingers)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        if let Some(err) = results.into_iter().find_map(Result::err) {
            self.status = ExperimentStatus::Failed;
            return Err(err);
        }
        self.status = ExperimentStatus::Prepared;
        Ok(())
    }

    /// Run every trial in `stimuli` order. `on_trial` sees each outcome as
    /// soon as it is measured.
    pub fn run(
        &mut self,
        stimuli: &[Stimulus],
        on_trial: impl FnMut(&TrialOutcome),
    ) -> Result<ExperimentSummary, ExperimentError> {
        self.run_with_cues(stimuli, |_, _, _| {}, on_trial)
    }

    /// Like [`Experiment::run`], calling `on_cue(number, total, stimulus)`
    /// just before each cue goes out
    pub fn run_with_cues(
        &mut self,
        stimuli: &[Stimulus],
        mut on_cue: impl FnMut(usize, usize, &Stimulus),
        mut on_trial: impl FnMut(&TrialOutcome),
    ) -> Result<ExperimentSummary, ExperimentError> {
        for stimulus in stimuli {
            if !self.sessions.contains_key(&stimulus.hand) {
                return Err(ExperimentError::MissingDevice(stimulus.hand));
            }
        }

        let mut recorder = if self.settings.is_practice() {
            tracing::info!("Practice run, nothing will be recorded");
            None
        } else {
            Some(TrialRecorder::create(
                &self.settings.data_dir,
                &self.started,
                &self.settings.participant,
                &self.info_rows(),
            )?)
        };

        self.status = ExperimentStatus::Running;
        let total = stimuli.len();
        let mut summary = ExperimentSummary {
            trials: 0,
            planned: total,
            correct: 0,
            saved_to: None,
            cancelled: false,
        };

        for (i, stimulus) in stimuli.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                tracing::warn!("Run stopped after {} of {} trials", i, total);
                summary.cancelled = true;
                self.status = ExperimentStatus::Cancelled;
                break;
            }

            let number = i + 1;
            tracing::info!("Tap cued on {} {}", stimulus.hand, stimulus.finger);
            on_cue(number, total, stimulus);
            let result = match self.trial(*stimulus) {
                Ok(result) => result,
                Err(err) => {
                    self.status = ExperimentStatus::Failed;
                    return Err(err);
                }
            };

            let outcome = TrialOutcome {
                number,
                total,
                stimulus: *stimulus,
                result,
            };
            if let Some(recorder) = recorder.as_mut() {
                recorder.record(number, stimulus, &outcome.result)?;
            }

            summary.trials += 1;
            if outcome.is_correct() {
                summary.correct += 1;
            }
            on_trial(&outcome);
            tracing::debug!("{} of {} trials complete", number, total);
        }

        if let Some(recorder) = recorder {
            summary.saved_to = Some(recorder.finish()?);
        }
        if !summary.cancelled {
            self.status = ExperimentStatus::Completed;
        }
        Ok(summary)
    }

    fn trial(&mut self, stimulus: Stimulus) -> Result<TapResult, ExperimentError> {
        let session = self
            .sessions
            .get_mut(&stimulus.hand)
            .ok_or(ExperimentError::MissingDevice(stimulus.hand))?;
        session
            .run_tap(stimulus.finger)
            .map_err(|source| ExperimentError::Device {
                hand: stimulus.hand,
                source,
            })
    }
}

fn prepare_hand<C: LineChannel>(
    hand: Hand,
    session: &mut DeviceSession<C>,
    device: &DeviceSettings,
    fingers: &[Finger],
) -> Result<(), ExperimentError> {
    let wrap = |source| ExperimentError::Device { hand, source };

    tracing::info!("[{}] connected via {}", hand, session.connection_info());
    if !session.ping().map_err(wrap)? {
        return Err(ExperimentError::NoAnswer(hand));
    }
    session.configure(device).map_err(wrap)?;
    for &finger in fingers {
        session.setup_finger(finger).map_err(wrap)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulator::SimulatedDevice;
    use crate::core::state_machine::RetryPolicy;
    use crate::core::tap::CycleLimits;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    fn hands() -> Vec<HandConfig> {
        vec![
            HandConfig {
                hand: Hand::Right,
                port: "/dev/ttyACM0".to_string(),
                fingers: vec![1, 2],
            },
            HandConfig {
                hand: Hand::Left,
                port: "/dev/ttyACM1".to_string(),
                fingers: vec![],
            },
        ]
    }

    fn limits() -> CycleLimits {
        CycleLimits {
            command: RetryPolicy::attempts(20),
            markers: RetryPolicy::attempts(20),
            read_timeout: Duration::from_millis(1),
        }
    }

    fn practice() -> ExperimentSettings {
        ExperimentSettings {
            test_number: 0,
            trials_per_finger: 2,
            ..ExperimentSettings::default()
        }
    }

    #[test]
    fn test_build_stimuli_skips_unused_hands() {
        let stimuli = build_stimuli(&hands(), 3).unwrap();
        assert_eq!(stimuli.len(), 6);
        assert!(stimuli.iter().all(|s| s.hand == Hand::Right));
        assert_eq!(stimuli.iter().filter(|s| s.finger == Finger::Index).count(), 3);
    }

    #[test]
    fn test_build_stimuli_requires_a_hand() {
        let mut hands = hands();
        hands[0].fingers.clear();
        assert!(matches!(build_stimuli(&hands, 3), Err(ExperimentError::NoHands)));
    }

    #[test]
    fn test_build_stimuli_rejects_bad_finger() {
        let mut hands = hands();
        hands[0].fingers.push(6);
        let err = build_stimuli(&hands, 1).unwrap_err();
        assert!(matches!(
            err.device_error(),
            Some(DeviceError::InvalidFinger(6))
        ));
    }

    #[test]
    fn test_shuffle_keeps_counts() {
        let mut stimuli = build_stimuli(&hands(), 10).unwrap();
        shuffle_stimuli(&mut stimuli, 2, &mut StdRng::seed_from_u64(7));
        assert_eq!(stimuli.len(), 20);
        assert_eq!(stimuli.iter().filter(|s| s.finger == Finger::Thumb).count(), 10);
    }

    #[test]
    fn test_shuffle_keeps_every_block_complete() {
        let mut hands = hands();
        hands[0].fingers = vec![1, 2, 3];
        hands[1].fingers = vec![4, 5];
        let block = stimulus_block(&hands).unwrap();
        assert_eq!(block.len(), 5);

        for seed in 0..20 {
            let mut stimuli = build_stimuli(&hands, 4).unwrap();
            shuffle_stimuli(&mut stimuli, block.len(), &mut StdRng::seed_from_u64(seed));
            assert_eq!(stimuli.len(), 20);
            for chunk in stimuli.chunks(block.len()) {
                assert_eq!(chunk.len(), block.len());
                for stimulus in &block {
                    assert_eq!(chunk.iter().filter(|s| *s == stimulus).count(), 1);
                }
            }
        }
    }

    #[test]
    fn test_shuffle_varies_order_within_blocks() {
        let mut hands = hands();
        hands[0].fingers = vec![1, 2, 3, 4, 5];
        let ordered = build_stimuli(&hands, 6).unwrap();
        let mut stimuli = ordered.clone();
        shuffle_stimuli(&mut stimuli, 5, &mut StdRng::seed_from_u64(11));
        assert_ne!(stimuli, ordered);
    }

    #[test]
    fn test_info_rows_carry_participant_and_link() {
        let settings = ExperimentSettings {
            dominant_hand: Hand::Left,
            hand_pose: "palms down".to_string(),
            ..practice()
        };
        let serial = SerialSettings {
            baud_rate: 115_200,
            ..SerialSettings::default()
        };
        let experiment: Experiment<SimulatedDevice> =
            Experiment::new(settings, DeviceSettings::default(), hands()).with_serial(serial, true);

        let rows = experiment.info_rows();
        let get = |key: &str| {
            rows.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("dominant hand"), Some("left"));
        assert_eq!(get("hand pose"), Some("palms down"));
        assert_eq!(get("serial baud rate"), Some("115200"));
        assert_eq!(get("serial timeout (ms)"), Some("50"));
        assert_eq!(get("print device messages"), Some("true"));
    }

    #[test]
    fn test_hand_parse() {
        assert_eq!("left".parse::<Hand>().unwrap(), Hand::Left);
        assert!("both".parse::<Hand>().is_err());
    }

    #[test]
    fn test_prepare_requires_sessions() {
        let mut experiment: Experiment<SimulatedDevice> =
            Experiment::new(practice(), DeviceSettings::default(), hands());
        assert!(matches!(
            experiment.prepare(),
            Err(ExperimentError::MissingDevice(Hand::Right))
        ));
    }

    #[test]
    fn test_practice_run() {
        let device = SimulatedDevice::new("right");
        let handle = device.handle();
        let mut experiment = Experiment::new(practice(), DeviceSettings::default(), hands());
        experiment.attach(Hand::Right, DeviceSession::new("right", device, limits()));

        experiment.prepare().unwrap();
        assert_eq!(experiment.status(), ExperimentStatus::Prepared);
        assert_eq!(handle.calibrated(), vec![Finger::Thumb, Finger::Index]);

        let stimuli = build_stimuli(&hands(), 2).unwrap();
        let mut seen = Vec::new();
        let summary = experiment
            .run(&stimuli, |outcome| seen.push(outcome.number))
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(summary.trials, 4);
        assert_eq!(summary.saved_to, None);
        assert_eq!(experiment.status(), ExperimentStatus::Completed);
    }

    #[test]
    fn test_cue_announced_before_measurement() {
        let device = SimulatedDevice::new("right");
        let handle = device.handle();
        let mut experiment = Experiment::new(practice(), DeviceSettings::default(), hands());
        experiment.attach(Hand::Right, DeviceSession::new("right", device, limits()));
        experiment.prepare().unwrap();

        let stimuli = build_stimuli(&hands(), 1).unwrap();
        let events = std::cell::RefCell::new(Vec::new());
        experiment
            .run_with_cues(
                &stimuli,
                |number, total, stimulus| {
                    // No tap has been sent for this trial yet.
                    let taps = handle.sent().iter().filter(|l| *l == "tap").count();
                    assert_eq!(taps, number - 1);
                    events.borrow_mut().push(format!("cue {}/{} {}", number, total, stimulus.finger));
                },
                |outcome| events.borrow_mut().push(format!("done {}", outcome.number)),
            )
            .unwrap();

        assert_eq!(
            events.into_inner(),
            vec!["cue 1/2 thumb", "done 1", "cue 2/2 index", "done 2"]
        );
    }

    #[test]
    fn test_stop_flag_cancels() {
        let mut experiment = Experiment::new(practice(), DeviceSettings::default(), hands());
        experiment.attach(
            Hand::Right,
            DeviceSession::new("right", SimulatedDevice::new("right"), limits()),
        );
        experiment.stop_flag().store(true, Ordering::SeqCst);

        let stimuli = build_stimuli(&hands(), 1).unwrap();
        let summary = experiment.run(&stimuli, |_| {}).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.trials, 0);
        assert_eq!(experiment.status(), ExperimentStatus::Cancelled);
    }

    #[test]
    fn test_silent_device_fails_prepare() {
        let mut experiment = Experiment::new(practice(), DeviceSettings::default(), hands());
        experiment.attach(
            Hand::Right,
            DeviceSession::new("right", SimulatedDevice::unresponsive("right"), limits()),
        );
        assert!(matches!(
            experiment.prepare(),
            Err(ExperimentError::NoAnswer(Hand::Right))
        ));
        assert_eq!(experiment.status(), ExperimentStatus::Failed);
    }
}
