//! Device sessions against the simulated device

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tapcue_core::core::protocol::{AccelRange, Verb};
use tapcue_core::core::simulator::ErrorInjectionConfig;
use tapcue_core::{
    Command, CycleLimits, DeviceError, DeviceSession, DeviceSettings, Finger, FrameError,
    LineChannel, RetryPolicy, SimulatedDevice, TapScript, TapSlot, TransportError,
};

/// Echoes every line it is sent, otherwise reports status forever
struct ChatteringDevice {
    echoes: VecDeque<String>,
}

impl ChatteringDevice {
    fn new() -> Self {
        Self {
            echoes: VecDeque::new(),
        }
    }
}

impl LineChannel for ChatteringDevice {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.echoes.push_back(line.to_string());
        Ok(())
    }

    fn receive_line(&mut self, _timeout: Duration) -> Result<Option<String>, TransportError> {
        Ok(Some(
            self.echoes
                .pop_front()
                .unwrap_or_else(|| "accelerometer status ok".to_string()),
        ))
    }

    fn connection_info(&self) -> String {
        "chatter".to_string()
    }
}

fn limits() -> CycleLimits {
    CycleLimits {
        command: RetryPolicy::attempts(50),
        markers: RetryPolicy::attempts(50),
        read_timeout: Duration::from_millis(1),
    }
}

#[test]
fn configure_reaches_the_device() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    let mut session = DeviceSession::new("right", device, limits());

    assert!(session.ping().unwrap());
    let settings = DeviceSettings {
        motor_duration_ms: 80.0,
        motor_intensity: 200,
        accel_range_g: 4,
        tap_threshold_ms: 50.0,
        threshold_duration_ms: 120.9,
        sampling_time_ms: 1500.0,
        tap_debounce_ms: 90.0,
    };
    session.configure(&settings).unwrap();

    assert_eq!(handle.setting(Verb::MotorDuration), Some(80));
    assert_eq!(handle.setting(Verb::Intensity), Some(200));
    assert_eq!(handle.setting(Verb::Range), Some(4));
    assert_eq!(handle.setting(Verb::Threshold), Some(80));
    assert_eq!(handle.setting(Verb::ThreshDuration), Some(120));
    assert_eq!(handle.setting(Verb::SamplingTime), Some(1500));
    assert_eq!(handle.setting(Verb::TapDebounce), Some(90));

    let confirmed = session.configuration();
    assert_eq!(confirmed.accel_range, Some(AccelRange::G4));
    assert_eq!(confirmed.tap_threshold, Some(80));
    assert_eq!(confirmed.motor_duration_ms, Some(80));
}

#[test]
fn tap_cycle_end_to_end() {
    let device = SimulatedDevice::new("left");
    let handle = device.handle();
    handle.queue_cycle(
        TapScript::new(
            2000,
            ["2010,3,-2,250", "2020,4,-1,251"],
            ["index,2400", "thumb,2650", "pinky,2400"],
        )
        .with_preamble(["motor on", "motor off"]),
    );

    let mut session = DeviceSession::new("left", device, limits());
    session.setup_finger(Finger::Index).unwrap();
    let result = session.run_tap(Finger::Index).unwrap();

    assert_eq!(result.samples.len(), 2);
    assert_eq!(result.samples[0].time, 0.01);
    assert_eq!(result.taps_for(Finger::Index), &[0.4]);
    assert_eq!(result.taps_for(Finger::Middle), &[] as &[f64]);
    assert_eq!(result.first_taps[0].finger(), Some(Finger::Index));
    assert_eq!(result.first_taps[1].finger(), Some(Finger::Pinky));
    assert_eq!(result.first_taps[2].finger(), Some(Finger::Thumb));
    assert_eq!(result.first_taps[2].time(), Some(0.65));
    assert!(result.is_correct());
}

#[test]
fn dropped_echoes_are_retried() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    handle.drop_next_echoes(2);

    let mut session = DeviceSession::new("right", device, limits());
    session.setup_finger(Finger::Ring).unwrap();

    assert_eq!(session.stats().retries, 2);
    assert_eq!(handle.calibrated(), vec![Finger::Ring]);
    assert!(session.configuration().is_calibrated(Finger::Ring));
}

#[test]
fn corrupted_echoes_are_discarded() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    handle.corrupt_next_echoes(3);
    handle.push_line("battery 87%");

    let mut session = DeviceSession::new("right", device, limits());
    session
        .configure(&DeviceSettings::default())
        .unwrap();

    assert!(session.stats().discarded >= 3);
    assert_eq!(handle.setting(Verb::Intensity), Some(255));
}

#[test]
fn silent_device_times_out() {
    let mut session = DeviceSession::new("right", SimulatedDevice::unresponsive("right"), limits());

    let err = session.setup_finger(Finger::Thumb).unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_link());
    assert!(!session.configuration().is_calibrated(Finger::Thumb));
}

#[test]
fn missing_marker_times_out() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    let mut session = DeviceSession::new("right", device, limits());
    session.setup_finger(Finger::Middle).unwrap();

    handle.stall_next_cycles(1);
    let err = session.run_tap(Finger::Middle).unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("sampling finished"));

    // The next cycle is unaffected.
    let result = session.run_tap(Finger::Middle).unwrap();
    assert_eq!(result.cued, Finger::Middle);
}

#[test]
fn malformed_sample_discards_cycle() {
    let device = SimulatedDevice::new("right");
    device
        .handle()
        .queue_cycle(TapScript::new(0, ["100,5"], ["middle,200"]));

    let mut session = DeviceSession::new("right", device, limits());
    let err = session.run_tap(Finger::Middle).unwrap_err();
    assert!(matches!(err, DeviceError::Frame(FrameError::Sample { index: 0, .. })));
    assert_eq!(session.stats().cycles, 0);
}

#[test]
fn no_taps_pads_with_sentinels() {
    let device = SimulatedDevice::new("right");
    device
        .handle()
        .queue_cycle(TapScript::new(0, ["10,0,0,256"], Vec::<&str>::new()));

    let mut session = DeviceSession::new("right", device, limits());
    let result = session.run_tap(Finger::Thumb).unwrap();
    assert_eq!(result.first_taps, [TapSlot::NoData; 3]);
    assert_eq!(result.first_tap().finger_label(), "NA");
    assert!(!result.is_correct());
}

#[test]
fn lossy_link_still_converges() {
    let device = SimulatedDevice::with_seed("right", 42).with_faults(ErrorInjectionConfig::lossy());
    let mut session = DeviceSession::new(
        "right",
        device,
        CycleLimits {
            command: RetryPolicy::attempts(500),
            markers: RetryPolicy::attempts(500),
            read_timeout: Duration::from_millis(1),
        },
    );

    session.configure(&DeviceSettings::default()).unwrap();
    for finger in Finger::ALL {
        session.setup_finger(finger).unwrap();
    }
    for finger in [Finger::Thumb, Finger::Pinky] {
        let result = session.run_tap(finger).unwrap();
        assert_eq!(result.cued, finger);
        assert!(!result.samples.is_empty());
    }
    assert_eq!(session.configuration().calibrated.len(), 5);
}

#[test]
fn chatter_spends_the_marker_budget() {
    let mut session = DeviceSession::new("right", ChatteringDevice::new(), limits());

    let err = session.run_tap(Finger::Middle).unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("waiting for tap"));
}

#[test]
fn chatter_hits_the_marker_deadline() {
    let mut session = DeviceSession::new(
        "right",
        ChatteringDevice::new(),
        CycleLimits {
            command: RetryPolicy::attempts(10),
            markers: RetryPolicy {
                max_attempts: u32::MAX,
                deadline_ms: 30,
            },
            read_timeout: Duration::from_millis(1),
        },
    );

    let started = Instant::now();
    let err = session.run_tap(Finger::Index).unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn repeated_command_applies_once_per_exchange() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    let mut session = DeviceSession::new("right", device, limits());

    let first = session.send_command(Command::MotorDuration(100)).unwrap();
    let confirmed = session.configuration().clone();
    let second = session.send_command(Command::MotorDuration(100)).unwrap();

    assert_eq!(first.exchanges(), 2);
    assert_eq!(second.exchanges(), 2);
    assert_eq!(
        handle.applied(),
        vec![(Verb::MotorDuration, 100), (Verb::MotorDuration, 100)]
    );
    assert_eq!(
        handle.sent(),
        vec!["motorduration", "100", "motorduration", "100"]
    );
    assert_eq!(session.configuration(), &confirmed);
    assert_eq!(confirmed.motor_duration_ms, Some(100));
}
