//! Full experiment runs against simulated devices

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::time::Duration;
use tapcue_core::core::experiment::{
    build_stimuli, shuffle_stimuli, stimulus_block, ExperimentStatus,
};
use tapcue_core::{
    CycleLimits, DeviceSession, DeviceSettings, Experiment, ExperimentError, ExperimentSettings,
    Finger, Hand, HandConfig, RetryPolicy, SerialSettings, SimulatedDevice, TapScript,
};

fn limits() -> CycleLimits {
    CycleLimits {
        command: RetryPolicy::attempts(50),
        markers: RetryPolicy::attempts(50),
        read_timeout: Duration::from_millis(1),
    }
}

fn both_hands() -> Vec<HandConfig> {
    vec![
        HandConfig {
            hand: Hand::Right,
            port: "sim-right".to_string(),
            fingers: vec![2, 3],
        },
        HandConfig {
            hand: Hand::Left,
            port: "sim-left".to_string(),
            fingers: vec![1],
        },
    ]
}

#[test]
fn recorded_run_writes_three_files() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ExperimentSettings {
        participant: "p42".to_string(),
        test_number: 1,
        dominant_hand: Hand::Left,
        hand_pose: "hands crossed".to_string(),
        trials_per_finger: 2,
        feedback: false,
        data_dir: dir.path().join("data"),
    };

    let mut experiment = Experiment::new(settings, DeviceSettings::default(), both_hands())
        .with_serial(SerialSettings::default(), false);
    experiment.attach(
        Hand::Right,
        DeviceSession::new("right", SimulatedDevice::with_seed("right", 1), limits()),
    );
    experiment.attach(
        Hand::Left,
        DeviceSession::new("left", SimulatedDevice::with_seed("left", 2), limits()),
    );
    experiment.prepare().unwrap();

    let mut stimuli = build_stimuli(&both_hands(), 2).unwrap();
    let block_len = stimulus_block(&both_hands()).unwrap().len();
    shuffle_stimuli(&mut stimuli, block_len, &mut StdRng::seed_from_u64(3));
    let mut cued = Vec::new();
    let summary = experiment
        .run(&stimuli, |outcome| cued.push(outcome.stimulus))
        .unwrap();

    assert_eq!(summary.trials, 6);
    assert_eq!(cued, stimuli);
    assert_eq!(experiment.status(), ExperimentStatus::Completed);

    let prefix = summary.saved_to.unwrap();
    let prefix = prefix.to_string_lossy();
    assert!(prefix.ends_with("_p42"));

    let info = fs::read_to_string(format!("{}_info.csv", prefix)).unwrap();
    assert!(info.contains("participant,p42"));
    assert!(info.contains("right fingers,\"2,3\""));
    assert!(info.contains("dominant hand,left"));
    assert!(info.contains("hand pose,hands crossed"));
    assert!(info.contains("serial baud rate,9600"));
    assert!(info.contains("serial timeout (ms),50"));
    assert!(info.contains("print device messages,false"));

    let trials = fs::read_to_string(format!("{}_trial-data.csv", prefix)).unwrap();
    let rows: Vec<&str> = trials.lines().collect();
    assert_eq!(rows.len(), 7);
    for (row, stimulus) in rows[1..].iter().zip(&stimuli) {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[1], stimulus.hand.name());
        assert_eq!(fields[2], stimulus.finger.name());
    }

    let accel = fs::read_to_string(format!("{}_accelerometer-data.csv", prefix)).unwrap();
    assert!(accel.lines().count() > 6);
    assert!(accel.starts_with("trialNumber,time,x,y,z\n"));
}

#[test]
fn correctness_counts_first_tap_only() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    handle.queue_cycle(TapScript::new(0, ["5,0,0,0"], ["index,300"]));
    handle.queue_cycle(TapScript::new(0, ["5,0,0,0"], ["thumb,250", "index,300"]));

    let hands = vec![HandConfig {
        hand: Hand::Right,
        port: "sim".to_string(),
        fingers: vec![2],
    }];
    let settings = ExperimentSettings {
        test_number: 0,
        ..ExperimentSettings::default()
    };
    let mut experiment = Experiment::new(settings, DeviceSettings::default(), hands.clone());
    experiment.attach(Hand::Right, DeviceSession::new("right", device, limits()));
    experiment.prepare().unwrap();

    let stimuli = build_stimuli(&hands, 2).unwrap();
    let mut correct = Vec::new();
    let summary = experiment
        .run(&stimuli, |outcome| correct.push(outcome.is_correct()))
        .unwrap();

    assert_eq!(correct, vec![true, false]);
    assert_eq!(summary.correct, 1);
    assert!((summary.accuracy() - 0.5).abs() < f64::EPSILON);
    assert_eq!(summary.saved_to, None);
}

#[test]
fn device_failure_halts_run() {
    let device = SimulatedDevice::new("right");
    let handle = device.handle();
    let hands = vec![HandConfig {
        hand: Hand::Right,
        port: "sim".to_string(),
        fingers: vec![5],
    }];
    let settings = ExperimentSettings {
        test_number: 0,
        ..ExperimentSettings::default()
    };
    let mut experiment = Experiment::new(settings, DeviceSettings::default(), hands.clone());
    experiment.attach(Hand::Right, DeviceSession::new("right", device, limits()));
    experiment.prepare().unwrap();

    handle.queue_cycle(TapScript::new(0, ["1,2,3,4"], ["pinky,10"]));
    handle.queue_cycle(TapScript::new(0, ["1,2,3,4"], ["pinkie,10"]));

    let stimuli = build_stimuli(&hands, 3).unwrap();
    let mut seen = 0;
    let err = experiment.run(&stimuli, |_| seen += 1).unwrap_err();

    assert_eq!(seen, 1);
    assert!(matches!(err, ExperimentError::Device { hand: Hand::Right, .. }));
    assert_eq!(experiment.status(), ExperimentStatus::Failed);
    assert_eq!(
        experiment.session(Hand::Right).map(|s| s.configuration().is_calibrated(Finger::Pinky)),
        Some(true)
    );
}
