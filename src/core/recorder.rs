//! Trial data recording
//!
//! One experiment run produces three CSV files sharing a
//! `<stamp>_<participant>` prefix: the run settings, the accelerometer
//! series of every trial, and one summary row per trial.

use crate::core::experiment::Stimulus;
use crate::core::tap::TapResult;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Timestamp format used in file names and the info file
pub const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const ACCEL_HEADER: &str = "trialNumber,time,x,y,z";
const TRIAL_HEADER: &str = "trialNumber,cued-hand,cued-finger,correct,\
tap-1-ms,tap-1-finger,tap-2-ms,tap-2-finger,tap-3-ms,tap-3-finger";

/// Format a run timestamp
pub fn format_stamp(at: &DateTime<Local>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

/// Writes trial data for one experiment run
pub struct TrialRecorder {
    prefix: PathBuf,
    accel: BufWriter<File>,
    trials: BufWriter<File>,
    trials_written: usize,
    samples_written: usize,
}

impl TrialRecorder {
    /// Create the data directory and the three files. `info` rows are
    /// written to the info file immediately.
    pub fn create(
        data_dir: &Path,
        stamp: &str,
        participant: &str,
        info: &[(String, String)],
    ) -> io::Result<Self> {
        fs::create_dir_all(data_dir)?;
        let prefix = data_dir.join(format!("{}_{}", stamp, participant));

        let mut info_file = BufWriter::new(File::create(with_suffix(&prefix, "_info.csv"))?);
        for (key, value) in info {
            writeln!(info_file, "{},{}", csv_field(key), csv_field(value))?;
        }
        info_file.flush()?;

        let mut accel = BufWriter::new(File::create(with_suffix(
            &prefix,
            "_accelerometer-data.csv",
        ))?);
        writeln!(accel, "{}", ACCEL_HEADER)?;

        let mut trials = BufWriter::new(File::create(with_suffix(&prefix, "_trial-data.csv"))?);
        writeln!(trials, "{}", TRIAL_HEADER)?;

        tracing::info!("Recording trials to {}*", prefix.display());

        Ok(Self {
            prefix,
            accel,
            trials,
            trials_written: 0,
            samples_written: 0,
        })
    }

    /// Shared path prefix of the three files
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Path of one of the files, e.g. `"_trial-data.csv"`
    pub fn path(&self, suffix: &str) -> PathBuf {
        with_suffix(&self.prefix, suffix)
    }

    /// Append one trial. `number` is 1-based.
    pub fn record(
        &mut self,
        number: usize,
        stimulus: &Stimulus,
        result: &TapResult,
    ) -> io::Result<()> {
        for sample in &result.samples {
            writeln!(
                self.accel,
                "{},{},{},{},{}",
                number, sample.time, sample.x, sample.y, sample.z
            )?;
        }
        self.samples_written += result.samples.len();

        let [first, second, third] = &result.first_taps;
        writeln!(
            self.trials,
            "{},{},{},{},{},{},{},{},{},{}",
            number,
            stimulus.hand,
            stimulus.finger,
            u8::from(result.is_correct()),
            first.time_label(),
            first.finger_label(),
            second.time_label(),
            second.finger_label(),
            third.time_label(),
            third.finger_label(),
        )?;
        self.trials_written += 1;

        // Flush every trial so an aborted run keeps what it measured.
        self.accel.flush()?;
        self.trials.flush()
    }

    /// (trials, samples) written so far
    pub fn stats(&self) -> (usize, usize) {
        (self.trials_written, self.samples_written)
    }

    /// Flush and close
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.accel.flush()?;
        self.trials.flush()?;
        Ok(self.prefix)
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
