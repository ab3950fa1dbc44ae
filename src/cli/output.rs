//! Output formatting for tap results and trial feedback

use crate::core::experiment::TrialOutcome;
use crate::core::finger::Finger;
use crate::core::tap::{TapResult, TapSlot};

/// Output format for tap results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Full result as JSON
    Json,
    /// One header row and one data row
    Csv,
}

/// Format one tap result
pub fn format_tap_result(result: &TapResult, format: OutputFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Text => text_format(result),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Csv => csv_format(result),
    })
}

fn text_format(result: &TapResult) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "Cued {} at {}",
        result.cued,
        result.completed_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push(format!(
        "{} ({} samples)",
        if result.is_correct() { "CORRECT" } else { "INCORRECT" },
        result.samples.len()
    ));
    for (i, slot) in result.first_taps.iter().enumerate() {
        out.push(format!("  tap {}: {}", i + 1, slot));
    }
    for finger in Finger::ALL {
        let times: Vec<String> = result.taps_for(finger).iter().map(f64::to_string).collect();
        out.push(format!("  {:<6} [{}]", finger.name(), times.join(", ")));
    }
    out.join("\n")
}

fn csv_format(result: &TapResult) -> String {
    let mut header = vec!["cued-finger".to_string(), "correct".to_string()];
    let mut row = vec![
        result.cued.to_string(),
        u8::from(result.is_correct()).to_string(),
    ];
    for (i, slot) in result.first_taps.iter().enumerate() {
        header.push(format!("tap-{}-ms", i + 1));
        header.push(format!("tap-{}-finger", i + 1));
        row.push(slot.time_label());
        row.push(slot.finger_label().to_string());
    }
    format!("{}\n{}", header.join(","), row.join(","))
}

/// Feedback lines shown to the experimenter after a trial
pub fn feedback_lines(outcome: &TrialOutcome) -> Vec<String> {
    let first = outcome.result.first_tap();
    let mut lines = vec![if outcome.is_correct() {
        "CORRECT".to_string()
    } else {
        "INCORRECT".to_string()
    }];

    match first {
        TapSlot::Tap(tap) => {
            lines.push(format!("Participant tapped {} finger.", tap.finger));
            lines.push(format!("Reaction time {:.0} ms", tap.time * 1000.0));
        }
        TapSlot::NoData => lines.push("No tap detected.".to_string()),
    }
    lines
}

/// Progress line after a trial
pub fn progress_line(outcome: &TrialOutcome) -> String {
    format!("{} of {} trials complete", outcome.number, outcome.total)
}
