//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Tap result and feedback formatting

pub mod exit_codes;
pub mod output;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use output::{feedback_lines, format_tap_result, progress_line, OutputFormat};
