//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::config::ConfigError;
use crate::core::device::DeviceError;
use crate::core::experiment::ExperimentError;
use crate::core::protocol::ProtocolError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Device did not answer in time
    pub const TIMEOUT: u8 = 4;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 6;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Protocol error
    pub const PROTOCOL_ERROR: u8 = 9;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Success without a message
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Run stopped by the user
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CANCELLED, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

fn transport_code(err: &TransportError) -> u8 {
    match err {
        TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
        TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
        TransportError::ConnectionFailed(_) | TransportError::Disconnected => {
            ExitCodes::CONNECTION_FAILED
        }
        TransportError::IoError(_) => ExitCodes::CONNECTION_FAILED,
    }
}

impl From<&DeviceError> for CliResult {
    fn from(err: &DeviceError) -> Self {
        let code = match err {
            DeviceError::Protocol(ProtocolError::Link(e)) => transport_code(e),
            DeviceError::Protocol(ProtocolError::Timeout { .. }) => ExitCodes::TIMEOUT,
            DeviceError::Frame(_) => ExitCodes::PROTOCOL_ERROR,
            DeviceError::InvalidFinger(_) => ExitCodes::INVALID_ARGS,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<&ExperimentError> for CliResult {
    fn from(err: &ExperimentError) -> Self {
        let code = match err {
            ExperimentError::Device { source, .. } => return CliResult::from(source).with_context(err),
            ExperimentError::NoAnswer(_) => ExitCodes::TIMEOUT,
            ExperimentError::NoHands
            | ExperimentError::UnknownHand(_)
            | ExperimentError::MissingDevice(_) => ExitCodes::CONFIG_ERROR,
            ExperimentError::Record(e) => io_code(e),
        };
        Self::Error(code, err.to_string())
    }
}

impl From<&ConfigError> for CliResult {
    fn from(err: &ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

fn io_code(err: &std::io::Error) -> u8 {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => ExitCodes::FILE_NOT_FOUND,
        ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
        ErrorKind::ConnectionRefused => ExitCodes::CONNECTION_FAILED,
        ErrorKind::TimedOut => ExitCodes::TIMEOUT,
        _ => ExitCodes::ERROR,
    }
}

impl CliResult {
    fn with_context(self, err: &ExperimentError) -> Self {
        match self {
            Self::Error(code, _) => Self::Error(code, err.to_string()),
            other => other,
        }
    }

    /// Map an error chain from the binary, looking for the most specific
    /// library error it contains
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<ExperimentError>() {
                return Self::from(e);
            }
            if let Some(e) = cause.downcast_ref::<DeviceError>() {
                return Self::from(e);
            }
            if let Some(e) = cause.downcast_ref::<ConfigError>() {
                return Self::from(e);
            }
            if let Some(e) = cause.downcast_ref::<TransportError>() {
                return Self::Error(transport_code(e), err.to_string());
            }
            if let Some(e) = cause.downcast_ref::<std::io::Error>() {
                return Self::Error(io_code(e), err.to_string());
            }
        }
        Self::Error(ExitCodes::ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Device timeout",
        6 => "File not found",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Protocol error",
        11 => "Operation cancelled",
        14 => "Port not found",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 6, 7, 8, 9, 11, 14] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tap::FrameError;
    use std::time::Duration;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_unwritable_data_dir() {
        let err = ExperimentError::Record(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "TAP-data",
        ));
        assert_eq!(CliResult::from(&err).code(), ExitCodes::PERMISSION_DENIED);
    }

    #[test]
    fn test_from_anyhow_finds_io_error() {
        let err = anyhow::Error::new(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
            .context("reading stimuli");
        assert_eq!(CliResult::from_anyhow(&err).code(), ExitCodes::FILE_NOT_FOUND);
    }

    #[test]
    fn test_every_listed_code_is_described() {
        for code in [0, 1, 2, 3, 4, 6, 7, 8, 9, 11, 14] {
            assert_ne!(exit_code_description(code), "Unknown error");
        }
        assert_eq!(exit_code_description(127), "Unknown error");
    }

    #[test]
    fn test_device_error_codes() {
        let timeout = DeviceError::Protocol(ProtocolError::Timeout {
            stage: "ack".to_string(),
            attempts: 3,
            elapsed: Duration::from_millis(30),
        });
        assert_eq!(CliResult::from(&timeout).code(), ExitCodes::TIMEOUT);

        let link = DeviceError::from(TransportError::PortNotFound("COM9".to_string()));
        assert_eq!(CliResult::from(&link).code(), ExitCodes::PORT_NOT_FOUND);

        let frame = DeviceError::Frame(FrameError::StartTime {
            line: "soon".to_string(),
        });
        assert_eq!(CliResult::from(&frame).code(), ExitCodes::PROTOCOL_ERROR);
        assert_eq!(CliResult::from(&DeviceError::InvalidFinger(9)).code(), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_from_anyhow_finds_device_error() {
        let err = anyhow::Error::new(DeviceError::InvalidFinger(0)).context("tap failed");
        assert_eq!(CliResult::from_anyhow(&err).code(), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_experiment_error_keeps_hand() {
        let err = crate::core::experiment::ExperimentError::Device {
            hand: crate::core::experiment::Hand::Left,
            source: DeviceError::InvalidFinger(7),
        };
        let result = CliResult::from(&err);
        assert_eq!(result.code(), ExitCodes::INVALID_ARGS);
        assert!(result.message().unwrap_or_default().starts_with("left device"));
    }
}
