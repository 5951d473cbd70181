//! CLI-specific error types

use std::fmt;
use std::io;

use crate::queue::QueueError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Queue directory already initialized
    AlreadyInitialized,
    /// Queue directory not initialized
    NotInitialized,
    /// Queue operation failed
    QueueError,
    /// Queue state cannot be trusted; operator action required
    QueueHalted,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ACKQ_CLI_CONFIG_ERROR",
            Self::IoError => "ACKQ_CLI_IO_ERROR",
            Self::AlreadyInitialized => "ACKQ_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "ACKQ_CLI_NOT_INITIALIZED",
            Self::QueueError => "ACKQ_CLI_QUEUE_ERROR",
            Self::QueueHalted => "ACKQ_CLI_QUEUE_HALTED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Queue directory already initialized",
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Queue directory not initialized. Run 'ackqueue init' first.",
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueueError> for CliError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Config(msg) => Self::config_error(msg),
            e if e.is_fatal() => Self::new(CliErrorCode::QueueHalted, e.to_string()),
            e => Self::new(CliErrorCode::QueueError, e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
