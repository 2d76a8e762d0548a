//! Error types for logwrap

use thiserror::Error;

/// Main error type for logger configuration and sink setup
#[derive(Error, Debug)]
pub enum LogWrapError {
    /// A logger with this name is already registered with different settings
    #[error("Logger '{0}' is already registered with a different configuration")]
    ConfigConflict(String),

    /// Formatter template could not be parsed
    #[error("Invalid format template: {0}")]
    InvalidFormat(String),

    /// Severity name not recognised
    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    /// An instance logger was requested without an instance name
    #[error("Instance name is required for logger '{0}'")]
    MissingInstanceName(String),

    /// Configuration document could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Sink could not be prepared (connection, client setup)
    #[error("Sink error: {0}")]
    Sink(String),

    /// General I/O error (directory creation, file open)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using LogWrapError
pub type LogWrapResult<T> = Result<T, LogWrapError>;
