//! Error types for fanlog-logging

use thiserror::Error;

/// Errors raised while configuring or installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    /// I/O error creating log directories or files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid level or filter directive
    #[error("Invalid filter: {0}")]
    Filter(String),

    /// Configuration file could not be parsed
    #[error("Invalid config: {0}")]
    Config(String),

    /// Subscriber or appender could not be installed
    #[error("Initialization failed: {0}")]
    Init(String),
}
