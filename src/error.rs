//! Error types for cortex-lens.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for cortex-lens operations.
#[derive(Error, Debug)]
pub enum LensError {
    /// Warehouse connection errors (account unreachable, auth rejected, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors reported by the warehouse (syntax errors,
    /// missing privileges, malformed payloads, timeouts).
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LensError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Execution(_) => "Execution Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m) | Self::Execution(m) | Self::Config(m) | Self::Internal(m) => m,
        }
    }
}

/// Result type alias using LensError.
pub type Result<T> = std::result::Result<T, LensError>;
