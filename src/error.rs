//! Unified error types for svcwrap

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a persisted service record
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No record exists for the service
    #[error("No configuration found for service '{service_id}'")]
    NotFound { service_id: String },

    /// The store exists but cannot be opened for reading
    #[error("Access denied reading configuration for service '{service_id}'")]
    AccessDenied { service_id: String },

    /// The record is present but unusable
    #[error("Malformed configuration for service '{service_id}': {reason}")]
    Malformed { service_id: String, reason: String },

    /// Any other failure talking to the backing store
    #[error("Failed to read configuration at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn malformed(service_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            service_id: service_id.into(),
            reason: reason.into(),
        }
    }
}

/// Main error type for svcwrap operations
#[derive(Error, Debug)]
pub enum WrapperError {
    /// Missing, unreadable or malformed service record
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The target executable could not be spawned
    #[error("Failed to launch '{}': {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Broken interaction with the service control channel
    #[error("Service control protocol error: {0}")]
    ControlProtocol(String),

    /// Log file access failed (only surfaced by log queries)
    #[error("Log I/O error at '{}': {source}", path.display())]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No log file has been written for the service yet
    #[error("No log files found for service '{0}'")]
    NoLogs(String),

    /// Wrapper settings file could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),
}

/// Result type alias for svcwrap operations
pub type Result<T> = std::result::Result<T, WrapperError>;

impl WrapperError {
    /// Service-specific exit code reported to the SCM when startup fails
    pub fn exit_code(&self) -> u32 {
        match self {
            WrapperError::Config(_) => 1,
            WrapperError::Launch { .. } => 2,
            WrapperError::ControlProtocol(_) => 3,
            _ => 4,
        }
    }

    /// Check if this error is fatal to service startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WrapperError::Config(_)
                | WrapperError::Launch { .. }
                | WrapperError::ControlProtocol(_)
        )
    }
}
