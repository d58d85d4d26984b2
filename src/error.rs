//! Custom error types for tickwatch.
//!
//! Configuration problems are the only errors that stop the process. Errors
//! raised by the status source or the action dispatcher are folded into the
//! watch cycle (an error cycle, or a logged dispatch failure) and never
//! escape the loop.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tickwatch operations
#[derive(Error, Debug)]
pub enum WatchdogError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Node address and port lists differ in length
    #[error("The number of node IPs ({addresses}) and node ports ({ports}) must be the same")]
    EndpointMismatch { addresses: usize, ports: usize },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Status query could not be completed
    #[error("Status query against {endpoint} failed: {message}")]
    StatusQuery { endpoint: String, message: String },

    /// Administrative action could not be completed
    #[error("Action '{action}' against {endpoint} failed: {message}")]
    Dispatch {
        action: String,
        endpoint: String,
        message: String,
    },

    /// External command exceeded its time budget
    #[error("Command '{command}' timed out after {seconds}s")]
    CommandTimeout { command: String, seconds: u64 },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML parse error wrapper
    #[error(transparent)]
    TomlParse(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchdogError {
    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid-field error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a status query error
    pub fn status_query(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StatusQuery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a dispatch error
    pub fn dispatch(
        action: impl Into<String>,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Dispatch {
            action: action.into(),
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a configuration problem (fatal at startup)
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidConfig { .. }
                | Self::EndpointMismatch { .. }
                | Self::TomlParse(_)
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        if self.is_config() {
            2
        } else {
            1
        }
    }
}

/// Type alias for tickwatch results
pub type Result<T> = std::result::Result<T, WatchdogError>;
