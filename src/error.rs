//! Error types for checkup runs and lifecycle notifications.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for checkup operations
#[derive(Error, Debug)]
pub enum CheckupError {
    /// Config file missing or unreadable
    #[error("failed to read config file {0:?}: {1}")]
    ConfigRead(PathBuf, String),

    /// Config is not valid JSON once comments and trailing commas are stripped
    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    /// The config has no enabled MCP servers
    #[error("no MCP servers found in configuration")]
    NoServicesConfigured,

    /// The `server` filter matched no configured service
    #[error("server '{0}' not found in configuration")]
    UnknownService(String),

    /// Invalid launch configuration for a named service
    #[error("invalid config for server '{0}': {1}")]
    InvalidConfig(String, String),

    /// Could not spawn or reach a server
    #[error("transport error for server '{0}': {1}")]
    Transport(String, String),

    /// MCP handshake with a server failed or timed out
    #[error("initialization failed for server '{0}': {1}")]
    InitializationFailed(String, String),

    /// Report could not be written
    #[error("failed to write report {0:?}: {1}")]
    ReportWrite(PathBuf, String),

    /// Desktop notification could not be delivered
    #[error("notification failed: {0}")]
    Notification(String),
}

/// Result type alias for checkup operations
pub type Result<T> = std::result::Result<T, CheckupError>;
