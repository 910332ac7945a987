//! Error types for CLI operations

use std::fmt;

use netconf_client::{ErrorKind, NetconfError};
use thiserror::Error;

/// CLI-specific errors with rich context
#[derive(Error, Debug)]
pub enum CliError {
    /// Error raised by the NETCONF client
    #[error("{0}")]
    Netconf(#[from] NetconfError),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// JSON output could not be produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get user-friendly suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Netconf(e) => match e.kind {
                ErrorKind::Transport => vec![
                    "Check that the server is reachable on the NETCONF port (830 by default)",
                    "Verify --host and --port",
                ],
                ErrorKind::Authentication => vec![
                    "Check --user and the password or key",
                    "Pass --key for public key authentication",
                ],
                ErrorKind::IncompatibleCapabilities => {
                    vec!["The server advertises neither base:1.0 nor base:1.1"]
                }
                ErrorKind::Timeout => vec![
                    "Increase the reply timeout with --timeout",
                    "Check server responsiveness",
                ],
                ErrorKind::InvalidRequest => vec!["The request must be well-formed XML"],
                ErrorKind::Schema => vec![
                    "The server must support ietf-yang-library or ietf-netconf-monitoring",
                ],
                _ => vec![],
            },
            Self::InvalidArguments(_) => vec!["Use --help to see expected format"],
            Self::Config(_) => vec!["Check the profile file passed with --config"],
            _ => vec![],
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Netconf(e) => match e.kind {
                ErrorKind::Transport | ErrorKind::Authentication | ErrorKind::NotConnected => {
                    ErrorCategory::Connection
                }
                ErrorKind::Rpc | ErrorKind::Schema => ErrorCategory::Server,
                ErrorKind::Timeout => ErrorCategory::Timeout,
                ErrorKind::InvalidRequest => ErrorCategory::User,
                ErrorKind::Io => ErrorCategory::System,
                ErrorKind::Configuration => ErrorCategory::Config,
                _ => ErrorCategory::Protocol,
            },
            Self::InvalidArguments(_) => ErrorCategory::User,
            Self::Io(_) => ErrorCategory::System,
            Self::Config(_) => ErrorCategory::Config,
            Self::Json(_) | Self::Other(_) => ErrorCategory::Other,
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// SSH connection or authentication
    Connection,
    /// Bad input from the user
    User,
    /// Server refused the request
    Server,
    /// No reply in time
    Timeout,
    /// Framing or message level violation
    Protocol,
    /// Local system failure
    System,
    /// Invalid profile or settings
    Config,
    /// Anything else
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "Connection"),
            Self::User => write!(f, "User Input"),
            Self::Server => write!(f, "Server"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Protocol => write!(f, "Protocol"),
            Self::System => write!(f, "System"),
            Self::Config => write!(f, "Configuration"),
            Self::Other => write!(f, "Error"),
        }
    }
}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for CliError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
