//! Transport error types.

use std::time::Duration;

use netconf_protocol::{ErrorKind, NetconfError};
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Connection establishment timed out.
    #[error(
        "Connection timed out after {timeout:?} for operation: {operation}. \
         If this is expected, increase `connect_timeout` in the SSH configuration"
    )]
    ConnectionTimeout {
        /// The operation that timed out
        operation: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// Authentication with the remote endpoint failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server refused to start the `netconf` subsystem.
    #[error("Subsystem rejected: {0}")]
    SubsystemRejected(String),

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The transport has been closed.
    #[error("Transport closed")]
    Closed,

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(feature = "ssh")]
impl From<russh::Error> for TransportError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::Disconnect | russh::Error::HUP => Self::ConnectionLost(err.to_string()),
            russh::Error::NotAuthenticated => Self::AuthenticationFailed(err.to_string()),
            other => Self::ConnectionFailed(other.to_string()),
        }
    }
}

impl From<TransportError> for NetconfError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::AuthenticationFailed(_) => ErrorKind::Authentication,
            TransportError::ConfigurationError(_) => ErrorKind::Configuration,
            _ => ErrorKind::Transport,
        };
        NetconfError::new(kind, err.to_string())
    }
}
