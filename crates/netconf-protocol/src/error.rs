//! Unified NETCONF error handling.
//!
//! A single error type [`NetconfError`] is used across the protocol, client
//! and CLI crates. Its [`ErrorKind`] follows the failure taxonomy of the
//! client: anything that breaks trust in the byte stream or XML structure is
//! fatal to the session ([`ErrorKind::is_fatal`]); anything scoped to one
//! request resolves only that request.
//!
//! ## Example
//!
//! ```rust
//! use netconf_protocol::{ErrorKind, NetconfError, NetconfResult};
//!
//! fn check(id: Option<&str>) -> NetconfResult<&str> {
//!     id.ok_or_else(|| NetconfError::protocol("rpc-reply without message-id"))
//! }
//!
//! let err = check(None).unwrap_err();
//! assert_eq!(err.kind, ErrorKind::Protocol);
//! assert!(err.kind.is_fatal());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result type alias for NETCONF operations
pub type NetconfResult<T> = Result<T, NetconfError>;

/// Unified NETCONF error type
///
/// The `context` field is boxed to keep the error small for
/// `Result<T, NetconfError>` usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetconfError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<ErrorContext>>,
}

/// Additional error context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation being performed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// message-id of the request involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Raw XML that triggered the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml: Option<String>,
}

/// Error classification for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// SSH-level failure
    Transport,
    /// SSH authentication failed
    Authentication,
    /// Chunk sequence could not be decoded; byte alignment lost
    Framing,
    /// Unexpected message type or ordering, missing message-id
    Protocol,
    /// No common base protocol version with the server
    IncompatibleCapabilities,
    /// Inbound message is not well-formed XML
    MalformedMessage,
    /// Caller-supplied request is not well-formed XML
    InvalidRequest,
    /// Server answered with `<rpc-error>`
    Rpc,
    /// No reply within the request timeout
    Timeout,
    /// message-id already pending
    DuplicateMessageId,
    /// `connect()` while a session is active
    AlreadyConnected,
    /// Operation requires an active session
    NotConnected,
    /// A schema could not be discovered or retrieved
    Schema,
    /// Local file system failure
    Io,
    /// Invalid configuration
    Configuration,
}

impl ErrorKind {
    /// Whether an error of this kind ends the session.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::Transport
                | Self::Authentication
                | Self::Framing
                | Self::Protocol
                | Self::IncompatibleCapabilities
        )
    }

    /// Short description of the kind
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Transport => "transport error",
            Self::Authentication => "authentication failed",
            Self::Framing => "framing error",
            Self::Protocol => "protocol error",
            Self::IncompatibleCapabilities => "incompatible capabilities",
            Self::MalformedMessage => "malformed response",
            Self::InvalidRequest => "invalid request",
            Self::Rpc => "rpc error",
            Self::Timeout => "timeout",
            Self::DuplicateMessageId => "duplicate message-id",
            Self::AlreadyConnected => "already connected",
            Self::NotConnected => "not connected",
            Self::Schema => "schema error",
            Self::Io => "io error",
            Self::Configuration => "configuration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for NetconfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(id) = self.context.as_ref().and_then(|c| c.message_id.as_deref()) {
            write!(f, " (message-id {id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for NetconfError {}

impl NetconfError {
    /// Create a new error with kind and message
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create an authentication error
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a framing error
    #[must_use]
    pub fn framing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Framing, message)
    }

    /// Create a protocol error
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Create an incompatible-capabilities error
    #[must_use]
    pub fn incompatible_capabilities(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompatibleCapabilities, message)
    }

    /// Create a malformed-response error
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedMessage, message)
    }

    /// Create an invalid-request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Create an rpc-error error
    #[must_use]
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rpc, message)
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a duplicate message-id error
    #[must_use]
    pub fn duplicate_message_id(message_id: impl Into<String>) -> Self {
        let message_id = message_id.into();
        Self::new(
            ErrorKind::DuplicateMessageId,
            format!("message-id {message_id} is already pending"),
        )
        .with_message_id(message_id)
    }

    /// Create an already-connected error
    #[must_use]
    pub fn already_connected() -> Self {
        Self::new(ErrorKind::AlreadyConnected, "a NETCONF session is already active")
    }

    /// Create a not-connected error
    #[must_use]
    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected, "no active NETCONF session")
    }

    /// Create a schema error
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    /// Create an I/O error
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        self.context.get_or_insert_with(Box::default)
    }

    /// Attach the operation being performed
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Attach the message-id of the request involved
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.context_mut().message_id = Some(message_id.into());
        self
    }

    /// Attach the XML that triggered the error
    #[must_use]
    pub fn with_xml(mut self, xml: impl Into<String>) -> Self {
        self.context_mut().xml = Some(xml.into());
        self
    }

    /// The XML attached to this error, if any
    #[must_use]
    pub fn xml(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.xml.as_deref())
    }
}

impl From<netconf_wire::CodecError> for NetconfError {
    fn from(err: netconf_wire::CodecError) -> Self {
        if err.is_framing_error() {
            Self::framing(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for NetconfError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}
