//! Session events delivered to the application.

use std::fmt;
use std::time::Duration;

use netconf_protocol::CapabilitySet;
use tokio::sync::mpsc;

use crate::registry::format_elapsed;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something that happened on a NETCONF session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetconfEvent {
    /// SSH user authentication banner
    SshBanner(String),
    /// SSH identification string of the server
    SshGreeting(String),
    /// Hello exchange completed
    Connected {
        /// Raw server `<hello>`
        hello_xml: String,
        /// Negotiated capability tags
        capabilities: CapabilitySet,
        /// Session id assigned by the server
        session_id: Option<u64>,
    },
    /// Session closed, locally or by the server
    Disconnected,
    /// Candidate datastore locked
    Locked,
    /// Candidate datastore unlocked
    Unlocked,
    /// `<ok/>` reply
    RpcOk {
        /// Message id of the request
        id: String,
        /// Round trip time
        elapsed: Duration,
    },
    /// Reply carrying data
    RpcResponse {
        /// Message id of the request
        id: String,
        /// Raw `<rpc-reply>`
        xml: String,
        /// Round trip time
        elapsed: Duration,
    },
    /// Reply carrying `<rpc-error>`
    RpcError {
        /// Message id of the request
        id: String,
        /// First `error-message` of the reply
        message: String,
        /// Raw `<rpc-reply>`
        xml: String,
        /// Round trip time
        elapsed: Duration,
    },
    /// No reply before the deadline
    RpcTimeout {
        /// Message id of the request
        id: String,
    },
    /// Protocol level problem
    NetconfError {
        /// Description
        message: String,
        /// Offending message, when there is one
        xml: Option<String>,
    },
    /// Server `<notification>`
    Notification {
        /// Raw notification
        xml: String,
    },
    /// First request became pending
    Busy,
    /// Last pending request resolved or expired
    Idle,
    /// Bytes arrived from the server
    Data {
        /// Bytes received since connect
        total_bytes: u64,
    },
    /// A YANG module was downloaded
    YangDefinition {
        /// Module name
        name: String,
        /// Module revision, when known
        revision: Option<String>,
        /// Module source
        yang: String,
        /// 1-based position of the module in the download queue.
        ///
        /// Modules that fail still use up their position, so the indices
        /// seen in these events may skip numbers.
        index: usize,
        /// Number of modules in the download
        total: usize,
    },
}

impl fmt::Display for NetconfEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SshBanner(banner) => write!(f, "ssh banner: {}", banner.trim_end()),
            Self::SshGreeting(greeting) => write!(f, "ssh greeting: {greeting}"),
            Self::Connected {
                capabilities,
                session_id,
                ..
            } => match session_id {
                Some(id) => write!(f, "connected, session-id {id} [{capabilities}]"),
                None => write!(f, "connected [{capabilities}]"),
            },
            Self::Disconnected => f.write_str("disconnected"),
            Self::Locked => f.write_str("candidate locked"),
            Self::Unlocked => f.write_str("candidate unlocked"),
            Self::RpcOk { id, elapsed } => {
                write!(f, "rpc {id}: ok ({})", format_elapsed(*elapsed))
            }
            Self::RpcResponse { id, xml, elapsed } => write!(
                f,
                "rpc {id}: {} bytes ({})",
                xml.len(),
                format_elapsed(*elapsed)
            ),
            Self::RpcError {
                id,
                message,
                elapsed,
                ..
            } => write!(f, "rpc {id}: error: {message} ({})", format_elapsed(*elapsed)),
            Self::RpcTimeout { id } => write!(f, "rpc {id}: timed out"),
            Self::NetconfError { message, .. } => write!(f, "netconf error: {message}"),
            Self::Notification { xml } => write!(f, "notification ({} bytes)", xml.len()),
            Self::Busy => f.write_str("busy"),
            Self::Idle => f.write_str("idle"),
            Self::Data { total_bytes } => write!(f, "{total_bytes} bytes received"),
            Self::YangDefinition {
                name,
                revision,
                index,
                total,
                ..
            } => match revision {
                Some(revision) => write!(f, "yang {index}/{total}: {name}@{revision}"),
                None => write!(f, "yang {index}/{total}: {name}"),
            },
        }
    }
}

/// Receiving half of the event stream
pub type EventReceiver = mpsc::Receiver<NetconfEvent>;

/// Sends [`NetconfEvent`]s to the application.
///
/// [`emit`](Self::emit) never blocks and is what the session task uses;
/// [`deliver`](Self::deliver) waits for room and never loses an event.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: mpsc::Sender<NetconfEvent>,
}

impl EventEmitter {
    /// Create an emitter and its receiver
    #[must_use]
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Emit an event, dropping it if the channel is full or closed.
    pub fn emit(&self, event: NetconfEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::trace!(error = %e, "Event dropped");
        }
    }

    /// Send an event, waiting while the channel is full.
    ///
    /// The event is only lost when the receiver is gone.
    pub async fn deliver(&self, event: NetconfEvent) {
        if self.sender.send(event).await.is_err() {
            tracing::trace!("Event receiver closed");
        }
    }

    /// Emit a `NetconfError` event
    pub fn emit_error(&self, message: impl Into<String>, xml: Option<String>) {
        self.emit(NetconfEvent::NetconfError {
            message: message.into(),
            xml,
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY).0
    }
}
