//! Message routing for the session engine.
//!
//! The dispatcher validates each framed message and decides what it means in
//! the current session phase. It owns no I/O and never touches the request
//! registry; the engine acts on the returned [`Dispatch`].

use netconf_protocol::message::parse_message;
use netconf_protocol::{InboundMessage, NetconfError, ReplyOutcome, RpcReply, ServerHello};
use tracing::{debug, trace};

/// Where the session is in its life cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the server `<hello>`
    #[default]
    PreHello,
    /// Hello exchanged, replies and notifications flow
    Connected,
    /// Shutting down, everything is ignored
    Closed,
}

/// What to do with one inbound message
#[derive(Debug)]
pub enum Dispatch {
    /// Server `<hello>`
    Hello {
        /// Session id and capabilities
        hello: ServerHello,
        /// Raw message
        xml: String,
    },
    /// `<rpc-reply>` for `message_id`
    Reply {
        /// Correlation id
        message_id: String,
        /// Classification of the reply
        outcome: ReplyOutcome,
        /// Raw message
        xml: String,
    },
    /// Server `<notification>`
    Notification {
        /// Raw message
        xml: String,
    },
    /// Unusable message; report and drop, the session carries on
    Malformed(NetconfError),
    /// Protocol violation; the session must close
    Fatal(NetconfError),
    /// Received while closing
    Ignored,
}

/// Phase-aware inbound message router
#[derive(Debug, Default)]
pub struct MessageDispatcher {
    phase: Phase,
}

impl MessageDispatcher {
    /// Dispatcher waiting for the server `<hello>`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Hello exchange finished
    pub fn mark_connected(&mut self) {
        if self.phase == Phase::PreHello {
            self.phase = Phase::Connected;
        }
    }

    /// Stop routing
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    /// Route one framed message
    pub fn dispatch(&mut self, frame: &[u8]) -> Dispatch {
        if self.phase == Phase::Closed {
            trace!(bytes = frame.len(), "Session closing, message ignored");
            return Dispatch::Ignored;
        }

        let xml = match std::str::from_utf8(frame) {
            Ok(xml) => xml.trim(),
            Err(e) => {
                return Dispatch::Malformed(NetconfError::malformed(format!(
                    "malformed response: not valid UTF-8 ({e})"
                )));
            }
        };
        let message = match parse_message(xml) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Malformed response dropped");
                return Dispatch::Malformed(e);
            }
        };

        match (self.phase, message) {
            (Phase::PreHello, InboundMessage::Hello(hello)) => Dispatch::Hello {
                hello,
                xml: xml.to_string(),
            },
            (Phase::PreHello, other) => Dispatch::Fatal(
                NetconfError::protocol(format!(
                    "expected <hello>, received <{}>",
                    root_name(&other)
                ))
                .with_xml(xml),
            ),
            (_, InboundMessage::Hello(_)) => Dispatch::Fatal(
                NetconfError::protocol("unexpected <hello> on an established session")
                    .with_xml(xml),
            ),
            (
                _,
                InboundMessage::RpcReply(RpcReply {
                    message_id: Some(message_id),
                    outcome,
                }),
            ) => Dispatch::Reply {
                message_id,
                outcome,
                xml: xml.to_string(),
            },
            (_, InboundMessage::RpcReply(RpcReply { message_id: None, .. })) => Dispatch::Fatal(
                NetconfError::protocol("<rpc-reply> without message-id").with_xml(xml),
            ),
            (_, InboundMessage::Notification) => Dispatch::Notification {
                xml: xml.to_string(),
            },
            (_, InboundMessage::Unknown { root }) => Dispatch::Malformed(
                NetconfError::malformed(format!("unexpected <{root}> message")).with_xml(xml),
            ),
        }
    }
}

fn root_name(message: &InboundMessage) -> &str {
    match message {
        InboundMessage::Hello(_) => "hello",
        InboundMessage::RpcReply(_) => "rpc-reply",
        InboundMessage::Notification => "notification",
        InboundMessage::Unknown { root } => root,
    }
}
