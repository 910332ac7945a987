//! The session engine and the task that drives it.
//!
//! [`ProtocolCore`] holds every piece of protocol state and performs no I/O:
//! it consumes transport events, commands and the clock, and produces frames
//! to write and events to emit. [`spawn_session`] starts the one task that
//! owns both the transport and the core, so protocol state is never shared
//! and needs no locks. Client handles reach the task over a command channel
//! and read a published [`Snapshot`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use netconf_protocol::capabilities::{client_hello, negotiate_framing};
use netconf_protocol::{
    CapabilitySet, NetconfError, NetconfResult, ReplyOutcome, ServerHello, prepare_request,
};
use netconf_transport::{Transport, TransportEvent};
use netconf_wire::{FramingMode, NetconfCodec, encode_frame};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::Decoder;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::ClientConfig;
use crate::dispatcher::{Dispatch, MessageDispatcher};
use crate::events::{EventEmitter, NetconfEvent};
use crate::registry::{Completion, RequestRegistry, RpcResponse, format_elapsed};

/// First message id allocated for requests that carry none
pub const LOCAL_MESSAGE_ID_SEED: u64 = 1_000_000;

/// Capacity of the command channel between handles and the session task
const COMMAND_CAPACITY: usize = 64;

/// Connection state of a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No session
    #[default]
    Disconnected,
    /// SSH connection and subsystem being set up
    Connecting,
    /// Server `<hello>` accepted, client `<hello>` being sent
    HelloExchanged,
    /// Requests may be issued
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::HelloExchanged => "hello-exchanged",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Result of a successful hello exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// Session id assigned by the server
    pub session_id: Option<u64>,
    /// Capabilities recognised in the server `<hello>`
    pub capabilities: CapabilitySet,
    /// Framing used after the hello
    #[serde(serialize_with = "serialize_display")]
    pub framing: FramingMode,
}

fn serialize_display<S: serde::Serializer>(
    value: &FramingMode,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Session state visible to client handles
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) state: SessionState,
    pub(crate) session_id: Option<u64>,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) framing: FramingMode,
}

pub(crate) type SharedSnapshot = Arc<Mutex<Snapshot>>;

/// Requests from client handles to the session task
#[derive(Debug)]
pub(crate) enum Command {
    Rpc {
        request: String,
        timeout: Duration,
        completion: Completion,
        accepted: oneshot::Sender<NetconfResult<String>>,
    },
    Disconnect,
}

/// Sans-IO NETCONF session state machine
#[derive(Debug)]
pub(crate) struct ProtocolCore {
    codec: NetconfCodec,
    buffer: BytesMut,
    dispatcher: MessageDispatcher,
    registry: RequestRegistry,
    events: EventEmitter,
    state: SessionState,
    session_id: Option<u64>,
    capabilities: CapabilitySet,
    client_capabilities: Vec<String>,
    next_id: u64,
    total_bytes: u64,
    outbox: Vec<Bytes>,
    established: Option<SessionInfo>,
    failure: Option<NetconfError>,
    closing: bool,
}

impl ProtocolCore {
    pub(crate) fn new(config: &ClientConfig, events: EventEmitter) -> Self {
        Self {
            codec: NetconfCodec::new().with_max_message_size(config.max_message_size),
            buffer: BytesMut::with_capacity(8 * 1024),
            dispatcher: MessageDispatcher::new(),
            registry: RequestRegistry::new(),
            events,
            state: SessionState::Connecting,
            session_id: None,
            capabilities: CapabilitySet::new(),
            client_capabilities: config.client_capabilities.clone(),
            next_id: LOCAL_MESSAGE_ID_SEED,
            total_bytes: 0,
            outbox: Vec::new(),
            established: None,
            failure: None,
            closing: false,
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            session_id: self.session_id,
            capabilities: self.capabilities.clone(),
            framing: self.codec.mode(),
        }
    }

    /// Frames to write, in order
    pub(crate) fn take_outbound(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outbox)
    }

    /// Hello exchange result, once
    pub(crate) fn take_established(&mut self) -> Option<SessionInfo> {
        self.established.take()
    }

    pub(crate) fn take_failure(&mut self) -> Option<NetconfError> {
        self.failure.take()
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.registry.next_deadline()
    }

    pub(crate) fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Banner(banner) => self.events.emit(NetconfEvent::SshBanner(banner)),
            TransportEvent::Greeting(greeting) => {
                self.events.emit(NetconfEvent::SshGreeting(greeting));
            }
            TransportEvent::Data(data) => self.handle_data(&data, now),
        }
    }

    fn handle_data(&mut self, data: &[u8], now: Instant) {
        if self.closing {
            return;
        }
        self.total_bytes += data.len() as u64;
        self.events.emit(NetconfEvent::Data {
            total_bytes: self.total_bytes,
        });
        self.buffer.extend_from_slice(data);

        // One frame at a time: the hello switches framing for what follows.
        while !self.closing {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(frame)) => self.handle_frame(&frame, now),
                Ok(None) => break,
                Err(e) => {
                    self.fail(NetconfError::from(e));
                    break;
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: &[u8], now: Instant) {
        match self.dispatcher.dispatch(frame) {
            Dispatch::Hello { hello, xml } => self.handle_hello(hello, xml),
            Dispatch::Reply {
                message_id,
                outcome,
                xml,
            } => self.handle_reply(message_id, outcome, xml, now),
            Dispatch::Notification { xml } => {
                debug!(bytes = xml.len(), "Notification received");
                self.events.emit(NetconfEvent::Notification { xml });
            }
            Dispatch::Malformed(error) => {
                warn!(error = %error, "Dropping malformed message");
                self.events
                    .emit_error(error.message.clone(), error.xml().map(str::to_string));
            }
            Dispatch::Fatal(error) => self.fail(error),
            Dispatch::Ignored => {}
        }
    }

    fn handle_hello(&mut self, hello: ServerHello, xml: String) {
        let server = CapabilitySet::from_uris(&hello.capabilities);
        let client = CapabilitySet::from_uris(&self.client_capabilities);
        let framing = match negotiate_framing(&client, &server) {
            Ok(framing) => framing,
            Err(error) => {
                self.fail(error.with_xml(xml));
                return;
            }
        };

        self.session_id = hello.session_id;
        self.capabilities = server;
        self.state = SessionState::HelloExchanged;
        info!(
            session_id = ?hello.session_id,
            %framing,
            capabilities = %self.capabilities,
            "Server hello accepted"
        );

        // The client hello always travels in end-of-message framing.
        self.outbox.push(encode_frame(
            FramingMode::EndOfMessage,
            &client_hello(&self.client_capabilities),
        ));
        self.codec.set_mode(framing);
        self.dispatcher.mark_connected();
        self.next_id = LOCAL_MESSAGE_ID_SEED;
        self.state = SessionState::Connected;

        self.established = Some(SessionInfo {
            session_id: self.session_id,
            capabilities: self.capabilities.clone(),
            framing,
        });
        self.events.emit(NetconfEvent::Connected {
            hello_xml: xml,
            capabilities: self.capabilities.clone(),
            session_id: self.session_id,
        });
    }

    fn handle_reply(&mut self, message_id: String, outcome: ReplyOutcome, xml: String, now: Instant) {
        let Some(resolved) = self.registry.resolve(&message_id, now) else {
            debug!(%message_id, "Reply for unknown message-id ignored");
            return;
        };
        let elapsed = resolved.elapsed;
        debug!(%message_id, elapsed = %format_elapsed(elapsed), "Reply received");

        let event = match &outcome {
            ReplyOutcome::Ok => NetconfEvent::RpcOk {
                id: message_id.clone(),
                elapsed,
            },
            ReplyOutcome::Data => NetconfEvent::RpcResponse {
                id: message_id.clone(),
                xml: xml.clone(),
                elapsed,
            },
            ReplyOutcome::Error { message } => NetconfEvent::RpcError {
                id: message_id.clone(),
                message: message.clone(),
                xml: xml.clone(),
                elapsed,
            },
        };
        self.events.emit(event);
        resolved.completion.complete(RpcResponse {
            message_id,
            outcome,
            xml,
            elapsed,
        });
        if resolved.idle {
            self.events.emit(NetconfEvent::Idle);
        }
    }

    /// Queue a request. Returns its message id.
    pub(crate) fn submit(
        &mut self,
        request: &str,
        timeout: Duration,
        completion: Completion,
        now: Instant,
    ) -> NetconfResult<String> {
        if self.state != SessionState::Connected || self.closing {
            return Err(NetconfError::not_connected());
        }
        let next_id = &mut self.next_id;
        let prepared = prepare_request(request, || {
            let id = *next_id;
            *next_id += 1;
            id.to_string()
        })?;

        if self
            .registry
            .register(prepared.message_id.clone(), completion, timeout, now)?
        {
            self.events.emit(NetconfEvent::Busy);
        }
        debug!(message_id = %prepared.message_id, bytes = prepared.xml.len(), "Request queued");
        self.outbox.push(self.codec.encode_message(&prepared.xml));
        Ok(prepared.message_id)
    }

    pub(crate) fn expire(&mut self, now: Instant) {
        let expired = self.registry.expire(now);
        for id in expired.ids {
            warn!(message_id = %id, "Request timed out");
            self.events.emit(NetconfEvent::RpcTimeout { id });
        }
        if expired.idle {
            self.events.emit(NetconfEvent::Idle);
        }
    }

    /// Report a fatal error and stop processing input. Only the first
    /// failure is kept.
    pub(crate) fn fail(&mut self, error: NetconfError) {
        if self.closing {
            debug!(error = %error, "Error while closing ignored");
            return;
        }
        warn!(error = %error, "Closing session");
        self.events
            .emit_error(error.message.clone(), error.xml().map(str::to_string));
        self.failure = Some(error);
        self.request_close();
    }

    pub(crate) fn request_close(&mut self) {
        self.closing = true;
        self.outbox.clear();
        self.dispatcher.close();
    }

    /// Reset after the transport is gone
    pub(crate) fn finish(&mut self) {
        let dropped = self.registry.clear();
        if dropped > 0 {
            debug!(dropped, "Pending requests dropped");
        }
        self.request_close();
        self.codec.reset();
        self.buffer.clear();
        self.capabilities.clear();
        self.session_id = None;
        self.state = SessionState::Disconnected;
        info!(total_bytes = self.total_bytes, "Session closed");
    }

    pub(crate) fn announce_closed(&self) {
        self.events.emit(NetconfEvent::Disconnected);
    }
}

/// Handle to a running session task
#[derive(Debug)]
pub(crate) struct SessionHandle {
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) task: JoinHandle<()>,
}

/// Start the task owning `transport` and `core`.
///
/// `established` receives the hello result, or the reason the session ended
/// before it.
pub(crate) fn spawn_session(
    transport: Box<dyn Transport>,
    core: ProtocolCore,
    snapshot: SharedSnapshot,
    established: oneshot::Sender<NetconfResult<SessionInfo>>,
) -> SessionHandle {
    let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
    let endpoint = transport.endpoint().unwrap_or_default();
    let span = info_span!("netconf_session", %endpoint);
    let task = tokio::spawn(
        run_session(transport, core, receiver, snapshot, established).instrument(span),
    );
    SessionHandle { commands, task }
}

async fn run_session(
    mut transport: Box<dyn Transport>,
    mut core: ProtocolCore,
    mut commands: mpsc::Receiver<Command>,
    snapshot: SharedSnapshot,
    established: oneshot::Sender<NetconfResult<SessionInfo>>,
) {
    let mut established = Some(established);
    loop {
        for frame in core.take_outbound() {
            if let Err(e) = transport.send(frame).await {
                core.fail(NetconfError::from(e).with_operation("send"));
                break;
            }
        }
        *snapshot.lock() = core.snapshot();
        if let Some(info) = core.take_established()
            && let Some(sender) = established.take()
        {
            let _ = sender.send(Ok(info));
        }
        if core.is_closing() {
            break;
        }

        let deadline = core.next_deadline();
        tokio::select! {
            event = transport.receive() => match event {
                Ok(Some(event)) => core.handle_transport_event(event, Instant::now()),
                Ok(None) => {
                    info!("Server closed the session");
                    break;
                }
                Err(e) => core.fail(NetconfError::from(e).with_operation("receive")),
            },
            command = commands.recv() => match command {
                Some(Command::Rpc { request, timeout, completion, accepted }) => {
                    let result = core.submit(&request, timeout, completion, Instant::now());
                    let _ = accepted.send(result);
                }
                Some(Command::Disconnect) => {
                    info!("Disconnect requested");
                    core.request_close();
                }
                None => {
                    debug!("All client handles dropped");
                    core.request_close();
                }
            },
            () = sleep_until(deadline) => core.expire(Instant::now()),
        }
    }

    if let Err(e) = transport.close().await {
        debug!(error = %e, "Transport close failed");
    }
    core.finish();
    *snapshot.lock() = core.snapshot();
    core.announce_closed();
    if let Some(sender) = established.take() {
        let error = core
            .take_failure()
            .unwrap_or_else(|| NetconfError::transport("session closed before <hello>"));
        let _ = sender.send(Err(error));
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
