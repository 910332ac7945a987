//! In-memory transport pair for tests.
//!
//! [`memory_pair`] returns the client side, a [`MemoryTransport`], and a
//! [`MemoryPeer`] that plays the server: it injects transport events and
//! decodes what the client wrote.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use netconf_wire::{FramingMode, NetconfCodec, encode_frame};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::traits::{BoxFuture, Connector, PasswordPrompt, Transport};
use crate::types::{TransportEvent, TransportState};

/// Create a connected transport and its scripted peer.
#[must_use]
pub fn memory_pair() -> (MemoryTransport, MemoryPeer) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            inbound: event_rx,
            outbound: Some(sent_tx),
            state: TransportState::Connected,
        },
        MemoryPeer {
            events: Some(event_tx),
            sent: sent_rx,
            codec: NetconfCodec::new(),
            buffer: BytesMut::new(),
            decoded: VecDeque::new(),
        },
    )
}

/// Client side of an in-memory connection
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
    state: TransportState,
}

impl Transport for MemoryTransport {
    fn state(&self) -> TransportState {
        self.state
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
            outbound
                .send(data)
                .map_err(|_| TransportError::SendFailed("peer dropped".into()))
        })
    }

    fn receive(&mut self) -> BoxFuture<'_, TransportResult<Option<TransportEvent>>> {
        Box::pin(async move {
            let event = self.inbound.recv().await;
            if event.is_none() {
                self.state = TransportState::Disconnected;
            }
            Ok(event)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.outbound = None;
            self.state = TransportState::Disconnected;
            Ok(())
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

/// Server side of an in-memory connection
#[derive(Debug)]
pub struct MemoryPeer {
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    sent: mpsc::UnboundedReceiver<Bytes>,
    codec: NetconfCodec,
    buffer: BytesMut,
    decoded: VecDeque<String>,
}

impl MemoryPeer {
    /// Deliver an event to the client. Returns `false` once the client is gone.
    pub fn send_event(&self, event: TransportEvent) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.send(event).is_ok())
    }

    /// Deliver raw bytes to the client
    pub fn send_raw(&self, data: impl Into<Bytes>) -> bool {
        self.send_event(TransportEvent::Data(data.into()))
    }

    /// Frame `xml` with `mode` and deliver it
    pub fn send_message(&self, mode: FramingMode, xml: &str) -> bool {
        self.send_raw(encode_frame(mode, xml))
    }

    /// Framing used to decode what the client writes
    pub fn set_mode(&mut self, mode: FramingMode) {
        self.codec.set_mode(mode);
    }

    /// Next message written by the client, `None` once it closed its side.
    ///
    /// # Panics
    ///
    /// Panics if the client wrote bytes that do not decode.
    pub async fn recv_message(&mut self) -> Option<String> {
        loop {
            if let Some(message) = self.decoded.pop_front() {
                return Some(message);
            }
            let data = self.sent.recv().await?;
            self.decode(&data);
        }
    }

    /// Like [`MemoryPeer::recv_message`] without waiting
    ///
    /// # Panics
    ///
    /// Panics if the client wrote bytes that do not decode.
    pub fn try_recv_message(&mut self) -> Option<String> {
        while self.decoded.is_empty() {
            let data = self.sent.try_recv().ok()?;
            self.decode(&data);
        }
        self.decoded.pop_front()
    }

    /// Whether the client has closed its side
    pub fn is_closed(&self) -> bool {
        self.sent.is_closed()
    }

    /// Close the server side; the client sees end of stream.
    pub fn close(&mut self) {
        self.events = None;
    }

    fn decode(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        let messages = self
            .codec
            .decode_all(&mut self.buffer)
            .expect("client wrote an undecodable frame");
        self.decoded.extend(
            messages
                .iter()
                .map(|m| String::from_utf8_lossy(m).into_owned()),
        );
    }
}

/// Hands out one prepared transport.
#[derive(Debug)]
pub struct MemoryConnector {
    transport: Mutex<Option<TransportResult<MemoryTransport>>>,
}

impl MemoryConnector {
    /// Connector yielding `transport` on the first connect
    #[must_use]
    pub fn new(transport: MemoryTransport) -> Self {
        Self {
            transport: Mutex::new(Some(Ok(transport))),
        }
    }

    /// Connector whose first connect fails with `error`
    #[must_use]
    pub fn failing(error: TransportError) -> Self {
        Self {
            transport: Mutex::new(Some(Err(error))),
        }
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(
        &'a self,
        _prompt: &'a dyn PasswordPrompt,
    ) -> BoxFuture<'a, TransportResult<Box<dyn Transport>>> {
        let prepared = self.transport.lock().take();
        Box::pin(async move {
            match prepared {
                Some(Ok(transport)) => Ok(Box::new(transport) as Box<dyn Transport>),
                Some(Err(error)) => Err(error),
                None => Err(TransportError::ConnectionFailed(
                    "memory connector already used".into(),
                )),
            }
        })
    }
}
