//! Core transport traits.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::TransportResult;
use crate::types::{TransportEvent, TransportState};

/// A boxed, sendable future as used by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An established byte pipe to a NETCONF server.
///
/// The session engine owns its transport exclusively, so every operation
/// takes `&mut self`. [`Transport::receive`] must be cancel safe: the engine
/// polls it inside `tokio::select!` next to its command queue and timers.
pub trait Transport: Send + Debug {
    /// Returns the current state of the transport.
    fn state(&self) -> TransportState;

    /// Writes already-framed bytes to the peer.
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, TransportResult<()>>;

    /// Waits for the next event. `Ok(None)` means the peer closed the stream.
    fn receive(&mut self) -> BoxFuture<'_, TransportResult<Option<TransportEvent>>>;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&mut self) -> BoxFuture<'_, TransportResult<()>>;

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Asks the user for a password when stored credentials are missing or rejected.
pub trait PasswordPrompt: Send + Sync + Debug {
    /// Returns the password to try next, or `None` to give up.
    fn prompt<'a>(&'a self, message: &'a str) -> BoxFuture<'a, Option<String>>;
}

/// A prompt that never supplies a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl PasswordPrompt for NoPrompt {
    fn prompt<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async { None })
    }
}

/// Establishes transports.
pub trait Connector: Send + Sync + Debug {
    /// Opens a new transport, consulting `prompt` for credentials as needed.
    fn connect<'a>(
        &'a self,
        prompt: &'a dyn PasswordPrompt,
    ) -> BoxFuture<'a, TransportResult<Box<dyn Transport>>>;
}
