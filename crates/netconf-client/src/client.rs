//! The public NETCONF client.
//!
//! `NetconfClient` is a cheaply cloneable handle (`Arc<ClientInner>`): every
//! clone talks to the same session task. Requests may be issued from any
//! clone, including from inside a reply callback; they reach the session
//! task through its command channel and are registered in order.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use netconf_protocol::operations::{self, Datastore};
use netconf_protocol::{CapabilitySet, NetconfError, NetconfResult};
use netconf_transport::{BoxFuture, Connector, PasswordPrompt};
use netconf_wire::FramingMode;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::events::{EventEmitter, EventReceiver, NetconfEvent};
use crate::registry::{Completion, RpcResponse, format_elapsed};
use crate::schema::{RpcExecutor, SchemaFetcher, SchemaSummary};
use crate::session::{
    Command, ProtocolCore, SessionHandle, SessionInfo, SessionState, SharedSnapshot, Snapshot,
    spawn_session,
};

struct ClientInner {
    config: ClientConfig,
    events: EventEmitter,
    snapshot: SharedSnapshot,
    session: Mutex<Option<SessionHandle>>,
}

/// Asynchronous NETCONF client.
///
/// ```rust,no_run
/// use netconf_client::{ClientConfig, NetconfClient};
/// use netconf_transport::{NoPrompt, SshConfig};
///
/// # async fn example() -> netconf_protocol::NetconfResult<()> {
/// let (client, mut events) = NetconfClient::new(ClientConfig::default());
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("{event}");
///     }
/// });
///
/// let ssh = SshConfig::new("router1", "admin").with_password("admin");
/// let session = client.connect(ssh, &NoPrompt).await?;
/// println!("session {:?}: {}", session.session_id, session.capabilities);
///
/// let reply = client.rpc("<get-config><source><running/></source></get-config>", None).await?;
/// println!("{}", reply.xml);
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NetconfClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for NetconfClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.inner.snapshot.lock();
        f.debug_struct("NetconfClient")
            .field("state", &snapshot.state)
            .field("session_id", &snapshot.session_id)
            .field("framing", &snapshot.framing)
            .finish_non_exhaustive()
    }
}

impl NetconfClient {
    /// Create a disconnected client and the receiver of its events
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, EventReceiver) {
        let (events, receiver) = EventEmitter::new(config.event_capacity);
        let client = Self {
            inner: Arc::new(ClientInner {
                config,
                events,
                snapshot: SharedSnapshot::default(),
                session: Mutex::new(None),
            }),
        };
        (client, receiver)
    }

    /// Configuration the client was built with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Emitter feeding this client's event stream
    #[must_use]
    pub fn event_emitter(&self) -> &EventEmitter {
        &self.inner.events
    }

    /// Connect over SSH and complete the hello exchange.
    ///
    /// # Errors
    ///
    /// See [`NetconfClient::connect_with`].
    #[cfg(feature = "ssh")]
    pub async fn connect(
        &self,
        ssh: netconf_transport::SshConfig,
        prompt: &dyn PasswordPrompt,
    ) -> NetconfResult<SessionInfo> {
        let connector = netconf_transport::SshConnector::new(ssh);
        self.connect_with(&connector, prompt).await
    }

    /// Open a transport with `connector` and complete the hello exchange.
    ///
    /// # Errors
    ///
    /// - `AlreadyConnected` unless the client is disconnected
    /// - `Configuration` for an invalid [`ClientConfig`]
    /// - transport and authentication errors from the connector
    /// - `IncompatibleCapabilities` or `Protocol` when the hello exchange fails
    /// - `Timeout` when no `<hello>` arrives within `hello_timeout`
    pub async fn connect_with(
        &self,
        connector: &dyn Connector,
        prompt: &dyn PasswordPrompt,
    ) -> NetconfResult<SessionInfo> {
        self.inner.config.validate()?;
        {
            let mut snapshot = self.inner.snapshot.lock();
            if snapshot.state != SessionState::Disconnected {
                return Err(NetconfError::already_connected());
            }
            snapshot.state = SessionState::Connecting;
        }

        let transport = match connector.connect(prompt).await {
            Ok(transport) => transport,
            Err(e) => {
                *self.inner.snapshot.lock() = Snapshot::default();
                warn!(error = %e, "Connection failed");
                return Err(NetconfError::from(e).with_operation("connect"));
            }
        };

        let (established_tx, established_rx) = oneshot::channel();
        let core = ProtocolCore::new(&self.inner.config, self.inner.events.clone());
        let handle = spawn_session(
            transport,
            core,
            Arc::clone(&self.inner.snapshot),
            established_tx,
        );
        *self.inner.session.lock() = Some(handle);

        let hello_timeout = self.inner.config.hello_timeout;
        match tokio::time::timeout(hello_timeout, established_rx).await {
            Ok(Ok(Ok(info))) => {
                info!(session_id = ?info.session_id, framing = %info.framing, "Connected");
                Ok(info)
            }
            Ok(Ok(Err(error))) => Err(error),
            Ok(Err(_)) => Err(NetconfError::transport("session ended before <hello>")),
            Err(_) => {
                self.disconnect().await?;
                Err(NetconfError::timeout(format!(
                    "no <hello> within {}",
                    format_elapsed(hello_timeout)
                ))
                .with_operation("connect"))
            }
        }
    }

    /// Send a request and wait for its reply.
    ///
    /// `request` is either a complete `<rpc>` element, whose `message-id` is
    /// kept or assigned, or a bare operation that is wrapped in one. An
    /// `<rpc-error>` reply is returned as a response; use
    /// [`RpcResponse::into_result`] to turn it into an error.
    ///
    /// # Errors
    ///
    /// - `NotConnected` without an established session
    /// - `InvalidRequest` when `request` is not well-formed XML
    /// - `DuplicateMessageId` when the request's id is already pending
    /// - `Timeout` when no reply arrives in time
    pub async fn rpc(
        &self,
        request: &str,
        timeout: Option<Duration>,
    ) -> NetconfResult<RpcResponse> {
        let (waiter, reply) = oneshot::channel();
        self.submit(request, timeout, Completion::Waiter(waiter))
            .await?;
        reply.await.map_err(|_| NetconfError::not_connected())?
    }

    /// Send a request and hand its reply to `callback`.
    ///
    /// Returns the request's message id once it is queued. The callback runs
    /// on the session task and must not block; it is dropped uninvoked when
    /// the request times out or the session closes.
    ///
    /// # Errors
    ///
    /// Same as [`NetconfClient::rpc`], except for `Timeout`.
    pub async fn rpc_with_callback<F>(
        &self,
        request: &str,
        timeout: Option<Duration>,
        callback: F,
    ) -> NetconfResult<String>
    where
        F: FnOnce(RpcResponse) + Send + 'static,
    {
        self.submit(request, timeout, Completion::Callback(Box::new(callback)))
            .await
    }

    async fn submit(
        &self,
        request: &str,
        timeout: Option<Duration>,
        completion: Completion,
    ) -> NetconfResult<String> {
        let commands = self.commands().ok_or_else(NetconfError::not_connected)?;
        let (accepted, accepted_rx) = oneshot::channel();
        let sent = commands
            .send(Command::Rpc {
                request: request.to_string(),
                timeout: timeout.unwrap_or(self.inner.config.rpc_timeout),
                completion,
                accepted,
            })
            .await;
        let accepted = match sent {
            Ok(()) => accepted_rx.await.ok(),
            Err(_) => None,
        };
        match accepted {
            Some(result) => result,
            None => {
                self.reap_finished_session().await;
                Err(NetconfError::not_connected())
            }
        }
    }

    /// Collect a session task that has stopped, so a task that died without
    /// running its close path still leaves the client disconnected.
    async fn reap_finished_session(&self) {
        let finished = self
            .inner
            .session
            .lock()
            .as_ref()
            .is_some_and(|session| session.task.is_finished());
        if finished && let Err(e) = self.disconnect().await {
            debug!(error = %e, "Reaping the session task failed");
        }
    }

    fn commands(&self) -> Option<mpsc::Sender<Command>> {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|session| session.commands.clone())
    }

    /// Lock the candidate datastore
    ///
    /// # Errors
    ///
    /// Fails like [`NetconfClient::rpc`], and with an `Rpc` error when the
    /// server refuses the lock.
    pub async fn lock(&self) -> NetconfResult<()> {
        self.lock_datastore(Datastore::Candidate).await
    }

    /// Unlock the candidate datastore
    ///
    /// # Errors
    ///
    /// Fails like [`NetconfClient::lock`].
    pub async fn unlock(&self) -> NetconfResult<()> {
        self.unlock_datastore(Datastore::Candidate).await
    }

    /// Lock `target`; emits [`NetconfEvent::Locked`] on `<ok/>`.
    ///
    /// # Errors
    ///
    /// Fails like [`NetconfClient::lock`].
    pub async fn lock_datastore(&self, target: Datastore) -> NetconfResult<()> {
        let response = self
            .rpc(&operations::lock(target), None)
            .await?
            .into_result()?;
        if response.is_ok() {
            self.inner.events.emit(NetconfEvent::Locked);
        }
        Ok(())
    }

    /// Unlock `target`; emits [`NetconfEvent::Unlocked`] on `<ok/>`.
    ///
    /// # Errors
    ///
    /// Fails like [`NetconfClient::lock`].
    pub async fn unlock_datastore(&self, target: Datastore) -> NetconfResult<()> {
        let response = self
            .rpc(&operations::unlock(target), None)
            .await?
            .into_result()?;
        if response.is_ok() {
            self.inner.events.emit(NetconfEvent::Unlocked);
        }
        Ok(())
    }

    /// Download every YANG module the server lists.
    ///
    /// Each module is emitted as [`NetconfEvent::YangDefinition`] and, with
    /// a `destination`, written to a `.yang` file there. These events wait
    /// for room in the event channel instead of being dropped, so keep
    /// draining the [`EventReceiver`](crate::EventReceiver) while this runs
    /// (or drop it).
    ///
    /// # Errors
    ///
    /// See [`SchemaFetcher::fetch_all`].
    pub async fn get_yang_library(
        &self,
        destination: Option<&Path>,
        include_revision: bool,
    ) -> NetconfResult<SchemaSummary> {
        SchemaFetcher::new(self, self.inner.events.clone())
            .fetch_all(destination, include_revision)
            .await
    }

    /// Ask the server to end the session, then disconnect.
    ///
    /// # Errors
    ///
    /// Fails like [`NetconfClient::rpc`] when `<close-session>` is refused.
    pub async fn close_session(&self) -> NetconfResult<()> {
        let result = self
            .rpc(&operations::close_session(), None)
            .await
            .and_then(RpcResponse::into_result);
        self.disconnect().await?;
        result.map(|_| ())
    }

    /// Close the session and wait until it is torn down. Pending requests
    /// are dropped. Does nothing when not connected.
    ///
    /// # Errors
    ///
    /// Currently infallible; the result is kept for API stability.
    pub async fn disconnect(&self) -> NetconfResult<()> {
        let session = self.inner.session.lock().take();
        let Some(session) = session else {
            return Ok(());
        };
        if session.commands.send(Command::Disconnect).await.is_err() {
            debug!("Session task already finished");
        }
        if let Err(e) = session.task.await {
            warn!(error = %e, "Session task ended abnormally");
            *self.inner.snapshot.lock() = Snapshot::default();
            self.inner.events.emit(NetconfEvent::Disconnected);
        }
        Ok(())
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.snapshot.lock().state
    }

    /// Whether requests can be issued
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Session id assigned by the server
    #[must_use]
    pub fn session_id(&self) -> Option<u64> {
        self.inner.snapshot.lock().session_id
    }

    /// Capabilities negotiated with the server
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.inner.snapshot.lock().capabilities.clone()
    }

    /// Framing in use
    #[must_use]
    pub fn framing_mode(&self) -> FramingMode {
        self.inner.snapshot.lock().framing
    }
}

impl RpcExecutor for NetconfClient {
    fn execute<'a>(
        &'a self,
        request: &'a str,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, NetconfResult<RpcResponse>> {
        Box::pin(self.rpc(request, timeout))
    }

    fn capabilities(&self) -> CapabilitySet {
        NetconfClient::capabilities(self)
    }
}
