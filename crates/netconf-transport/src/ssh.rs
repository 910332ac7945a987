//! NETCONF over SSH (RFC 6242) via russh.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use russh::client::{self, Handle};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::config::SshConfig;
use crate::error::{TransportError, TransportResult};
use crate::greeting::GreetingSniffer;
use crate::traits::{BoxFuture, Connector, PasswordPrompt, Transport};
use crate::types::{TransportEvent, TransportState};

/// Name of the SSH subsystem NETCONF runs in
pub const NETCONF_SUBSYSTEM: &str = "netconf";

/// Tracing target of raw traffic logging
pub const WIRE_TARGET: &str = "netconf_transport::wire";

/// russh callbacks for one connection
#[derive(Debug)]
struct SshHandler {
    banners: mpsc::UnboundedSender<String>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!("accepting server host key without verification");
        Ok(true)
    }

    async fn auth_banner(
        &mut self,
        banner: &str,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        let _ = self.banners.send(banner.to_string());
        Ok(())
    }
}

/// Opens SSH transports for one [`SshConfig`].
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    /// Create a connector
    #[must_use]
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// The configuration connections are made with
    #[must_use]
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Open a session, authenticate and start the subsystem.
    ///
    /// A rejected credential closes the SSH connection; the prompt is asked
    /// for a new password and the whole handshake is repeated, at most
    /// `max_auth_attempts` times in total.
    async fn establish(&self, prompt: &dyn PasswordPrompt) -> TransportResult<SshTransport> {
        self.config.validate()?;
        let endpoint = self.config.endpoint();
        let mut password = self.config.password.clone();
        if password.is_none() && self.config.private_key.is_none() {
            password = prompt.prompt(&self.prompt_message()).await;
        }

        let mut attempt = 1;
        loop {
            let mut session = self.handshake(&endpoint).await?;
            if self.authenticate(&mut session.handle, password.take()).await? {
                info!(user = %self.config.username, attempt, "Authenticated");
                return self.open_subsystem(session, endpoint).await;
            }

            if let Err(e) = session
                .handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await
            {
                debug!(error = %e, "Disconnect after failed authentication");
            }
            warn!(
                user = %self.config.username,
                attempt,
                max_attempts = self.config.max_auth_attempts,
                "Authentication rejected"
            );
            if attempt >= self.config.max_auth_attempts {
                return Err(TransportError::AuthenticationFailed(format!(
                    "{}@{} rejected all credentials after {attempt} attempts",
                    self.config.username, self.config.host
                )));
            }
            password = prompt.prompt(&self.prompt_message()).await;
            if password.is_none() {
                return Err(TransportError::AuthenticationFailed(
                    "no credentials supplied".into(),
                ));
            }
            attempt += 1;
        }
    }

    fn prompt_message(&self) -> String {
        format!("{}@{}'s password: ", self.config.username, self.config.host)
    }

    /// TCP connect plus SSH key exchange, bounded by `connect_timeout`.
    async fn handshake(&self, endpoint: &str) -> TransportResult<PendingSession> {
        let timeout = self.config.connect_timeout;
        info!(%endpoint, user = %self.config.username, "Connecting to NETCONF server");

        let (greeting_tx, mut greeting_rx) = oneshot::channel();
        let (banner_tx, banners) = mpsc::unbounded_channel();
        let ssh_config = Arc::new(client::Config {
            keepalive_interval: self.config.keepalive_interval,
            ..Default::default()
        });
        let handler = SshHandler { banners: banner_tx };

        let connect = async {
            let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
                .await
                .map_err(|e| TransportError::ConnectionFailed(format!("{endpoint}: {e}")))?;
            stream.set_nodelay(true)?;
            client::connect_stream(ssh_config, GreetingSniffer::new(stream, greeting_tx), handler)
                .await
                .map_err(TransportError::from)
        };
        let handle = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| TransportError::ConnectionTimeout {
                operation: format!("ssh handshake with {endpoint}"),
                timeout,
            })??;

        let greeting = greeting_rx.try_recv().ok();
        if let Some(greeting) = &greeting {
            debug!(%greeting, "SSH identification received");
        }
        Ok(PendingSession {
            handle,
            greeting,
            banners,
        })
    }

    /// Try the private key, then `password`. `Ok(false)` when both were refused.
    async fn authenticate(
        &self,
        handle: &mut Handle<SshHandler>,
        password: Option<String>,
    ) -> TransportResult<bool> {
        let user = self.config.username.as_str();

        if let Some(path) = &self.config.private_key {
            let key = load_secret_key(path, self.config.passphrase.as_deref()).map_err(|e| {
                TransportError::ConfigurationError(format!(
                    "cannot load private key {}: {e}",
                    path.display()
                ))
            })?;
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                .await?;
            if result.success() {
                return Ok(true);
            }
            debug!(user, key = %path.display(), "Public key rejected");
        }

        match password {
            Some(password) => Ok(handle.authenticate_password(user, password).await?.success()),
            None => Ok(false),
        }
    }

    async fn open_subsystem(
        &self,
        session: PendingSession,
        endpoint: String,
    ) -> TransportResult<SshTransport> {
        let PendingSession {
            handle,
            greeting,
            mut banners,
        } = session;

        let mut pending = VecDeque::new();
        pending.extend(greeting.map(TransportEvent::Greeting));
        while let Ok(banner) = banners.try_recv() {
            pending.push_back(TransportEvent::Banner(banner));
        }

        let mut channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, NETCONF_SUBSYSTEM).await?;
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => break,
                Some(ChannelMsg::Failure) => {
                    return Err(TransportError::SubsystemRejected(format!(
                        "{endpoint} refused the '{NETCONF_SUBSYSTEM}' subsystem"
                    )));
                }
                Some(ChannelMsg::Data { data }) => {
                    pending.push_back(TransportEvent::Data(Bytes::copy_from_slice(&data)));
                }
                Some(other) => trace!(?other, "Ignoring channel message while starting subsystem"),
                None => {
                    return Err(TransportError::ConnectionLost(
                        "channel closed while starting subsystem".into(),
                    ));
                }
            }
        }
        info!(%endpoint, "NETCONF subsystem started");

        Ok(SshTransport {
            handle,
            channel,
            pending,
            state: TransportState::Connected,
            endpoint,
            debug: self.config.debug,
            closed: false,
        })
    }
}

/// An SSH session between key exchange and authentication
struct PendingSession {
    handle: Handle<SshHandler>,
    greeting: Option<String>,
    banners: mpsc::UnboundedReceiver<String>,
}

impl Connector for SshConnector {
    fn connect<'a>(
        &'a self,
        prompt: &'a dyn PasswordPrompt,
    ) -> BoxFuture<'a, TransportResult<Box<dyn Transport>>> {
        Box::pin(async move {
            let transport = self.establish(prompt).await?;
            Ok(Box::new(transport) as Box<dyn Transport>)
        })
    }
}

/// The `netconf` subsystem channel of an authenticated SSH session.
pub struct SshTransport {
    handle: Handle<SshHandler>,
    channel: Channel<client::Msg>,
    pending: VecDeque<TransportEvent>,
    state: TransportState,
    endpoint: String,
    debug: bool,
    closed: bool,
}

// Manual Debug implementation since the russh handles don't implement Debug
impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("debug", &self.debug)
            .finish()
    }
}

impl SshTransport {
    fn log_traffic(&self, direction: &'static str, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        if self.debug {
            debug!(target: WIRE_TARGET, direction, bytes = data.len(), "{text}");
        } else {
            trace!(target: WIRE_TARGET, direction, bytes = data.len(), "{text}");
        }
    }
}

impl Transport for SshTransport {
    fn state(&self) -> TransportState {
        self.state
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            if self.state != TransportState::Connected {
                return Err(TransportError::Closed);
            }
            self.log_traffic("send", &data);
            self.channel
                .data(&data[..])
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }

    fn receive(&mut self) -> BoxFuture<'_, TransportResult<Option<TransportEvent>>> {
        Box::pin(async move {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.state != TransportState::Connected {
                return Ok(None);
            }
            loop {
                match self.channel.wait().await {
                    Some(ChannelMsg::Data { data }) => {
                        let bytes = Bytes::copy_from_slice(&data);
                        self.log_traffic("recv", &bytes);
                        return Ok(Some(TransportEvent::Data(bytes)));
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        debug!(ext, text = %String::from_utf8_lossy(&data), "Subsystem stderr");
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        debug!(exit_status, "Subsystem exited");
                    }
                    Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                        info!(endpoint = %self.endpoint, "Channel closed by server");
                        self.state = TransportState::Disconnected;
                        return Ok(None);
                    }
                    Some(other) => trace!(?other, "Ignoring channel message"),
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            self.state = TransportState::Disconnecting;
            if let Err(e) = self.channel.close().await {
                debug!(error = %e, "Channel close failed");
            }
            let result = self
                .handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await;
            self.state = TransportState::Disconnected;
            info!(endpoint = %self.endpoint, "SSH session closed");
            result.map_err(TransportError::from)
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }
}
