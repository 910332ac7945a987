//! Client configuration.

use std::time::Duration;

use netconf_protocol::capabilities::DEFAULT_CLIENT_CAPABILITIES;
use netconf_protocol::{NetconfError, NetconfResult};
use netconf_wire::DEFAULT_MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_EVENT_CAPACITY;

/// Behaviour of a [`NetconfClient`](crate::NetconfClient) independent of the
/// server it talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout of requests issued without an explicit one
    pub rpc_timeout: Duration,
    /// How long `connect` waits for the server `<hello>`
    pub hello_timeout: Duration,
    /// Largest inbound message accepted
    pub max_message_size: usize,
    /// Capacity of the event channel
    pub event_capacity: usize,
    /// Capability URIs advertised in the client `<hello>`
    pub client_capabilities: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(30),
            hello_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            client_capabilities: DEFAULT_CLIENT_CAPABILITIES
                .iter()
                .map(|uri| (*uri).to_string())
                .collect(),
        }
    }
}

impl ClientConfig {
    /// Set the default request timeout
    #[must_use]
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Set the hello timeout
    #[must_use]
    pub fn with_hello_timeout(mut self, timeout: Duration) -> Self {
        self.hello_timeout = timeout;
        self
    }

    /// Replace the advertised capabilities
    #[must_use]
    pub fn with_client_capabilities<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_capabilities = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration before a session is started.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for zero timeouts, a zero message size
    /// limit or an empty capability list.
    pub fn validate(&self) -> NetconfResult<()> {
        if self.rpc_timeout.is_zero() || self.hello_timeout.is_zero() {
            return Err(NetconfError::configuration("timeouts must be non-zero"));
        }
        if self.max_message_size == 0 {
            return Err(NetconfError::configuration(
                "max_message_size must be non-zero",
            ));
        }
        if self.client_capabilities.is_empty() {
            return Err(NetconfError::configuration(
                "at least one client capability is required",
            ));
        }
        Ok(())
    }
}
