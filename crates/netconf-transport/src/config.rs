//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// IANA port of NETCONF over SSH
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// Parameters of one SSH connection to a NETCONF server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Login name
    pub username: String,
    /// Password tried first; the prompt is consulted when absent or rejected
    pub password: Option<String>,
    /// Private key file used for public key authentication
    pub private_key: Option<PathBuf>,
    /// Passphrase of the private key
    pub passphrase: Option<String>,
    /// Limit for TCP connect plus SSH handshake
    pub connect_timeout: Duration,
    /// Interval of SSH keepalive requests, `None` to disable
    pub keepalive_interval: Option<Duration>,
    /// Password attempts before giving up
    pub max_auth_attempts: u32,
    /// Log raw traffic at debug instead of trace level
    pub debug: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_NETCONF_PORT,
            username: String::new(),
            password: None,
            private_key: None,
            passphrase: None,
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Some(Duration::from_secs(30)),
            max_auth_attempts: 3,
            debug: false,
        }
    }
}

// Manual Debug implementation keeps secrets out of logs
impl std::fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("max_auth_attempts", &self.max_auth_attempts)
            .field("debug", &self.debug)
            .finish()
    }
}

impl SshConfig {
    /// Configuration for `username@host` on the default port
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set the TCP port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password tried first
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the private key file and its passphrase
    #[must_use]
    pub fn with_private_key(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.private_key = Some(path.into());
        self.passphrase = passphrase;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable debug-level traffic logging
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// `host:port`
    #[must_use]
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Check that the configuration can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty host or username, port 0,
    /// or zero authentication attempts.
    pub fn validate(&self) -> TransportResult<()> {
        if self.host.trim().is_empty() {
            return Err(TransportError::ConfigurationError("host is empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(TransportError::ConfigurationError("username is empty".into()));
        }
        if self.port == 0 {
            return Err(TransportError::ConfigurationError("port must not be 0".into()));
        }
        if self.max_auth_attempts == 0 {
            return Err(TransportError::ConfigurationError(
                "max_auth_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
