//! Connection profiles.
//!
//! Profiles live in a TOML file, one table per profile:
//!
//! ```toml
//! [default]
//! host = "192.0.2.1"
//! username = "admin"
//! private_key = "~/.ssh/id_ed25519"
//!
//! [lab]
//! host = "lab-router"
//! port = 2830
//! username = "netconf"
//! rpc_timeout = 60
//! ```
//!
//! Command-line options and environment variables override profile values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use netconf_client::ClientConfig;
use netconf_transport::SshConfig;
use serde::Deserialize;
use tracing::debug;

use crate::cli::Connection;
use crate::error::{CliError, CliResult};

/// One named set of connection defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Server host name or address
    pub host: Option<String>,
    /// Server port
    pub port: Option<u16>,
    /// Login name
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Private key file
    pub private_key: Option<PathBuf>,
    /// Passphrase of the private key
    pub passphrase: Option<String>,
    /// RPC reply timeout in seconds
    pub rpc_timeout: Option<u64>,
    /// TCP connect plus SSH handshake limit in seconds
    pub connect_timeout: Option<u64>,
    /// Capability URIs advertised in the client hello
    pub capabilities: Option<Vec<String>>,
}

/// Location of the profile file when `--config` is not given
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("netconf-cli").join("config.toml"))
}

/// Load profile `name` from `path`, or from the default location.
///
/// An explicit `path` must exist; the default file is optional. A missing
/// profile table yields an empty profile.
///
/// # Errors
///
/// Returns [`CliError::Config`] when the file is missing or malformed.
pub fn load_profile(path: Option<&Path>, name: &str) -> CliResult<Profile> {
    let source = match path {
        Some(path) => config::File::from(path.to_path_buf()).required(true),
        None => match default_config_path() {
            Some(path) => config::File::from(path).required(false),
            None => return Ok(Profile::default()),
        },
    };

    let settings = config::Config::builder().add_source(source).build()?;
    match settings.get::<Profile>(name) {
        Ok(profile) => {
            debug!(profile = name, "Loaded profile");
            Ok(profile)
        }
        Err(config::ConfigError::NotFound(_)) => Ok(Profile::default()),
        Err(e) => Err(e.into()),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.clone(), |home| home.join(rest)),
        Err(_) => path,
    }
}

/// Merge command-line options over `profile` into connection settings.
///
/// # Errors
///
/// Returns [`CliError::InvalidArguments`] without a host or user, or for
/// settings the connection would reject.
pub fn resolve(
    connection: &Connection,
    profile: Profile,
    debug: bool,
) -> CliResult<(SshConfig, ClientConfig)> {
    let host = connection.host.clone().or(profile.host).ok_or_else(|| {
        CliError::InvalidArguments("no host given; use --host or set `host` in the profile".into())
    })?;
    let username = connection.user.clone().or(profile.username).ok_or_else(|| {
        CliError::InvalidArguments(
            "no user given; use --user or set `username` in the profile".into(),
        )
    })?;

    let mut ssh = SshConfig::new(host, username).with_debug(debug);
    if let Some(port) = connection.port.or(profile.port) {
        ssh = ssh.with_port(port);
    }
    if let Some(password) = connection.password.clone().or(profile.password) {
        ssh = ssh.with_password(password);
    }
    if let Some(key) = connection.key.clone().or(profile.private_key) {
        let passphrase = connection.passphrase.clone().or(profile.passphrase);
        ssh = ssh.with_private_key(expand_home(key), passphrase);
    }
    if let Some(secs) = profile.connect_timeout {
        ssh = ssh.with_connect_timeout(Duration::from_secs(secs));
    }

    let mut client = ClientConfig::default();
    if let Some(secs) = connection.timeout.or(profile.rpc_timeout) {
        client = client.with_rpc_timeout(Duration::from_secs(secs));
    }
    if let Some(capabilities) = profile.capabilities {
        client = client.with_client_capabilities(capabilities);
    }

    ssh.validate().map_err(|e| CliError::InvalidArguments(e.to_string()))?;
    client.validate()?;
    Ok((ssh, client))
}
