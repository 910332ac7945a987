//! # NETCONF CLI
//!
//! Command-line front-end for `netconf-client`.
//!
//! ```bash
//! # Show the server's session id and capabilities
//! netconf-cli --host 192.0.2.1 --user admin hello
//!
//! # Send one request from a file, or from stdin with `-`
//! netconf-cli -H router -u admin rpc get-config.xml
//! echo '<get><filter type="subtree"><interfaces/></filter></get>' | netconf-cli -H router -u admin rpc -
//!
//! # Lock and unlock the candidate datastore
//! netconf-cli -H router -u admin lock
//!
//! # Download all YANG modules, file names carrying the revision
//! netconf-cli -H router -u admin schemas --out ./yang --with-revision
//!
//! # Print notifications for a minute
//! netconf-cli -H router -u admin listen --seconds 60
//! ```
//!
//! Connection settings not given on the command line or in `NETCONF_*`
//! environment variables come from a TOML profile file, see [`profile`].

#![warn(missing_docs, rust_2018_idioms, clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod error;
pub mod executor;
pub mod profile;
pub mod prompt;

use anyhow::Context;
use clap::Parser;
use netconf_client::NetconfClient;
use netconf_transport::{NoPrompt, PasswordPrompt, WIRE_TARGET};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub use cli::{Cli, Commands, Connection, OutputFormat};
pub use error::{CliError, CliResult, ErrorCategory};
pub use executor::CommandExecutor;
pub use prompt::{LinePrompt, StdinPrompt};

/// Default log filter when `RUST_LOG` is unset
pub fn log_filter(verbose: bool, debug: bool) -> String {
    let mut filter = String::from(if verbose { "debug" } else { "warn" });
    if debug {
        filter.push_str(&format!(",{WIRE_TARGET}=debug"));
    }
    filter
}

/// Install the stderr log subscriber
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(verbose: bool, debug: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(verbose, debug)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install the log subscriber")
}

/// Run the CLI application
///
/// # Errors
///
/// Returns the first failure as a [`CliError`] inside the `anyhow` error.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug)?;

    let profile =
        profile::load_profile(cli.connection.config.as_deref(), &cli.connection.profile)?;
    let (ssh, config) = profile::resolve(&cli.connection, profile, cli.debug)?;

    // stdin carries the request, so it cannot answer password prompts
    let prompt: Box<dyn PasswordPrompt> = match &cli.command {
        Commands::Rpc { request } if request == "-" => Box::new(NoPrompt),
        _ => Box::new(StdinPrompt::stdin()),
    };

    let (client, events) = NetconfClient::new(config);
    let session = client
        .connect(ssh, prompt.as_ref())
        .await
        .map_err(CliError::from)?;

    let executor = CommandExecutor::new(cli.format, cli.events);
    let result = executor
        .execute(cli.command, &client, &session, events, &mut std::io::stdout())
        .await;

    if client.is_connected() {
        if let Err(e) = client.close_session().await {
            warn!(error = %e, "close-session failed");
        }
    } else {
        debug!("Session already closed");
    }
    result.map_err(Into::into)
}
