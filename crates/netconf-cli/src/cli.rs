//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// NETCONF command-line client
#[derive(Parser, Debug)]
#[command(
    name = "netconf-cli",
    version,
    about = "Talk to NETCONF servers over SSH",
    long_about = "Connect to a NETCONF server over SSH, send RPCs, lock the candidate \
                  datastore, follow notifications and download the server's YANG modules."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Connection options
    #[command(flatten)]
    pub connection: Connection,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Print every session event to stderr
    #[arg(long, global = true)]
    pub events: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Log raw SSH channel traffic
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Connect and print the session id and server capabilities
    Hello,

    /// Send one RPC read from a file (or `-` for stdin) and print the reply
    Rpc {
        /// File holding an `<rpc>` element or a bare operation
        request: String,
    },

    /// Lock the candidate datastore
    Lock,

    /// Unlock the candidate datastore
    Unlock,

    /// Download every YANG module the server lists
    Schemas {
        /// Directory the `.yang` files are written to
        #[arg(long, short = 'o')]
        out: PathBuf,

        /// Put the revision into file names (`name@revision.yang`)
        #[arg(long)]
        with_revision: bool,
    },

    /// Subscribe to notifications and print them
    Listen {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        seconds: Option<u64>,

        /// Event stream to subscribe to
        #[arg(long)]
        stream: Option<String>,
    },
}

/// Connection options, each falling back to the profile file
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    /// Server host name or address
    #[arg(long, short = 'H', global = true, env = "NETCONF_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = "NETCONF_PORT")]
    pub port: Option<u16>,

    /// Login name
    #[arg(long, short = 'u', global = true, env = "NETCONF_USER")]
    pub user: Option<String>,

    /// Password (prompted for when missing or rejected)
    #[arg(long, global = true, env = "NETCONF_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Private key file for public key authentication
    #[arg(long, short = 'k', global = true, env = "NETCONF_KEY")]
    pub key: Option<PathBuf>,

    /// Passphrase of the private key
    #[arg(long, global = true, env = "NETCONF_KEY_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// RPC reply timeout in seconds
    #[arg(long, short = 't', global = true)]
    pub timeout: Option<u64>,

    /// Profile file (default: `<config dir>/netconf-cli/config.toml`)
    #[arg(long, short = 'c', global = true, env = "NETCONF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Profile to use from the profile file
    #[arg(long, short = 'P', global = true, env = "NETCONF_PROFILE", default_value = "default")]
    pub profile: String,
}

/// Output formats
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable
    #[default]
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_connection_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "netconf-cli",
            "schemas",
            "--out",
            "yang",
            "--with-revision",
            "--host",
            "192.0.2.1",
            "-u",
            "admin",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Schemas {
                out: PathBuf::from("yang"),
                with_revision: true
            }
        );
        assert_eq!(cli.connection.host.as_deref(), Some("192.0.2.1"));
        assert_eq!(cli.connection.user.as_deref(), Some("admin"));
        assert_eq!(cli.connection.profile, "default");
        assert_eq!(cli.format, OutputFormat::Human);
    }

    #[test]
    fn test_rpc_accepts_stdin_marker() {
        let cli = Cli::try_parse_from(["netconf-cli", "rpc", "-", "-f", "json"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Rpc {
                request: "-".to_string()
            }
        );
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_listen_options() {
        let cli =
            Cli::try_parse_from(["netconf-cli", "listen", "--seconds", "5", "--stream", "NETCONF"])
                .unwrap();
        assert_eq!(
            cli.command,
            Commands::Listen {
                seconds: Some(5),
                stream: Some("NETCONF".to_string())
            }
        );
    }
}
