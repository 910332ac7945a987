use std::process::ExitCode;

use netconf_cli::{CliError, CommandExecutor};

#[tokio::main]
async fn main() -> ExitCode {
    match netconf_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CliError>() {
                Some(error) => CommandExecutor::display_error(error),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
