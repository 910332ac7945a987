//! Command execution using netconf-client

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use netconf_client::{
    EventReceiver, NetconfClient, NetconfEvent, RpcResponse, SchemaSummary, SessionInfo,
    format_elapsed,
};
use netconf_protocol::operations;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cli::{Commands, OutputFormat};
use crate::error::{CliError, CliResult};

/// Execute CLI commands against a connected client
#[derive(Debug, Clone, Copy)]
pub struct CommandExecutor {
    format: OutputFormat,
    print_events: bool,
}

impl CommandExecutor {
    /// Executor rendering in `format`, echoing session events to stderr when `print_events`
    #[must_use]
    pub fn new(format: OutputFormat, print_events: bool) -> Self {
        Self {
            format,
            print_events,
        }
    }

    /// Display an error with its suggestions on stderr
    pub fn display_error(error: &CliError) {
        eprintln!("Error: {error}");

        let suggestions = error.suggestions();
        if !suggestions.is_empty() {
            eprintln!("\nSuggestions:");
            for suggestion in suggestions {
                eprintln!("  • {suggestion}");
            }
        }
    }

    /// Execute a command on an established session, writing results to `out`
    ///
    /// # Errors
    ///
    /// Returns client errors, `<rpc-error>` replies and output failures.
    pub async fn execute<W: Write>(
        &self,
        command: Commands,
        client: &NetconfClient,
        session: &SessionInfo,
        events: EventReceiver,
        out: &mut W,
    ) -> CliResult<()> {
        let command = match command {
            Commands::Listen { seconds, stream } => {
                return self
                    .listen(client, events, seconds.map(Duration::from_secs), stream, out)
                    .await;
            }
            command => command,
        };

        let printer = self.spawn_event_printer(events);
        let result = match command {
            Commands::Hello => self.display_session(session, out),
            Commands::Rpc { request } => {
                let request = read_request(&request).await?;
                let reply = client.rpc(&request, None).await?;
                self.display_reply(&reply, out)?;
                reply.into_result().map(|_| ()).map_err(CliError::from)
            }
            Commands::Lock => {
                client.lock().await?;
                self.display_status("candidate datastore locked", json!({ "locked": true }), out)
            }
            Commands::Unlock => {
                client.unlock().await?;
                self.display_status(
                    "candidate datastore unlocked",
                    json!({ "locked": false }),
                    out,
                )
            }
            Commands::Schemas { out: dir, with_revision } => {
                let summary = client.get_yang_library(Some(&dir), with_revision).await?;
                self.display_summary(&summary, &dir, out)
            }
            Commands::Listen { .. } => Ok(()),
        };
        if let Some(printer) = printer {
            printer.abort();
        }
        result
    }

    fn spawn_event_printer(&self, mut events: EventReceiver) -> Option<JoinHandle<()>> {
        if !self.print_events {
            return None;
        }
        Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                eprintln!("[event] {event}");
            }
        }))
    }

    async fn listen<W: Write>(
        &self,
        client: &NetconfClient,
        mut events: EventReceiver,
        duration: Option<Duration>,
        stream: Option<String>,
        out: &mut W,
    ) -> CliResult<()> {
        client
            .rpc(&operations::create_subscription(stream.as_deref()), None)
            .await?
            .into_result()?;
        debug!(stream = ?stream, "Subscribed to notifications");

        let deadline = duration.map(|d| tokio::time::Instant::now() + d);
        let until_deadline = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(until_deadline);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(NetconfEvent::Notification { xml }) => self.display_notification(&xml, out)?,
                    Some(NetconfEvent::Disconnected) | None => {
                        return Err(CliError::from("session closed by the server"));
                    }
                    Some(event) => {
                        if self.print_events {
                            eprintln!("[event] {event}");
                        }
                    }
                },
                () = &mut until_deadline => return Ok(()),
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
        }
    }

    /// Print the negotiated session
    ///
    /// # Errors
    ///
    /// Fails when `out` cannot be written.
    pub fn display_session<W: Write>(&self, session: &SessionInfo, out: &mut W) -> CliResult<()> {
        match self.format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(session)?)?,
            OutputFormat::Human => {
                match session.session_id {
                    Some(id) => writeln!(out, "session-id: {id}")?,
                    None => writeln!(out, "session-id: none")?,
                }
                writeln!(out, "framing:    {}", session.framing)?;
                writeln!(out, "capabilities:")?;
                for capability in session.capabilities.iter() {
                    writeln!(out, "  {:<18} {}", capability.tag(), capability.uri())?;
                }
            }
        }
        Ok(())
    }

    /// Print one RPC reply
    ///
    /// # Errors
    ///
    /// Fails when `out` cannot be written.
    pub fn display_reply<W: Write>(&self, reply: &RpcResponse, out: &mut W) -> CliResult<()> {
        match self.format {
            OutputFormat::Json => {
                let value = json!({
                    "message_id": reply.message_id,
                    "ok": reply.is_ok(),
                    "elapsed_ms": reply.elapsed.as_millis() as u64,
                    "xml": reply.xml,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            }
            OutputFormat::Human => {
                writeln!(
                    out,
                    "<!-- message-id {} ({}) -->",
                    reply.message_id,
                    format_elapsed(reply.elapsed)
                )?;
                writeln!(out, "{}", reply.xml)?;
            }
        }
        Ok(())
    }

    fn display_status<W: Write>(
        &self,
        message: &str,
        value: serde_json::Value,
        out: &mut W,
    ) -> CliResult<()> {
        match self.format {
            OutputFormat::Json => writeln!(out, "{value}")?,
            OutputFormat::Human => writeln!(out, "{message}")?,
        }
        Ok(())
    }

    fn display_summary<W: Write>(
        &self,
        summary: &SchemaSummary,
        dir: &Path,
        out: &mut W,
    ) -> CliResult<()> {
        match self.format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?,
            OutputFormat::Human => writeln!(
                out,
                "downloaded {} of {} modules to {} ({} failed)",
                summary.fetched,
                summary.total,
                dir.display(),
                summary.failed
            )?,
        }
        Ok(())
    }

    fn display_notification<W: Write>(&self, xml: &str, out: &mut W) -> CliResult<()> {
        match self.format {
            OutputFormat::Json => writeln!(out, "{}", json!({ "notification": xml }))?,
            OutputFormat::Human => writeln!(out, "{xml}")?,
        }
        out.flush()?;
        Ok(())
    }
}

/// Read a request from `source`, `-` meaning standard input
///
/// # Errors
///
/// Fails on I/O errors and for an empty request.
pub async fn read_request(source: &str) -> CliResult<String> {
    let request = if source == "-" {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        tokio::fs::read_to_string(source).await?
    };
    if request.trim().is_empty() {
        return Err(CliError::InvalidArguments(format!("request {source} is empty")));
    }
    Ok(request)
}
