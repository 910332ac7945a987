//! Interactive password prompt

use netconf_transport::{BoxFuture, PasswordPrompt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Asks for passwords on stderr and reads them, one per line, from `R`.
///
/// Input is echoed; pass `--password` or `NETCONF_PASSWORD` for
/// unattended use.
pub struct LinePrompt<R, W> {
    io: Mutex<(R, W)>,
}

impl<R, W> std::fmt::Debug for LinePrompt<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinePrompt").finish_non_exhaustive()
    }
}

/// Prompt reading standard input
pub type StdinPrompt = LinePrompt<BufReader<tokio::io::Stdin>, tokio::io::Stderr>;

impl StdinPrompt {
    /// Prompt on the process's terminal streams
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R, W> LinePrompt<R, W> {
    /// Prompt writing to `writer` and reading from `reader`
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl<R, W> PasswordPrompt for LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn prompt<'a>(&'a self, message: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut io = self.io.lock().await;
            let (reader, writer) = &mut *io;
            writer.write_all(message.as_bytes()).await.ok()?;
            writer.flush().await.ok()?;

            let mut line = String::new();
            if reader.read_line(&mut line).await.ok()? == 0 {
                return None;
            }
            let password = line.trim_end_matches(['\r', '\n']);
            (!password.is_empty()).then(|| password.to_string())
        })
    }
}
