//! Capture of the server's SSH identification line.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::oneshot;

/// RFC 4253 limit for the identification line, excluding CR LF
const MAX_LINE: usize = 255;

pin_project! {
    /// Passes a stream through unchanged while watching the first lines the
    /// peer sends for its `SSH-` identification string.
    #[derive(Debug)]
    pub(crate) struct GreetingSniffer<S> {
        #[pin]
        inner: S,
        line: Vec<u8>,
        sink: Option<oneshot::Sender<String>>,
    }
}

impl<S> GreetingSniffer<S> {
    pub(crate) fn new(inner: S, sink: oneshot::Sender<String>) -> Self {
        Self {
            inner,
            line: Vec::new(),
            sink: Some(sink),
        }
    }
}

impl<S: AsyncRead> AsyncRead for GreetingSniffer<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let result = this.inner.poll_read(cx, buf);

        if this.sink.is_some() {
            for &byte in &buf.filled()[before..] {
                if byte != b'\n' {
                    if this.line.len() < MAX_LINE {
                        this.line.push(byte);
                    }
                    continue;
                }
                let text = String::from_utf8_lossy(&this.line[..])
                    .trim_end_matches('\r')
                    .to_string();
                this.line.clear();
                // Servers may send other lines before the identification string.
                if text.starts_with("SSH-") {
                    if let Some(sink) = this.sink.take() {
                        let _ = sink.send(text);
                    }
                    break;
                }
            }
        }
        result
    }
}

impl<S: AsyncWrite> AsyncWrite for GreetingSniffer<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_captures_identification_after_preamble() {
        let stream: &[u8] = b"Welcome\r\nSSH-2.0-OpenSSH_9.6\r\n\x00\x00binary";
        let (tx, rx) = oneshot::channel();
        let mut sniffer = GreetingSniffer::new(stream, tx);

        let mut out = Vec::new();
        sniffer.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, stream);
        assert_eq!(rx.await.unwrap(), "SSH-2.0-OpenSSH_9.6");
    }

    #[tokio::test]
    async fn test_identification_split_across_reads() {
        let (client, mut server) = tokio::io::duplex(64);
        let (tx, mut rx) = oneshot::channel();
        let mut sniffer = GreetingSniffer::new(client, tx);

        tokio::io::AsyncWriteExt::write_all(&mut server, b"SSH-2.0-Cis").await.unwrap();
        let mut buf = [0u8; 64];
        let n = sniffer.read(&mut buf).await.unwrap();
        assert_eq!(n, 11);
        assert!(rx.try_recv().is_err());

        tokio::io::AsyncWriteExt::write_all(&mut server, b"co-1.25\r\n").await.unwrap();
        sniffer.read(&mut buf).await.unwrap();
        assert_eq!(rx.await.unwrap(), "SSH-2.0-Cisco-1.25");
    }
}
