//! Framed transport over async reader/writer pairs.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use drover_core::transport::{Transport, TransportError, TransportResult};

/// Newline-delimited JSON framing over an arbitrary reader/writer pair.
///
/// One message per line; the `\n` terminator is stripped on read and
/// appended on write. The reader and writer halves are each behind a
/// `tokio::sync::Mutex` so reads never block writes and a single write
/// (payload, terminator, flush) is atomic with respect to other writes.
pub struct FramedTransport<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<R, W> std::fmt::Debug for FramedTransport<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a framed transport over the given halves.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<R, W> Transport for FramedTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    async fn read(&self, cancel: &CancellationToken) -> TransportResult<Bytes> {
        self.check_open()?;
        let mut reader = self.reader.lock().await;

        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = tokio::select! {
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
                res = reader.read_line(&mut line) => {
                    res.map_err(|e| TransportError::Io(e.to_string()))?
                }
            };

            if bytes_read == 0 {
                self.closed.store(true, Ordering::SeqCst);
                return Err(TransportError::Closed);
            }

            // A final line without its terminator means the peer hung up
            // mid-frame; treat it as EOF rather than a message.
            if !line.ends_with('\n') {
                self.closed.store(true, Ordering::SeqCst);
                return Err(TransportError::Closed);
            }

            let frame = line.trim_end_matches(['\n', '\r']);
            if frame.is_empty() {
                continue;
            }

            trace!(len = frame.len(), "frame received");
            return Ok(Bytes::copy_from_slice(frame.as_bytes()));
        }
    }

    async fn write(&self, message: &[u8], cancel: &CancellationToken) -> TransportResult<()> {
        self.check_open()?;
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(message)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        trace!(len = message.len(), "frame sent");
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let mut writer = self.writer.lock().await;
            let _ = writer.flush().await;
        }
    }
}

/// Framed transport over the current process's stdin/stdout.
pub type StdioTransport = FramedTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    /// Create a transport over process stdio.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn transport_from(input: &str) -> FramedTransport<BufReader<Cursor<Vec<u8>>>, Vec<u8>> {
        FramedTransport::new(
            BufReader::new(Cursor::new(input.as_bytes().to_vec())),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn read_strips_terminator() {
        let t = transport_from("{\"jsonrpc\":\"2.0\"}\n");
        let cancel = CancellationToken::new();
        let frame = t.read(&cancel).await.unwrap();
        assert_eq!(&frame[..], br#"{"jsonrpc":"2.0"}"#);
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let t = transport_from("\n\n{\"a\":1}\n");
        let cancel = CancellationToken::new();
        let frame = t.read(&cancel).await.unwrap();
        assert_eq!(&frame[..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn eof_yields_closed() {
        let t = transport_from("");
        let cancel = CancellationToken::new();
        assert_eq!(t.read(&cancel).await.unwrap_err(), TransportError::Closed);
        // And it stays closed.
        assert_eq!(t.read(&cancel).await.unwrap_err(), TransportError::Closed);
    }

    #[tokio::test]
    async fn partial_final_line_yields_closed() {
        let t = transport_from("{\"truncated\":");
        let cancel = CancellationToken::new();
        assert_eq!(t.read(&cancel).await.unwrap_err(), TransportError::Closed);
    }

    #[tokio::test]
    async fn crlf_terminator_is_stripped() {
        let t = transport_from("{\"a\":1}\r\n");
        let cancel = CancellationToken::new();
        let frame = t.read(&cancel).await.unwrap();
        assert_eq!(&frame[..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn write_appends_terminator() {
        let t = FramedTransport::new(
            BufReader::new(Cursor::new(Vec::new())),
            Vec::new(),
        );
        let cancel = CancellationToken::new();
        t.write(br#"{"id":1}"#, &cancel).await.unwrap();
        t.write(br#"{"id":2}"#, &cancel).await.unwrap();
        let written = t.writer.into_inner();
        assert_eq!(&written[..], b"{\"id\":1}\n{\"id\":2}\n");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_reads() {
        let t = transport_from("{\"a\":1}\n");
        let cancel = CancellationToken::new();
        t.close().await;
        t.close().await;
        assert_eq!(t.read(&cancel).await.unwrap_err(), TransportError::Closed);
        assert_eq!(
            t.write(b"{}", &cancel).await.unwrap_err(),
            TransportError::Closed
        );
    }

    #[tokio::test]
    async fn cancelled_token_aborts_read() {
        // A pending duplex stream never produces a line, so only the
        // cancellation branch can complete the select.
        let (client, _server) = tokio::io::duplex(64);
        let (read_half, write_half) = tokio::io::split(client);
        let t = FramedTransport::new(BufReader::new(read_half), write_half);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            t.read(&cancel).await.unwrap_err(),
            TransportError::Cancelled
        );
    }
}
