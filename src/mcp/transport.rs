//! MCP transport layer.
//!
//! Newline-delimited framing over any byte stream. `StdioTransport` is the
//! stdin/stdout instantiation used by the binary; tests drive the same code
//! over in-memory pipes.

use async_trait::async_trait;
use std::io;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};

/// Lines read ahead of the engine. The engine still handles them one at a time.
const READ_AHEAD: usize = 16;

/// Replies queued for the writer task.
const WRITE_QUEUE: usize = 64;

/// Inbound lines (or read failures) and the outbound line queue.
pub type Channels = (mpsc::Receiver<io::Result<String>>, mpsc::Sender<String>);

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send {
    /// Start the transport, returning channels for inbound and outbound lines.
    ///
    /// The inbound channel yields one item per non-blank line, forwards read
    /// failures, and closes at end of input.
    async fn start(&mut self) -> Result<Channels>;

    /// Stop the transport.
    ///
    /// Callers drop their outbound sender first; `stop` then waits until every
    /// queued line has been written and flushed. A failed write is returned
    /// here even if the caller never saw its send fail.
    async fn stop(&mut self) -> Result<()>;
}

/// Line transport over an arbitrary reader/writer pair.
pub struct StreamTransport<R, W> {
    reader: Option<R>,
    writer: Option<W>,
    reader_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<io::Result<()>>>,
}

/// Stdio transport for MCP.
pub type StdioTransport = StreamTransport<Stdin, Stdout>;

impl StdioTransport {
    /// Create a transport over the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            reader_task: None,
            writer_task: None,
        }
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn start(&mut self) -> Result<Channels> {
        let (Some(reader), Some(writer)) = (self.reader.take(), self.writer.take()) else {
            return Err(Error::Transport("transport already started".to_string()));
        };

        let (incoming_tx, incoming_rx) = mpsc::channel(READ_AHEAD);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(WRITE_QUEUE);

        self.reader_task = Some(tokio::spawn(read_lines(reader, incoming_tx)));
        self.writer_task = Some(tokio::spawn(write_lines(writer, outgoing_rx)));

        Ok((incoming_rx, outgoing_tx))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.writer_task.take() {
            task.await
                .map_err(|e| Error::Transport(format!("writer task failed: {}", e)))??;
        }
        Ok(())
    }
}

async fn read_lines<R>(reader: R, tx: mpsc::Sender<io::Result<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("EOF on input, stopping reader");
                break;
            }
            Ok(_) => {
                // Invalid UTF-8 still reaches the codec, which reports it as a parse error.
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if line.trim().is_empty() {
                    continue;
                }

                trace!("Received: {}", line);
                if tx.send(Ok(line.to_string())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Error reading input: {}", e);
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

/// Drain `rx` to `writer`. Returning drops `rx`, so senders observe a closed
/// channel as soon as output fails.
async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        trace!("Sending: {}", line);
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            error!("Error writing output: {}", e);
            return Err(e);
        }
    }

    writer.shutdown().await
}
