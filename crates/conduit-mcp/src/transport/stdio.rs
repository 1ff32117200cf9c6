//! Stdio Transport
//!
//! Newline-delimited JSON over a byte-stream pair. Reads accumulate in a
//! buffered reader, so a message split across any number of reads is
//! assembled before decoding; partial trailing bytes simply stay in the
//! buffer. Each non-blank line decodes as one JSON-RPC message. Decode
//! failures surface through `handle_error` with the offending payload and
//! the loop keeps going; EOF fires `handle_close` exactly once.
//!
//! Outbound traffic funnels through a single writer task per transport:
//! `send` enqueues, the writer serializes each message, appends `\n`, and
//! flushes. Callers never touch the underlying stream.
//!
//! The reader and writer are generic so tests can inject scripted pipes;
//! production uses stdin/stdout.

// Layer 1: Standard library imports
use std::fmt::Debug;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::protocol::{
    JsonRpcMessage, MessageContext, MessageHandler, Transport, TransportError,
};
use async_trait::async_trait;

/// Default reader for production use
pub type DefaultStdin = BufReader<Stdin>;

/// Default writer for production use
pub type DefaultStdout = Stdout;

/// Capacity of the outbound queue feeding the writer task
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Session id used when none is configured; stdio carries one logical
/// session for the life of the process connection.
const STDIO_SESSION_ID: &str = "stdio";

/// Stdio transport over generic async reader/writer halves
///
/// Built pre-configured with its [`MessageHandler`]; `start` spawns the
/// read loop and the single writer task, `close` tears both down.
pub struct StdioTransport<R = DefaultStdin, W = DefaultStdout>
where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    message_handler: Arc<dyn MessageHandler>,
    session_id: String,

    /// Injected I/O; `None` means stdin/stdout at start time
    reader: Option<R>,
    writer: Option<W>,

    /// Sender half of the outbound queue
    outbound_tx: mpsc::Sender<JsonRpcMessage>,
    /// Receiver half, consumed by the writer task at start
    outbound_rx: Option<mpsc::Receiver<JsonRpcMessage>>,

    shutdown_tx: Option<broadcast::Sender<()>>,
    reader_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<()>>,
    is_running: bool,
}

impl<R, W> Debug for StdioTransport<R, W>
where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("session_id", &self.session_id)
            .field("is_running", &self.is_running)
            .finish()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    /// Clone of the outbound queue sender
    ///
    /// Server wiring hands this to the dispatcher so responses flow
    /// through the same single writer task as everything else.
    pub fn sender(&self) -> mpsc::Sender<JsonRpcMessage> {
        self.outbound_tx.clone()
    }

    /// Wait until the background reader finishes (EOF or shutdown)
    pub async fn wait_for_completion(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.reader_task.take() {
            task.await.map_err(|e| {
                TransportError::connection(format!("reader task failed: {e}"))
            })?;
            self.is_running = false;
        }
        Ok(())
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    type Error = TransportError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        if self.is_running {
            return Err(TransportError::invalid_state(
                "transport already started; start may be called at most once",
            ));
        }

        let outbound_rx = self.outbound_rx.take().ok_or_else(|| {
            TransportError::invalid_state("transport was already consumed by a previous start")
        })?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handler = Arc::clone(&self.message_handler);
        let session_id = self.session_id.clone();

        self.reader_task = Some(match self.reader.take() {
            Some(reader) => tokio::spawn(read_loop(reader, handler, session_id, shutdown_rx)),
            None => {
                let reader = BufReader::new(tokio::io::stdin());
                tokio::spawn(read_loop(
                    reader,
                    Arc::clone(&self.message_handler),
                    self.session_id.clone(),
                    shutdown_tx.subscribe(),
                ))
            }
        });

        self.writer_task = Some(match self.writer.take() {
            Some(writer) => tokio::spawn(write_loop(writer, outbound_rx)),
            None => tokio::spawn(write_loop(tokio::io::stdout(), outbound_rx)),
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.is_running = true;
        debug!(session_id = %self.session_id, "stdio transport started");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        if !self.is_running {
            return Ok(());
        }

        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.reader_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.writer_task.take() {
            task.abort();
            let _ = task.await;
        }

        self.shutdown_tx = None;
        self.is_running = false;
        debug!(session_id = %self.session_id, "stdio transport closed");
        Ok(())
    }

    async fn send(&mut self, message: &JsonRpcMessage) -> Result<(), Self::Error> {
        if !self.is_running {
            return Err(TransportError::invalid_state(
                "cannot send on a transport that is not started",
            ));
        }
        self.outbound_tx
            .send(message.clone())
            .await
            .map_err(|_| TransportError::connection("outbound queue closed"))
    }

    fn session_id(&self) -> Option<String> {
        Some(self.session_id.clone())
    }

    fn is_connected(&self) -> bool {
        self.is_running
    }

    fn transport_type(&self) -> &'static str {
        "stdio"
    }
}

/// Read loop: one line, one message
///
/// `read_line` owns the rolling buffer, so a frame arriving in several
/// partial reads is assembled before this loop ever sees it.
async fn read_loop<R>(
    mut reader: R,
    handler: Arc<dyn MessageHandler>,
    session_id: String,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
{
    let mut line = String::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                handler.handle_close().await;
                break;
            }
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) => {
                        // EOF: peer closed its write half
                        handler.handle_close().await;
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            match JsonRpcMessage::from_json(trimmed) {
                                Ok(message) => {
                                    trace!(session_id = %session_id, "stdio frame decoded");
                                    let context = MessageContext::new(session_id.clone());
                                    handler.handle_message(message, context).await;
                                }
                                Err(e) => {
                                    handler
                                        .handle_error(TransportError::serialization_with_payload(
                                            e.to_string(),
                                            trimmed,
                                        ))
                                        .await;
                                }
                            }
                        }
                        line.clear();
                    }
                    Err(e) => {
                        handler.handle_error(TransportError::Io { source: e }).await;
                        handler.handle_close().await;
                        break;
                    }
                }
            }
        }
    }
}

/// Writer task: sole owner of the write half
///
/// Drains the outbound queue until every sender is gone, emitting one
/// `<json>\n` frame per message and flushing after each.
async fn write_loop<W>(mut writer: W, mut outbound_rx: mpsc::Receiver<JsonRpcMessage>)
where
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    while let Some(message) = outbound_rx.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "dropping unserializable outbound message");
                continue;
            }
        };
        if let Err(e) = write_frame(&mut writer, &json).await {
            warn!(error = %e, "stdio write failed, stopping writer");
            break;
        }
    }
}

async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    json: &str,
) -> std::io::Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Builder producing pre-configured stdio transports
///
/// The message handler is mandatory before `build`, so a started
/// transport always has somewhere to deliver events.
pub struct StdioTransportBuilder<R = DefaultStdin, W = DefaultStdout>
where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    message_handler: Option<Arc<dyn MessageHandler>>,
    reader: Option<R>,
    writer: Option<W>,
    session_id: Option<String>,
    outbound_tx: mpsc::Sender<JsonRpcMessage>,
    outbound_rx: mpsc::Receiver<JsonRpcMessage>,
}

impl StdioTransportBuilder<DefaultStdin, DefaultStdout> {
    /// Builder for the production stdin/stdout pair
    pub fn new() -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        Self {
            message_handler: None,
            reader: None,
            writer: None,
            session_id: None,
            outbound_tx,
            outbound_rx,
        }
    }
}

impl Default for StdioTransportBuilder<DefaultStdin, DefaultStdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransportBuilder<R, W>
where
    R: AsyncBufReadExt + Unpin + Send + Sync + 'static,
    W: AsyncWriteExt + Unpin + Send + Sync + 'static,
{
    /// Builder over injected I/O halves (tests, pipes)
    pub fn with_custom_io(reader: R, writer: W) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        Self {
            message_handler: None,
            reader: Some(reader),
            writer: Some(writer),
            session_id: None,
            outbound_tx,
            outbound_rx,
        }
    }

    /// Clone of the outbound queue sender, available before `build`
    ///
    /// Lets server wiring construct a dispatcher sink first and hand the
    /// resulting handler to `with_message_handler` afterwards.
    pub fn sender(&self) -> mpsc::Sender<JsonRpcMessage> {
        self.outbound_tx.clone()
    }

    /// Set the message handler (required)
    pub fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.message_handler = Some(handler);
        self
    }

    /// Override the session id (defaults to `"stdio"`)
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Build the transport
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidState`] when no handler was configured.
    pub fn build(self) -> Result<StdioTransport<R, W>, TransportError> {
        let handler = self.message_handler.ok_or_else(|| {
            TransportError::invalid_state("message handler must be set before building")
        })?;

        let (outbound_tx, outbound_rx) = (self.outbound_tx, self.outbound_rx);

        Ok(StdioTransport {
            message_handler: handler,
            session_id: self.session_id.unwrap_or_else(|| STDIO_SESSION_ID.to_string()),
            reader: self.reader,
            writer: self.writer,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            shutdown_tx: None,
            reader_task: None,
            writer_task: None,
            is_running: false,
        })
    }
}
