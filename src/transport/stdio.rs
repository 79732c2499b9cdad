//! Line-delimited stdio transport (component C2).
//!
//! Frames one JSON-RPC envelope per newline-terminated line over a pair of
//! injected byte streams. Reads and writes are guarded by two independent
//! locks so a blocked `read_message` (waiting on an idle stdin) can never
//! stall a concurrent `write_message` — a single combined lock would
//! deadlock the writer while the reader sleeps on stdin.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::message::{error_code, ErrorObject, Message, MessageError};
use crate::transport::RequestHandler;

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin closed")]
    StdinClosed,
    #[error("empty line")]
    EmptyLine,
    #[error(transparent)]
    Parse(#[from] MessageError),
    #[error("closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Line-delimited JSON-RPC transport over an injected reader and writer.
pub struct StdioTransport<R, W> {
    reader: Mutex<Lines<BufReader<R>>>,
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(input).lines()),
            writer: Mutex::new(output),
            closed: AtomicBool::new(false),
        }
    }

    /// Read and decode the next envelope. Blocks only on the input stream
    /// and the read lock; never blocked by a concurrent write.
    pub async fn read_message(&self) -> Result<Message, StdioError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StdioError::Closed);
        }

        let mut lines = self.reader.lock().await;
        let line = lines.next_line().await?.ok_or(StdioError::StdinClosed)?;
        drop(lines);

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(StdioError::EmptyLine);
        }

        Ok(Message::decode(trimmed)?)
    }

    /// Serialize and write one envelope followed by a single newline, in one
    /// critical section. Blocks only on the output stream and the write
    /// lock; never blocked by a concurrent read.
    pub async fn write_message(&self, message: &Message) -> Result<(), StdioError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StdioError::Closed);
        }

        let mut text = message.encode()?;
        text.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Idempotent. Does not close the underlying streams (they were
    /// injected, not owned exclusively for lifecycle purposes).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Read-handle-write loop. Runs until stdin is closed or the transport
    /// is closed locally.
    pub async fn serve(&self, handler: &dyn RequestHandler) -> Result<(), StdioError> {
        loop {
            let message = match self.read_message().await {
                Ok(message) => message,
                Err(StdioError::StdinClosed) => return Ok(()),
                Err(StdioError::Closed) => return Ok(()),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read stdio message, continuing");
                    continue;
                }
            };

            let request_id = message.id.clone();
            match handler.handle(message).await {
                Ok(Some(response)) => {
                    if let Err(err) = self.write_message(&response).await {
                        tracing::error!(error = %err, "failed to write stdio response");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    let response = Message::error_response(
                        request_id,
                        ErrorObject::new(error_code::INTERNAL_ERROR, err.to_string()),
                    );
                    if let Err(write_err) = self.write_message(&response).await {
                        tracing::error!(error = %write_err, "failed to write stdio error response");
                    }
                }
            }
        }
    }
}
