//! Framing codec for the analysis server connection.
//!
//! Each message is one JSON document with no header and no delimiter. JSON
//! is self-delimiting, so the reader decodes incrementally until a complete
//! value is available instead of waiting for the peer to close the socket.
//! This module provides [`FrameReader`] and [`FrameWriter`].

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed in the middle of a message")]
    Truncated,
    #[error("message exceeds maximum of {MAX_FRAME_BYTES} bytes")]
    TooLarge,
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads self-delimited JSON frames from an async reader.
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Read the next JSON frame.
    ///
    /// Returns `Ok(None)` on EOF before any non-whitespace byte (clean shutdown).
    pub async fn read_frame(&mut self) -> Result<Option<Value>, FrameError> {
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        loop {
            if let Some(value) = self.try_decode()? {
                return Ok(Some(value));
            }

            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.iter().all(u8::is_ascii_whitespace) {
                    self.buf.clear();
                    return Ok(None);
                }
                return Err(FrameError::Truncated);
            }

            self.buf.extend_from_slice(&chunk[..n]);
            if self.buf.len() > MAX_FRAME_BYTES {
                return Err(FrameError::TooLarge);
            }
        }
    }

    /// Decode one value from the buffered bytes, draining what it consumed.
    /// `Ok(None)` means more bytes are needed.
    fn try_decode(&mut self) -> Result<Option<Value>, FrameError> {
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                self.buf.drain(..consumed);
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(FrameError::Json(e)),
            None => Ok(None),
        }
    }
}

/// Writes JSON frames to an async writer.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one compact JSON frame and flush it.
    pub async fn write_frame(&mut self, msg: &Value) -> Result<(), FrameError> {
        let body = serde_json::to_vec(msg)?;
        self.writer.write_all(&body).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
