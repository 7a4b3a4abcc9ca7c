//! Connector: one short-lived TCP round trip per remote call.
//!
//! No pooling and no pipelining: every call dials the endpoint, writes one
//! request frame, waits for exactly one response frame and drops the socket.

use std::future::Future;
use std::io;
use std::pin::Pin;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::codec::{FrameError, FrameReader, FrameWriter};
use crate::protocol::{Request, ServerResponse};

pub type CallFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ServerResponse, TransportError>> + Send + 'a>>;

/// A single-shot request/response channel to the analysis server.
pub trait Connector: Send + Sync {
    fn call<'a>(&'a self, request: &'a Request) -> CallFuture<'a>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Nobody is listening, or the peer vanished mid-call.
    #[error("analysis server at {endpoint} is not reachable: {source}")]
    Unreachable { endpoint: String, source: io::Error },
    #[error("connection to {endpoint} failed: {source}")]
    Io { endpoint: String, source: io::Error },
    #[error("analysis server closed the connection without a complete reply")]
    Closed,
    #[error("analysis server sent a malformed reply: {0}")]
    Malformed(String),
}

impl TransportError {
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    fn from_io(endpoint: &str, source: io::Error) -> Self {
        let endpoint = endpoint.to_string();
        match source.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => Self::Unreachable { endpoint, source },
            _ => Self::Io { endpoint, source },
        }
    }

    fn from_frame(endpoint: &str, err: FrameError) -> Self {
        match err {
            FrameError::Io(source) => Self::from_io(endpoint, source),
            FrameError::Truncated => Self::Closed,
            FrameError::TooLarge | FrameError::Json(_) => Self::Malformed(err.to_string()),
        }
    }
}

/// Production connector dialing a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    endpoint: String,
}

impl TcpConnector {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let endpoint = format!("{host}:{port}");
        Self {
            host,
            port,
            endpoint,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn round_trip(&self, request: &Request) -> Result<ServerResponse, TransportError> {
        let frame = request
            .to_value()
            .map_err(|e| TransportError::Malformed(format!("serializing request: {e}")))?;

        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| TransportError::from_io(&self.endpoint, e))?;
        let (read_half, write_half) = stream.split();

        FrameWriter::new(write_half)
            .write_frame(&frame)
            .await
            .map_err(|e| TransportError::from_frame(&self.endpoint, e))?;

        let reply = FrameReader::new(read_half)
            .read_frame()
            .await
            .map_err(|e| TransportError::from_frame(&self.endpoint, e))?;

        match reply {
            Some(value) => Ok(ServerResponse::new(value)),
            None => Err(TransportError::Closed),
        }
    }
}

impl Connector for TcpConnector {
    fn call<'a>(&'a self, request: &'a Request) -> CallFuture<'a> {
        Box::pin(async move {
            tracing::debug!(
                event = request.event().as_str(),
                notebook = request.notebook().map(|k| k.as_str()).unwrap_or("-"),
                endpoint = %self.endpoint,
                "Sending request"
            );
            let result = self.round_trip(request).await;
            match &result {
                Ok(response) => tracing::trace!(
                    event = request.event().as_str(),
                    status = response.status().unwrap_or("?"),
                    "Server responded"
                ),
                Err(e) => tracing::debug!(event = request.event().as_str(), "Request failed: {e}"),
            }
            result
        })
    }
}
