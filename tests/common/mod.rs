//! Shared test utilities and fixtures
//!
//! An in-process analysis server plus host-side doubles for driving the
//! reconciler end to end.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use nbsync_client::codec::FrameReader;
use nbsync_client::{
    InMemoryNotebook, LaunchError, LaunchFuture, Notifier, ServerLauncher, TcpConnector,
};
use nbsync_types::{CellKind, CellSnapshot, NotebookKey};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the fake server does with one request.
pub enum Reply {
    Json(Value),
    /// Raw bytes, e.g. the plain-text farewell to `close`.
    Text(&'static str),
    /// Drop the connection without answering.
    HangUp,
}

type Responder = dyn Fn(&Value) -> Reply + Send + Sync;

/// Analysis server double: one request per connection, every request logged.
pub struct FakeAnalysisServer {
    port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl FakeAnalysisServer {
    /// Serve on an ephemeral port, answering every request with `success`.
    pub async fn start() -> Self {
        Self::with_responder(|_| Reply::Json(json!({ "status": "success" }))).await
    }

    pub async fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        Self::serve(listener, Arc::new(responder))
    }

    /// Serve on a specific port, for tests that reserve one up front.
    pub async fn on_port<F>(port: u16, responder: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        Self::serve(listener, Arc::new(responder))
    }

    fn serve(listener: TcpListener, responder: Arc<Responder>) -> Self {
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let request = {
                    let mut reader = FrameReader::new(&mut socket);
                    match reader.read_frame().await {
                        Ok(Some(request)) => request,
                        _ => continue,
                    }
                };
                log.lock().unwrap().push(request.clone());
                match responder(&request) {
                    Reply::Json(body) => {
                        let bytes = serde_json::to_vec(&body).unwrap();
                        let _ = socket.write_all(&bytes).await;
                    }
                    Reply::Text(text) => {
                        let _ = socket.write_all(text.as_bytes()).await;
                    }
                    Reply::HangUp => {}
                }
                let _ = socket.shutdown().await;
            }
        });

        Self {
            port,
            requests,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new("127.0.0.1", self.port)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

impl Drop for FakeAnalysisServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A port nothing is listening on (at the time of the call).
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Notifier for RecordingNotifier {
    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

/// Launcher for tests that expect the server to be up already.
pub struct NoLauncher;

impl ServerLauncher for NoLauncher {
    fn start(&mut self) -> LaunchFuture<'_> {
        Box::pin(std::future::ready(Err(LaunchError::Disabled)))
    }
}

pub fn code(source: &str) -> CellSnapshot {
    CellSnapshot {
        cell_type: CellKind::Code,
        language: "python".to_string(),
        source: source.to_string(),
    }
}

pub fn markdown(source: &str) -> CellSnapshot {
    CellSnapshot {
        cell_type: CellKind::Markup,
        language: "markdown".to_string(),
        source: source.to_string(),
    }
}

/// A small data-science notebook with a markdown header.
pub fn sample_notebook(path: &str) -> InMemoryNotebook {
    InMemoryNotebook::new(
        NotebookKey::new(path),
        [
            markdown("# Load"),
            code("import pandas as pd\ndf = pd.read_csv('train.csv')"),
            code("x = df['a']\ny = x + 1"),
        ],
    )
}
