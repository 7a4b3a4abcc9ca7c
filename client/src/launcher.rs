//! Server bootstrap: starts the analysis process when nobody is listening.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Extra stderr lines arriving this close together are folded into one report.
const STDERR_GRACE_MS: u64 = 100;

pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LaunchError>> + Send + 'a>>;

/// Starts the external analysis server.
pub trait ServerLauncher: Send {
    fn start(&mut self) -> LaunchFuture<'_>;
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("automatic server start is disabled")]
    Disabled,
    #[error("no server entry point configured ([server] entry)")]
    MissingEntry,
    #[error("{python} not found in PATH: {source}")]
    InterpreterNotFound {
        python: String,
        source: which::Error,
    },
    #[error("spawning {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("{0}")]
    EarlyFailure(String),
    #[error("watching server startup: {0}")]
    Io(#[from] io::Error),
}

/// Spawns `<python> <entry>` and watches it for the startup window.
#[derive(Debug)]
pub struct ProcessLauncher {
    python: String,
    entry: Option<PathBuf>,
    startup_window: Duration,
    enabled: bool,
    /// Held so the server is not reaped while this process runs.
    child: Option<Child>,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(python: impl Into<String>, entry: Option<PathBuf>, startup_window: Duration) -> Self {
        Self {
            python: python.into(),
            entry,
            startup_window,
            enabled: true,
            child: None,
        }
    }

    /// A launcher whose `start` always fails with [`LaunchError::Disabled`].
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            python: String::new(),
            entry: None,
            startup_window: Duration::ZERO,
            enabled: false,
            child: None,
        }
    }

    /// Whether a server started by this launcher is still alive.
    pub fn is_running(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    async fn spawn_and_watch(&mut self) -> Result<(), LaunchError> {
        if !self.enabled {
            return Err(LaunchError::Disabled);
        }
        let entry = self.entry.as_ref().ok_or(LaunchError::MissingEntry)?;
        let program =
            which::which(&self.python).map_err(|source| LaunchError::InterpreterNotFound {
                python: self.python.clone(),
                source,
            })?;

        tracing::info!(
            program = %program.display(),
            entry = %entry.display(),
            "Starting analysis server"
        );

        let mut child = Command::new(&program)
            .arg(entry)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("no stderr from child"))?;
        let mut stderr_lines = BufReader::new(stderr).lines();
        let deadline = Instant::now() + self.startup_window;

        match tokio::time::timeout_at(deadline, stderr_lines.next_line()).await {
            // Quiet for the whole window.
            Err(_) => {}
            Ok(Ok(Some(first))) => {
                let mut report = vec![first];
                let grace = Duration::from_millis(STDERR_GRACE_MS);
                while let Ok(Ok(Some(line))) =
                    tokio::time::timeout(grace, stderr_lines.next_line()).await
                {
                    report.push(line);
                }
                let _ = child.start_kill();
                return Err(LaunchError::EarlyFailure(report.join("\n")));
            }
            Ok(Ok(None)) => {
                // stderr closed early; the process is usually on its way out.
                if let Ok(status) = tokio::time::timeout_at(deadline, child.wait()).await {
                    let status = status?;
                    return Err(LaunchError::EarlyFailure(format!(
                        "analysis server exited during startup ({status})"
                    )));
                }
            }
            Ok(Err(e)) => return Err(LaunchError::Io(e)),
        }

        if let Ok(Some(status)) = child.try_wait() {
            return Err(LaunchError::EarlyFailure(format!(
                "analysis server exited during startup ({status})"
            )));
        }

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, "stdout"));
        }
        tokio::spawn(async move {
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                tracing::debug!(stream = "stderr", "analysis server: {line}");
            }
        });

        tracing::info!(pid = child.id().unwrap_or_default(), "Analysis server started");
        self.child = Some(child);
        Ok(())
    }
}

async fn forward_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(stream, "analysis server: {line}");
    }
}

impl ServerLauncher for ProcessLauncher {
    fn start(&mut self) -> LaunchFuture<'_> {
        Box::pin(self.spawn_and_watch())
    }
}
