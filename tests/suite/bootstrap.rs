//! Starting the analysis server when the first open finds nobody listening

use nbsync_client::{
    DiagnosticsStore, LaunchFuture, ProcessLauncher, Reconciler, ServerLauncher, TcpConnector,
};
use nbsync_types::{ActiveAnalyses, Analysis};
use serde_json::json;

use crate::common::{FakeAnalysisServer, RecordingNotifier, Reply, free_port, sample_notebook};

/// Brings the fake server up on a reserved port when asked to start.
struct InProcessLauncher {
    port: u16,
    starts: usize,
    server: Option<FakeAnalysisServer>,
}

impl ServerLauncher for InProcessLauncher {
    fn start(&mut self) -> LaunchFuture<'_> {
        Box::pin(async move {
            self.starts += 1;
            let server = FakeAnalysisServer::on_port(self.port, |_| {
                Reply::Json(json!({ "status": "success" }))
            })
            .await;
            self.server = Some(server);
            Ok(())
        })
    }
}

fn reconciler<L: ServerLauncher>(
    port: u16,
    launcher: L,
) -> Reconciler<TcpConnector, L, DiagnosticsStore, RecordingNotifier> {
    Reconciler::new(
        TcpConnector::new("127.0.0.1", port),
        launcher,
        DiagnosticsStore::new(),
        RecordingNotifier::default(),
        ActiveAnalyses::new([Analysis::StaleCells]),
    )
}

#[tokio::test]
async fn open_starts_server_and_retries_once() {
    let port = free_port();
    let launcher = InProcessLauncher {
        port,
        starts: 0,
        server: None,
    };
    let mut r = reconciler(port, launcher);
    let nb = sample_notebook("/work/train.ipynb");

    r.open_document(&nb).await;

    assert_eq!(r.launcher().starts, 1);
    assert!(r.notifier().errors.is_empty());
    let server = r.launcher().server.as_ref().unwrap();
    assert_eq!(server.events(), ["open_notebook", "add_active_analyses"]);
}

#[tokio::test]
async fn disabled_auto_start_reports_once() {
    let port = free_port();
    let mut r = reconciler(port, ProcessLauncher::disabled());

    r.open_document(&sample_notebook("/work/train.ipynb")).await;

    assert_eq!(r.notifier().errors.len(), 1);
    assert!(r.notifier().errors[0].starts_with("Problem starting analysis server"));
}

#[cfg(unix)]
mod process {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn script(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{body}").unwrap();
        file
    }

    #[tokio::test]
    async fn noisy_startup_is_one_error_without_retry() {
        let entry = script("echo 'OSError: [Errno 98] Address already in use' >&2\nsleep 5");
        let launcher = ProcessLauncher::new(
            "sh",
            Some(entry.path().to_path_buf()),
            Duration::from_secs(2),
        );
        let mut r = reconciler(free_port(), launcher);

        r.open_document(&sample_notebook("/work/train.ipynb")).await;

        let errors = &r.notifier().errors;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Problem starting analysis server"));
        assert!(errors[0].contains("Address already in use"));
    }

    #[tokio::test]
    async fn started_but_silent_server_fails_the_retry() {
        let entry = script("sleep 2");
        let launcher = ProcessLauncher::new(
            "sh",
            Some(entry.path().to_path_buf()),
            Duration::from_millis(100),
        );
        let mut r = reconciler(free_port(), launcher);

        r.open_document(&sample_notebook("/work/train.ipynb")).await;

        let errors = &r.notifier().errors;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Analysis server isn't running"));
        assert!(r.launcher_mut().is_running());
    }
}
