//! File logging for the bridge binary.
//!
//! stdout is the host protocol stream, so logs only ever go to a file. The
//! first writable location wins:
//!
//! 1. `$NBSYNC_LOG_FILE`
//! 2. `~/.nbsync/logs/nbsync.log`
//! 3. `./.nbsync/logs/nbsync.log`
//!
//! With none writable the subscriber is installed without an output layer.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use nbsync_config::NbsyncConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_FILE_ENV_VAR: &str = "NBSYNC_LOG_FILE";

/// Our crates at info, everything else (tokio internals) at warn.
const DEFAULT_DIRECTIVES: &str = "warn,nbsync=info,nbsync_client=info,nbsync_config=info";

struct OpenedLog {
    path: PathBuf,
    file: File,
}

/// Result of walking the candidates: the file that opened, plus what went
/// wrong on the way there. The failures are logged once logging is up.
#[derive(Default)]
struct LogSetup {
    opened: Option<OpenedLog>,
    failures: Vec<String>,
}

pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let explicit = std::env::var_os(LOG_FILE_ENV_VAR).map(PathBuf::from);
    let setup = open_first_writable(candidates(explicit, NbsyncConfig::home_dir()));

    let Some(OpenedLog { path, file }) = setup.opened else {
        tracing_subscriber::registry().with(filter).init();
        return;
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();

    tracing::info!(
        path = %path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "nbsync logging started"
    );
    for failure in setup.failures {
        tracing::warn!("{failure}");
    }
}

fn candidates(explicit: Option<PathBuf>, nbsync_home: Option<PathBuf>) -> Vec<PathBuf> {
    let local = PathBuf::from(".nbsync");
    explicit
        .into_iter()
        .chain([nbsync_home, Some(local)].into_iter().flatten().map(|dir| {
            dir.join("logs").join("nbsync.log")
        }))
        .collect()
}

fn open_first_writable(candidates: Vec<PathBuf>) -> LogSetup {
    let mut setup = LogSetup::default();
    for path in candidates {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty())
            && let Err(e) = fs::create_dir_all(dir)
        {
            setup
                .failures
                .push(format!("cannot create log directory {}: {e}", dir.display()));
            continue;
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                setup.opened = Some(OpenedLog { path, file });
                break;
            }
            Err(e) => setup
                .failures
                .push(format!("cannot open log file {}: {e}", path.display())),
        }
    }
    setup
}
