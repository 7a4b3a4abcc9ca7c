//! Configuration for nbsync.
//!
//! Read from `~/.nbsync/config.toml` (or the file named by `NBSYNC_CONFIG`).
//! A missing file is not an error; every field has a default.
//!
//! ```toml
//! [server]
//! host = "localhost"
//! port = 9999
//! python = "python"
//! entry = "${HOME}/nblyzer/nblyzer_server.py"
//! startup_window_ms = 500
//! auto_start = true
//! stop_on_exit = false
//!
//! [analyses]
//! active = ["Stale Cells Analysis"]
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nbsync_types::{ActiveAnalyses, Analysis};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "NBSYNC_CONFIG";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 9999;
const DEFAULT_PYTHON: &str = "python";
const DEFAULT_STARTUP_WINDOW_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NbsyncConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub analyses: AnalysesConfig,
}

/// Where the analysis server listens and how to start it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Interpreter used to run the server entry point. Resolved on `PATH`.
    pub python: String,
    /// Server entry point, passed as the only positional argument.
    pub entry: Option<PathBuf>,
    pub startup_window_ms: u64,
    /// Start the server when the first `open_notebook` finds nobody listening.
    pub auto_start: bool,
    /// Send `close` to the server when the bridge exits.
    pub stop_on_exit: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            python: DEFAULT_PYTHON.to_string(),
            entry: None,
            startup_window_ms: DEFAULT_STARTUP_WINDOW_MS,
            auto_start: true,
            stop_on_exit: false,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn startup_window(&self) -> Duration {
        Duration::from_millis(self.startup_window_ms)
    }

    fn expand(&mut self) {
        self.host = expand_env_vars(&self.host);
        self.python = expand_env_vars(&self.python);
        if let Some(entry) = &self.entry {
            self.entry = Some(PathBuf::from(expand_env_vars(&entry.to_string_lossy())));
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysesConfig {
    /// Analyses active at startup, by display name.
    #[serde(default)]
    pub active: Vec<String>,
}

impl AnalysesConfig {
    /// Resolve configured names against the catalog. Unknown names are
    /// skipped with a warning.
    #[must_use]
    pub fn initial(&self) -> ActiveAnalyses {
        let known = self.active.iter().filter_map(|name| match name.parse::<Analysis>() {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::warn!("Ignoring configured analysis: {e}");
                None
            }
        });
        ActiveAnalyses::new(known)
    }
}

impl NbsyncConfig {
    /// Load the config file. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        config.server.expand();
        Ok(config)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Directory holding the config file and the `logs/` directory.
    #[must_use]
    pub fn home_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".nbsync"))
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    NbsyncConfig::home_dir().map(|dir| dir.join("config.toml"))
}

/// Replace `${VAR}` references with the variable's value (empty if unset).
/// An unterminated `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + len];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + len + 1..];
    }

    out.push_str(rest);
    out
}
