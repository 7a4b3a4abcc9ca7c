//! Host bridge messages, one JSON object per line.

use nbsync_client::{CellDiagnostic, PickItem};
use nbsync_types::{CellKind, CellSnapshot, CellUri};
use serde::{Deserialize, Serialize};

/// A message from the editor host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Open {
        notebook: String,
        #[serde(default)]
        cells: Vec<HostCell>,
    },
    CellsChanged {
        notebook: String,
        changes: Vec<HostCellChange>,
    },
    CellsInserted {
        notebook: String,
        index: usize,
        cells: Vec<HostCell>,
    },
    CellsRemoved {
        notebook: String,
        start: usize,
        count: usize,
    },
    SelectionChanged {
        notebook: String,
    },
    Close {
        notebook: String,
    },
    ShowAnalyses,
    /// `selection: null` (or absent) means the user dismissed the picker.
    ChooseAnalyses {
        #[serde(default)]
        selection: Option<Vec<String>>,
    },
    Status,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostCell {
    pub kind: CellKind,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub source: String,
}

fn default_language() -> String {
    "python".to_string()
}

impl From<HostCell> for CellSnapshot {
    fn from(cell: HostCell) -> Self {
        Self {
            cell_type: cell.kind,
            language: cell.language,
            source: cell.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostCellChange {
    pub index: usize,
    /// New text; absent when only the execution state changed.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub execution: Option<HostExecution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HostExecution {
    pub success: bool,
}

/// A message to the editor host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    SetDiagnostics {
        cell: CellUri,
        items: Vec<MarkerItem>,
    },
    ClearDiagnostics {
        cell: CellUri,
    },
    Notify {
        level: NotifyLevel,
        message: String,
    },
    AnalysisCatalog {
        items: Vec<CatalogItem>,
    },
    Status {
        text: String,
        total: usize,
        /// One `<cell> <line>:<col>: <severity>: [<source>] <message>` per marker.
        lines: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerItem {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub severity: &'static str,
    pub source: String,
    pub message: String,
}

impl From<&CellDiagnostic> for MarkerItem {
    fn from(diag: &CellDiagnostic) -> Self {
        let range = diag.range();
        Self {
            start_line: range.start_line,
            start_col: range.start_col,
            end_line: range.end_line,
            end_col: range.end_col,
            severity: diag.severity().label(),
            source: diag.source().to_string(),
            message: diag.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub name: &'static str,
    pub description: &'static str,
    pub picked: bool,
}

impl From<PickItem> for CatalogItem {
    fn from(item: PickItem) -> Self {
        Self {
            name: item.label(),
            description: item.detail(),
            picked: item.picked,
        }
    }
}
