//! Wire messages exchanged with the analysis server.
//!
//! Requests are `{event, params?, notebook_name?}` objects. Responses are kept
//! as raw JSON until the projector interprets them, so a malformed result
//! never turns into a transport failure.

use nbsync_types::{ActiveAnalyses, CellKind, CellSnapshot, NotebookKey};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Remote operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    OpenNotebook,
    AddActiveAnalyses,
    RunCell,
    ChangeCell,
    AddCell,
    RemoveCell,
    CloseNotebook,
    Close,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenNotebook => "open_notebook",
            Self::AddActiveAnalyses => "add_active_analyses",
            Self::RunCell => "run_cell",
            Self::ChangeCell => "change_cell",
            Self::AddCell => "add_cell",
            Self::RemoveCell => "remove_cell",
            Self::CloseNotebook => "close_notebook",
            Self::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    event: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notebook_name: Option<NotebookKey>,
}

impl Request {
    fn new(event: Operation, notebook: Option<&NotebookKey>, params: Option<Value>) -> Self {
        Self {
            event,
            params,
            notebook_name: notebook.cloned(),
        }
    }

    pub fn open_notebook(notebook: &NotebookKey, cells: &[CellSnapshot]) -> Self {
        Self::new(
            Operation::OpenNotebook,
            Some(notebook),
            Some(json!({ "notebook_json": cells })),
        )
    }

    pub fn add_active_analyses(notebook: &NotebookKey, active: &ActiveAnalyses) -> Self {
        Self::new(
            Operation::AddActiveAnalyses,
            Some(notebook),
            Some(json!({ "active_analyses": active.names() })),
        )
    }

    pub fn run_cell(notebook: &NotebookKey, index: usize, code: &str) -> Self {
        Self::new(
            Operation::RunCell,
            Some(notebook),
            Some(json!({ "changed_cell_id": index, "changed_cell_code": code })),
        )
    }

    /// `with_result` travels as `0`/`1`.
    pub fn change_cell(
        notebook: &NotebookKey,
        new_code: &str,
        cell_index: usize,
        with_result: bool,
    ) -> Self {
        Self::new(
            Operation::ChangeCell,
            Some(notebook),
            Some(json!({
                "new_code": new_code,
                "cell_index": cell_index,
                "with_result": u8::from(with_result),
            })),
        )
    }

    pub fn add_cell(notebook: &NotebookKey, position: usize, kind: CellKind, content: &str) -> Self {
        Self::new(
            Operation::AddCell,
            Some(notebook),
            Some(json!({
                "position": position,
                "kind": kind.as_number(),
                "content": content,
            })),
        )
    }

    pub fn remove_cell(notebook: &NotebookKey, position: usize) -> Self {
        Self::new(
            Operation::RemoveCell,
            Some(notebook),
            Some(json!({ "position": position })),
        )
    }

    pub fn close_notebook(notebook: &NotebookKey) -> Self {
        Self::new(Operation::CloseNotebook, Some(notebook), None)
    }

    /// Ask the server process to stop. Not scoped to any notebook.
    pub fn close() -> Self {
        Self::new(Operation::Close, None, None)
    }

    #[must_use]
    pub fn event(&self) -> Operation {
        self.event
    }

    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn notebook(&self) -> Option<&NotebookKey> {
        self.notebook_name.as_ref()
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// One response payload, uninterpreted beyond being a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse(Value);

impl ServerResponse {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status() == Some("success")
    }

    /// Decode the `result` list. An absent or `null` result is an empty list.
    /// Entries that do not match the expected shape are skipped.
    #[must_use]
    pub fn findings(&self) -> Vec<CellFindings> {
        let entries = match self.0.get("result") {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                tracing::debug!("Ignoring non-list result payload: {other}");
                return Vec::new();
            }
        };

        entries
            .iter()
            .filter_map(|entry| match CellFindings::deserialize(entry) {
                Ok(findings) => Some(findings),
                Err(e) => {
                    tracing::debug!("Skipping malformed result entry: {e}");
                    None
                }
            })
            .collect()
    }
}

/// Findings the server reported for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CellFindings {
    pub cell_id: usize,
    #[serde(default)]
    pub errors: Vec<Finding>,
}

/// One server-reported issue. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Finding {
    pub line: u32,
    #[serde(default)]
    pub label: String,
    pub message: String,
    #[serde(default)]
    pub error_type: Option<String>,
}
