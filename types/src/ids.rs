use std::fmt;

/// Stable key naming one open notebook.
///
/// The analysis server keys its sessions by the notebook's path, so a
/// parseable URI is reduced to its path component. Anything else is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NotebookKey(String);

impl NotebookKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key from a document URI such as `file:///work/a.ipynb`.
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        match url::Url::parse(uri) {
            Ok(parsed) if !parsed.cannot_be_a_base() => Self(parsed.path().to_string()),
            _ => Self(uri.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotebookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one cell's text buffer. Markers are keyed by it.
///
/// Unlike a cell index it survives insertions and removals around the cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CellUri(String);

impl CellUri {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Build the URI of the `serial`-th cell ever created in `notebook`.
    #[must_use]
    pub fn for_cell(notebook: &NotebookKey, serial: u64) -> Self {
        Self(format!("{notebook}#cell-{serial}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
