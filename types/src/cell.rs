use serde::{Deserialize, Serialize};

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[serde(rename = "markdown", alias = "markup")]
    Markup,
    Code,
}

impl CellKind {
    /// Numeric form carried by `add_cell`. Only kind 2 gets analysis state
    /// on the server side.
    #[must_use]
    pub const fn as_number(self) -> u8 {
        match self {
            Self::Markup => 1,
            Self::Code => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markup => "markdown",
            Self::Code => "code",
        }
    }
}

/// One element of the `open_notebook` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub cell_type: CellKind,
    pub language: String,
    pub source: String,
}
