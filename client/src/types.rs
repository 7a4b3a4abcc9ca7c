//! Public diagnostic types handed to marker sinks.
//!
//! The projector builds [`CellDiagnostic`]s; sinks receive them per cell and
//! [`DiagnosticsSnapshot`] gives an immutable view of what is installed.

use nbsync_types::CellUri;

/// Severity level for a diagnostic. Analysis findings are advisory, so every
/// marker is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Warning,
}

impl DiagnosticSeverity {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Warning => "warning",
        }
    }
}

/// Zero-based, end-exclusive range inside one cell's text.
///
/// Columns count Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl CellRange {
    #[must_use]
    pub fn on_line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start_line: line,
            start_col,
            end_line: line,
            end_col,
        }
    }
}

/// A single marker attached to a cell.
///
/// Fields are private; external consumers read via accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellDiagnostic {
    range: CellRange,
    message: String,
    severity: DiagnosticSeverity,
    /// Analysis that produced the finding, or `"nbsync"` when unknown.
    source: String,
}

impl CellDiagnostic {
    #[must_use]
    pub fn new(
        range: CellRange,
        message: String,
        severity: DiagnosticSeverity,
        source: String,
    ) -> Self {
        Self {
            range,
            message,
            severity,
            source,
        }
    }

    #[must_use]
    pub fn range(&self) -> CellRange {
        self.range
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Format as `line:col: severity: [source] message` (1-indexed for display).
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{}:{}: {}: [{}] {}",
            self.range.start_line + 1,
            self.range.start_col + 1,
            self.severity.label(),
            self.source,
            self.message,
        )
    }
}

/// Immutable snapshot of all installed markers, sorted by cell URI.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    cells: Vec<(CellUri, Vec<CellDiagnostic>)>,
}

impl DiagnosticsSnapshot {
    pub(crate) fn new(cells: Vec<(CellUri, Vec<CellDiagnostic>)>) -> Self {
        Self { cells }
    }

    #[must_use]
    pub fn cells(&self) -> &[(CellUri, Vec<CellDiagnostic>)] {
        &self.cells
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.cells.iter().map(|(_, items)| items.len()).sum()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity() == DiagnosticSeverity::Warning)
            .count()
    }

    /// Compact status like "W:3 in 2 cells"; empty when there is nothing.
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("W:{} in {} cells", self.warning_count(), self.cells.len())
    }
}
