//! Diagnostics projection: turns server findings into per-cell markers.

use std::collections::{BTreeMap, HashMap};

use nbsync_types::CellUri;

use crate::document::NotebookDocument;
use crate::protocol::CellFindings;
use crate::types::{CellDiagnostic, CellRange, DiagnosticSeverity, DiagnosticsSnapshot};

/// Marker source used when a finding does not name its analysis.
pub const DEFAULT_SOURCE: &str = "nbsync";

/// Receives the marker set for each cell. `set` replaces, never merges.
pub trait MarkerSink {
    fn set(&mut self, cell: &CellUri, items: Vec<CellDiagnostic>);
    fn clear(&mut self, cell: &CellUri);
}

/// In-memory marker collection.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: HashMap<CellUri, Vec<CellDiagnostic>>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, cell: &CellUri) -> &[CellDiagnostic] {
        self.data.get(cell).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut cells: Vec<(CellUri, Vec<CellDiagnostic>)> = self
            .data
            .iter()
            .map(|(uri, items)| (uri.clone(), items.clone()))
            .collect();
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        DiagnosticsSnapshot::new(cells)
    }
}

impl MarkerSink for DiagnosticsStore {
    fn set(&mut self, cell: &CellUri, items: Vec<CellDiagnostic>) {
        if items.is_empty() {
            self.data.remove(cell);
        } else {
            self.data.insert(cell.clone(), items);
        }
    }

    fn clear(&mut self, cell: &CellUri) {
        self.data.remove(cell);
    }
}

/// Installs server findings into a [`MarkerSink`].
#[derive(Debug)]
pub struct DiagnosticsProjector<S> {
    sink: S,
}

impl<S: MarkerSink> DiagnosticsProjector<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Replace the markers of every cell in `document` with `findings`.
    ///
    /// Cells without findings end up with no markers. Findings that point at
    /// a missing cell or line are dropped.
    pub fn apply<D>(&mut self, document: &D, findings: &[CellFindings])
    where
        D: NotebookDocument + ?Sized,
    {
        let mut grouped: BTreeMap<usize, Vec<CellDiagnostic>> = BTreeMap::new();
        for entry in findings {
            let Some(cell) = document.cell(entry.cell_id) else {
                tracing::trace!(
                    notebook = %document.key(),
                    cell_id = entry.cell_id,
                    "Finding for unknown cell"
                );
                continue;
            };
            let markers = grouped.entry(entry.cell_id).or_default();
            for finding in &entry.errors {
                let Some(range) = finding_range(cell.text, finding.line, &finding.label) else {
                    continue;
                };
                let source = finding
                    .error_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
                markers.push(CellDiagnostic::new(
                    range,
                    finding.message.clone(),
                    DiagnosticSeverity::Warning,
                    source,
                ));
            }
        }

        for index in 0..document.cell_count() {
            let Some(cell) = document.cell(index) else {
                continue;
            };
            match grouped.remove(&index) {
                Some(markers) if !markers.is_empty() => self.sink.set(cell.uri, markers),
                _ => self.sink.clear(cell.uri),
            }
        }
    }

    pub fn clear(&mut self, cell: &CellUri) {
        self.sink.clear(cell);
    }
}

/// Range for a finding on 1-based `line` of `text`.
///
/// A non-empty `label` found on the line narrows the range to its first
/// occurrence; otherwise the whole line is covered. `None` for line 0 or a
/// line past the end of the cell.
#[must_use]
pub fn finding_range(text: &str, line: u32, label: &str) -> Option<CellRange> {
    let index = line.checked_sub(1)?;
    let line_text = text.split('\n').nth(usize::try_from(index).ok()?)?;
    let line_text = line_text.strip_suffix('\r').unwrap_or(line_text);

    let (start, end) = match line_text.find(label).filter(|_| !label.is_empty()) {
        Some(byte) => {
            let start = line_text[..byte].chars().count();
            (start, start + label.chars().count())
        }
        None => (0, line_text.chars().count()),
    };

    Some(CellRange::on_line(
        index,
        u32::try_from(start).ok()?,
        u32::try_from(end).ok()?,
    ))
}
