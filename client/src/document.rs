//! Editor document boundary.
//!
//! The reconciler and projector only read documents through
//! [`NotebookDocument`]. [`InMemoryNotebook`] is the model the stdio bridge
//! keeps for the editor it serves.

use nbsync_types::{CellKind, CellSnapshot, CellUri, NotebookKey};
use thiserror::Error;

/// Borrowed view of one cell at its current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef<'a> {
    pub index: usize,
    pub uri: &'a CellUri,
    pub kind: CellKind,
    pub language: &'a str,
    pub text: &'a str,
}

/// Read access to one open notebook.
pub trait NotebookDocument {
    fn key(&self) -> &NotebookKey;

    fn cell_count(&self) -> usize;

    /// Cell at `index` in the current sequence, if any.
    fn cell(&self, index: usize) -> Option<CellRef<'_>>;

    /// Serializable copy of the whole cell sequence.
    fn snapshot(&self) -> Vec<CellSnapshot> {
        (0..self.cell_count())
            .filter_map(|i| self.cell(i))
            .map(|cell| CellSnapshot {
                cell_type: cell.kind,
                language: cell.language.to_string(),
                source: cell.text.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("cell index {index} out of range (notebook has {len} cells)")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone)]
struct MemoryCell {
    uri: CellUri,
    kind: CellKind,
    language: String,
    text: String,
}

/// Owned notebook model. Every cell gets a fresh [`CellUri`] when created.
#[derive(Debug, Clone)]
pub struct InMemoryNotebook {
    key: NotebookKey,
    cells: Vec<MemoryCell>,
    next_serial: u64,
}

impl InMemoryNotebook {
    pub fn new(key: NotebookKey, cells: impl IntoIterator<Item = CellSnapshot>) -> Self {
        let mut notebook = Self {
            key,
            cells: Vec::new(),
            next_serial: 0,
        };
        let created: Vec<MemoryCell> = cells.into_iter().map(|c| notebook.make_cell(c)).collect();
        notebook.cells = created;
        notebook
    }

    fn make_cell(&mut self, cell: CellSnapshot) -> MemoryCell {
        let uri = CellUri::for_cell(&self.key, self.next_serial);
        self.next_serial += 1;
        MemoryCell {
            uri,
            kind: cell.cell_type,
            language: cell.language,
            text: cell.source,
        }
    }

    /// Insert `cells` so the first one lands at `position`.
    pub fn insert(
        &mut self,
        position: usize,
        cells: impl IntoIterator<Item = CellSnapshot>,
    ) -> Result<(), EditError> {
        if position > self.cells.len() {
            return Err(EditError::OutOfRange {
                index: position,
                len: self.cells.len(),
            });
        }
        let created: Vec<MemoryCell> = cells.into_iter().map(|c| self.make_cell(c)).collect();
        let tail = self.cells.split_off(position);
        self.cells.extend(created);
        self.cells.extend(tail);
        Ok(())
    }

    /// Remove `count` cells starting at `start`, returning their URIs.
    pub fn remove(&mut self, start: usize, count: usize) -> Result<Vec<CellUri>, EditError> {
        let end = start.saturating_add(count);
        if end > self.cells.len() {
            return Err(EditError::OutOfRange {
                index: end.saturating_sub(1),
                len: self.cells.len(),
            });
        }
        Ok(self.cells.drain(start..end).map(|c| c.uri).collect())
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> Result<(), EditError> {
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(EditError::OutOfRange { index, len })?;
        cell.text = text.into();
        Ok(())
    }
}

impl NotebookDocument for InMemoryNotebook {
    fn key(&self) -> &NotebookKey {
        &self.key
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, index: usize) -> Option<CellRef<'_>> {
        self.cells.get(index).map(|c| CellRef {
            index,
            uri: &c.uri,
            kind: c.kind,
            language: &c.language,
            text: &c.text,
        })
    }
}
