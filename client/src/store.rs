//! Session-scoped synchronization state.
//!
//! A document is `Open` while it has an entry here; closing removes the entry.
//! Each open document carries at most one [`PendingEdit`].

use std::collections::HashMap;

use nbsync_types::{ActiveAnalyses, NotebookKey};

/// Index of a cell edited but not yet committed to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEdit(usize);

impl PendingEdit {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Position of the pending cell after `count` cells were inserted at
    /// `position`. Inserting at the pending index pushes the cell right.
    #[must_use]
    pub fn after_insert(self, position: usize, count: usize) -> Self {
        if position <= self.0 {
            Self(self.0 + count)
        } else {
            self
        }
    }

    /// Position of the pending cell after `count` cells were removed starting
    /// at `position`; `None` when the pending cell itself was removed.
    #[must_use]
    pub fn after_remove(self, position: usize, count: usize) -> Option<Self> {
        let end = position.saturating_add(count);
        if end <= self.0 {
            Some(Self(self.0 - count))
        } else if position <= self.0 {
            None
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, Default)]
struct DocumentSync {
    pending: Option<PendingEdit>,
}

#[derive(Debug, Default)]
pub struct SyncStore {
    documents: HashMap<NotebookKey, DocumentSync>,
    active: ActiveAnalyses,
}

impl SyncStore {
    #[must_use]
    pub fn new(active: ActiveAnalyses) -> Self {
        Self {
            documents: HashMap::new(),
            active,
        }
    }

    /// Mark the document open with no pending edit. Re-registering resets it.
    pub fn register(&mut self, key: &NotebookKey) {
        self.documents.insert(key.clone(), DocumentSync::default());
    }

    /// Returns whether the document was open.
    pub fn unregister(&mut self, key: &NotebookKey) -> bool {
        self.documents.remove(key).is_some()
    }

    #[must_use]
    pub fn is_open(&self, key: &NotebookKey) -> bool {
        self.documents.contains_key(key)
    }

    #[must_use]
    pub fn pending(&self, key: &NotebookKey) -> Option<PendingEdit> {
        self.documents.get(key).and_then(|d| d.pending)
    }

    /// Last write wins: any earlier pending edit is discarded unsent.
    pub fn set_pending(&mut self, key: &NotebookKey, index: usize) {
        if let Some(doc) = self.documents.get_mut(key) {
            doc.pending = Some(PendingEdit::new(index));
        }
    }

    pub fn take_pending(&mut self, key: &NotebookKey) -> Option<PendingEdit> {
        self.documents.get_mut(key).and_then(|d| d.pending.take())
    }

    pub fn clear_pending(&mut self, key: &NotebookKey) {
        if let Some(doc) = self.documents.get_mut(key) {
            doc.pending = None;
        }
    }

    #[must_use]
    pub fn active(&self) -> &ActiveAnalyses {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut ActiveAnalyses {
        &mut self.active
    }
}
