//! Host-side collaborators and the edit events the host reports.

use std::future::Future;
use std::pin::Pin;

use nbsync_types::{Analysis, CellSnapshot, CellUri};

/// User-visible notifications (message boxes, status toasts).
pub trait Notifier {
    fn error(&mut self, message: &str);
    fn warning(&mut self, message: &str);
}

/// One entry of the analysis multi-select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickItem {
    pub analysis: Analysis,
    pub picked: bool,
}

impl PickItem {
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.analysis.name()
    }

    #[must_use]
    pub fn detail(&self) -> &'static str {
        self.analysis.description()
    }
}

pub type PickFuture<'a> = Pin<Box<dyn Future<Output = Option<Vec<Analysis>>> + Send + 'a>>;

/// Multi-select UI. Resolves to `None` when the user dismisses it.
pub trait AnalysisPicker {
    fn pick<'a>(&'a mut self, title: &'a str, items: &'a [PickItem]) -> PickFuture<'a>;
}

/// Outcome of running a cell, when the change came from an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub success: bool,
}

/// A cell whose content or execution state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    pub index: usize,
    pub execution: Option<ExecutionSummary>,
}

impl CellChange {
    #[must_use]
    pub fn edited(index: usize) -> Self {
        Self {
            index,
            execution: None,
        }
    }

    #[must_use]
    pub fn executed(index: usize, success: bool) -> Self {
        Self {
            index,
            execution: Some(ExecutionSummary { success }),
        }
    }

    pub(crate) fn ran_successfully(&self) -> bool {
        self.execution.is_some_and(|e| e.success)
    }
}

/// An insertion or removal, with positions as the host reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralChange {
    /// `cells` were inserted so the first one sits at `position`.
    Inserted {
        position: usize,
        cells: Vec<CellSnapshot>,
    },
    /// The cells identified by `cells` were removed starting at `position`.
    Removed { position: usize, cells: Vec<CellUri> },
}
