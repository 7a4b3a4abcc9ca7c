//! Core domain types for nbsync.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod analysis;
mod cell;
mod ids;

pub use analysis::{ActiveAnalyses, Analysis, UnknownAnalysisError};
pub use cell::{CellKind, CellSnapshot};
pub use ids::{CellUri, NotebookKey};
