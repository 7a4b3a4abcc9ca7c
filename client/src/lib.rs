//! Client side of the notebook analysis protocol.
//!
//! [`Reconciler`] turns editor events into remote operations over a
//! [`Connector`], starting the server through a [`ServerLauncher`] when it is
//! not running, and hands every response to a [`DiagnosticsProjector`].

pub mod codec;
pub mod connector;
pub mod diagnostics;
pub mod document;
pub mod host;
pub mod launcher;
pub mod protocol;
pub mod types;

mod reconciler;
mod store;

pub use connector::{CallFuture, Connector, TcpConnector, TransportError};
pub use diagnostics::{DEFAULT_SOURCE, DiagnosticsProjector, DiagnosticsStore, MarkerSink};
pub use document::{CellRef, EditError, InMemoryNotebook, NotebookDocument};
pub use host::{
    AnalysisPicker, CellChange, ExecutionSummary, Notifier, PickFuture, PickItem,
    StructuralChange,
};
pub use launcher::{LaunchError, LaunchFuture, ProcessLauncher, ServerLauncher};
pub use protocol::{CellFindings, Finding, Operation, Request, ServerResponse};
pub use reconciler::{PICK_TITLE, Reconciler, SERVER_STOPPED_MESSAGE, SESSION_ENDED_MESSAGE};
pub use store::PendingEdit;
pub use types::{CellDiagnostic, CellRange, DiagnosticSeverity, DiagnosticsSnapshot};
