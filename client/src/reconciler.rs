//! Reconciler: mirrors editor events onto the analysis server.
//!
//! Every handler runs to completion: each remote call is awaited before the
//! next one is issued, so the server sees operations in the order the editor
//! produced them. A document is open while the [`SyncStore`] has an entry for
//! it; events for other keys are dropped.

use nbsync_types::{ActiveAnalyses, Analysis, NotebookKey};

use crate::connector::{Connector, TransportError};
use crate::diagnostics::{DiagnosticsProjector, MarkerSink};
use crate::document::NotebookDocument;
use crate::host::{AnalysisPicker, CellChange, Notifier, PickItem, StructuralChange};
use crate::launcher::ServerLauncher;
use crate::protocol::{Request, ServerResponse};
use crate::store::{PendingEdit, SyncStore};

pub const SERVER_STOPPED_MESSAGE: &str =
    "Analysis server stopped unexpectedly. Please close all notebooks and start nbsync again.";

pub const SESSION_ENDED_MESSAGE: &str = "Analysis session ended for the closed notebook.";

pub const PICK_TITLE: &str = "Select the analyses to run";

/// The user has been told the server is gone; the rest of the batch is skipped.
#[derive(Debug)]
struct Halted;

pub struct Reconciler<C, L, S, N> {
    connector: C,
    launcher: L,
    projector: DiagnosticsProjector<S>,
    notifier: N,
    store: SyncStore,
}

impl<C, L, S, N> Reconciler<C, L, S, N>
where
    C: Connector,
    L: ServerLauncher,
    S: MarkerSink,
    N: Notifier,
{
    pub fn new(connector: C, launcher: L, sink: S, notifier: N, active: ActiveAnalyses) -> Self {
        Self {
            connector,
            launcher,
            projector: DiagnosticsProjector::new(sink),
            notifier,
            store: SyncStore::new(active),
        }
    }

    /// Register `document` and mirror its full contents on the server,
    /// starting the server once if nobody is listening.
    pub async fn open_document<D>(&mut self, document: &D)
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        let request = Request::open_notebook(key, &document.snapshot());
        self.store.register(key);
        tracing::info!(notebook = %key, cells = document.cell_count(), "Opening notebook");

        let response = match self.connector.call(&request).await {
            Ok(response) => response,
            Err(e) if e.is_unreachable() => {
                tracing::info!(notebook = %key, "Analysis server not reachable ({e}), starting it");
                if let Err(e) = self.launcher.start().await {
                    tracing::error!("Analysis server failed to start: {e}");
                    self.notifier
                        .error(&format!("Problem starting analysis server: {e}"));
                    return;
                }
                self.store.register(key);
                match self.connector.call(&request).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!(notebook = %key, "Open failed after starting the server: {e}");
                        self.notifier
                            .error(&format!("Analysis server isn't running: {e}"));
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!(notebook = %key, "Open failed: {e}");
                self.notifier
                    .error(&format!("Analysis server isn't running: {e}"));
                return;
            }
        };

        self.store.clear_pending(key);
        self.project(document, &request, &response);

        if !self.store.active().is_empty() {
            let request = Request::add_active_analyses(key, self.store.active());
            let _ = self.send(document, &request).await;
        }
    }

    /// Content edits and executions, in the order the editor reported them.
    pub async fn on_cells_changed<D>(&mut self, document: &D, changes: &[CellChange])
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        if !self.store.is_open(key) {
            tracing::debug!(notebook = %key, "Ignoring cell changes for unopened notebook");
            return;
        }

        for change in changes {
            self.store.set_pending(key, change.index);
            if !change.ran_successfully() {
                continue;
            }
            let Some(cell) = document.cell(change.index) else {
                tracing::warn!(notebook = %key, index = change.index, "Executed cell not found");
                continue;
            };
            let request = Request::run_cell(key, change.index, cell.text);
            if self.send(document, &request).await.is_err() {
                return;
            }
        }
    }

    /// Commit the pending edit, if any, now that the user moved on.
    pub async fn on_selection_changed<D>(&mut self, document: &D)
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        let Some(pending) = self.store.take_pending(key) else {
            return;
        };
        let Some(cell) = document.cell(pending.index()) else {
            tracing::warn!(
                notebook = %key,
                index = pending.index(),
                "Pending cell no longer exists, dropping edit"
            );
            return;
        };
        let request = Request::change_cell(key, cell.text, pending.index(), true);
        let _ = self.send(document, &request).await;
    }

    /// Insertions and removals, applied in delivery order. `document` already
    /// reflects every change in `changes`.
    pub async fn on_structure_changed<D>(&mut self, document: &D, changes: &[StructuralChange])
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        if !self.store.is_open(key) {
            tracing::debug!(notebook = %key, "Ignoring structural change for unopened notebook");
            return;
        }

        for change in changes {
            if self.apply_structural(document, change).await.is_err() {
                return;
            }
        }
    }

    async fn apply_structural<D>(
        &mut self,
        document: &D,
        change: &StructuralChange,
    ) -> Result<(), Halted>
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        match change {
            StructuralChange::Inserted { position, cells } => {
                if cells.is_empty() {
                    return Ok(());
                }
                if let Some(pending) = self.store.take_pending(key) {
                    let rebased = pending.after_insert(*position, cells.len());
                    self.force_commit(document, pending, rebased).await?;
                }
                for (offset, cell) in cells.iter().enumerate() {
                    let request =
                        Request::add_cell(key, position + offset, cell.cell_type, &cell.source);
                    self.send(document, &request).await?;
                }
            }
            StructuralChange::Removed { position, cells } => {
                if cells.is_empty() {
                    return Ok(());
                }
                for uri in cells {
                    self.projector.clear(uri);
                }
                if let Some(pending) = self.store.take_pending(key) {
                    match pending.after_remove(*position, cells.len()) {
                        Some(rebased) => self.force_commit(document, pending, rebased).await?,
                        None => tracing::debug!(
                            notebook = %key,
                            index = pending.index(),
                            "Pending cell was removed, dropping edit"
                        ),
                    }
                }
                for _ in cells {
                    let request = Request::remove_cell(key, *position);
                    self.send(document, &request).await?;
                }
            }
        }
        Ok(())
    }

    /// Send the pending edit before a structural operation reaches the server.
    ///
    /// The server has not seen the structural change yet, so `cell_index` is
    /// the pre-change index while the text is read at `rebased`.
    async fn force_commit<D>(
        &mut self,
        document: &D,
        pending: PendingEdit,
        rebased: PendingEdit,
    ) -> Result<(), Halted>
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        let Some(cell) = document.cell(rebased.index()) else {
            tracing::warn!(
                notebook = %key,
                index = rebased.index(),
                "Pending cell not found after structural change, dropping edit"
            );
            return Ok(());
        };
        let request = Request::change_cell(key, cell.text, pending.index(), false);
        self.send(document, &request).await
    }

    /// End the session for `document`. Local state goes away even if the
    /// server cannot be told.
    pub async fn close_document<D>(&mut self, document: &D)
    where
        D: NotebookDocument + ?Sized,
    {
        let key = document.key();
        if !self.store.is_open(key) {
            tracing::debug!(notebook = %key, "Close for unopened notebook");
            return;
        }

        let request = Request::close_notebook(key);
        match self.connector.call(&request).await {
            Ok(response) if !response.is_success() => tracing::debug!(
                notebook = %key,
                status = response.status().unwrap_or("?"),
                "close_notebook not acknowledged"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(notebook = %key, "close_notebook failed: {e}"),
        }

        for index in 0..document.cell_count() {
            if let Some(cell) = document.cell(index) {
                self.projector.clear(cell.uri);
            }
        }
        self.notifier.warning(SESSION_ENDED_MESSAGE);
        self.store.unregister(key);
        tracing::info!(notebook = %key, "Notebook closed");
    }

    /// The full catalog, with the currently active analyses picked.
    #[must_use]
    pub fn analysis_choices(&self) -> Vec<PickItem> {
        Analysis::CATALOG
            .iter()
            .map(|&analysis| PickItem {
                analysis,
                picked: self.store.active().contains(analysis),
            })
            .collect()
    }

    /// Let the user pick the active analyses. Dismissing the picker changes
    /// nothing.
    pub async fn choose_analyses<P, D>(&mut self, picker: &mut P, documents: &[&D])
    where
        P: AnalysisPicker + ?Sized,
        D: NotebookDocument + ?Sized,
    {
        let items = self.analysis_choices();
        let Some(selection) = picker.pick(PICK_TITLE, &items).await else {
            tracing::debug!("Analysis selection cancelled");
            return;
        };
        self.set_active_analyses(selection, documents).await;
    }

    /// Replace the active analyses and push the full set to every open
    /// document in `documents`.
    pub async fn set_active_analyses<D>(
        &mut self,
        selection: impl IntoIterator<Item = Analysis>,
        documents: &[&D],
    ) where
        D: NotebookDocument + ?Sized,
    {
        self.store.active_mut().replace(selection);
        tracing::info!(active = ?self.store.active().names(), "Active analyses changed");

        for document in documents {
            if !self.store.is_open(document.key()) {
                continue;
            }
            let request = Request::add_active_analyses(document.key(), self.store.active());
            if self.send(*document, &request).await.is_err() {
                return;
            }
        }
    }

    /// Ask the server process to stop. Its farewell is not JSON, so a
    /// malformed or missing reply still counts as acknowledged.
    pub async fn shutdown_server(&mut self) -> Result<(), TransportError> {
        match self.connector.call(&Request::close()).await {
            Ok(response) => {
                tracing::info!(status = response.status().unwrap_or("?"), "Server closed");
                Ok(())
            }
            Err(TransportError::Malformed(_) | TransportError::Closed) => {
                tracing::info!("Server acknowledged shutdown");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn send<D>(&mut self, document: &D, request: &Request) -> Result<(), Halted>
    where
        D: NotebookDocument + ?Sized,
    {
        match self.connector.call(request).await {
            Ok(response) => {
                self.project(document, request, &response);
                Ok(())
            }
            // The server answered, so the mirror is still in step.
            Err(TransportError::Malformed(reason)) => {
                tracing::warn!(
                    notebook = %document.key(),
                    event = request.event().as_str(),
                    "Undecodable reply from analysis server: {reason}"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    notebook = %document.key(),
                    event = request.event().as_str(),
                    "Analysis server request failed: {e}"
                );
                self.notifier.error(SERVER_STOPPED_MESSAGE);
                Err(Halted)
            }
        }
    }

    fn project<D>(&mut self, document: &D, request: &Request, response: &ServerResponse)
    where
        D: NotebookDocument + ?Sized,
    {
        if response.is_success() {
            self.projector.apply(document, &response.findings());
        } else {
            tracing::warn!(
                notebook = %document.key(),
                event = request.event().as_str(),
                status = response.status().unwrap_or("?"),
                "Unexpected response status"
            );
        }
    }

    #[must_use]
    pub fn is_open(&self, key: &NotebookKey) -> bool {
        self.store.is_open(key)
    }

    #[must_use]
    pub fn pending(&self, key: &NotebookKey) -> Option<PendingEdit> {
        self.store.pending(key)
    }

    #[must_use]
    pub fn active_analyses(&self) -> &ActiveAnalyses {
        self.store.active()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    pub fn sink(&self) -> &S {
        self.projector.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.projector.sink_mut()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}
