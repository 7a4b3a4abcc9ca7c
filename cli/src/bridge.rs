//! Bridge between the host's stdio stream and the [`Reconciler`].
//!
//! The bridge keeps its own model of every open notebook, applies the host's
//! edits to it, then forwards the event. Markers and notifications produced
//! while handling a message are queued and drained by the caller.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use nbsync_client::{
    AnalysisPicker, CellChange, CellDiagnostic, Connector, DiagnosticsStore, InMemoryNotebook,
    MarkerSink, NotebookDocument, Notifier, PickFuture, PickItem, ProcessLauncher, Reconciler,
    ServerLauncher, StructuralChange, TcpConnector,
};
use nbsync_config::NbsyncConfig;
use nbsync_types::{ActiveAnalyses, Analysis, CellSnapshot, CellUri, NotebookKey};

use crate::wire::{CatalogItem, HostCellChange, HostEvent, HostMessage, MarkerItem, NotifyLevel};

type Outbox = Rc<RefCell<Vec<HostEvent>>>;

/// Marker sink that mirrors every change to the host.
pub struct HostSink {
    store: DiagnosticsStore,
    outbox: Outbox,
}

impl HostSink {
    pub fn store(&self) -> &DiagnosticsStore {
        &self.store
    }
}

impl MarkerSink for HostSink {
    fn set(&mut self, cell: &CellUri, items: Vec<CellDiagnostic>) {
        if items.is_empty() {
            self.clear(cell);
            return;
        }
        self.outbox.borrow_mut().push(HostEvent::SetDiagnostics {
            cell: cell.clone(),
            items: items.iter().map(MarkerItem::from).collect(),
        });
        self.store.set(cell, items);
    }

    fn clear(&mut self, cell: &CellUri) {
        // The host has nothing to remove for a cell we never marked.
        if self.store.get(cell).is_empty() {
            return;
        }
        self.store.clear(cell);
        self.outbox
            .borrow_mut()
            .push(HostEvent::ClearDiagnostics { cell: cell.clone() });
    }
}

pub struct HostNotifier {
    outbox: Outbox,
}

impl HostNotifier {
    fn push(&self, level: NotifyLevel, message: &str) {
        self.outbox.borrow_mut().push(HostEvent::Notify {
            level,
            message: message.to_string(),
        });
    }
}

impl Notifier for HostNotifier {
    fn error(&mut self, message: &str) {
        self.push(NotifyLevel::Error, message);
    }

    fn warning(&mut self, message: &str) {
        self.push(NotifyLevel::Warning, message);
    }
}

/// Answers the picker with the selection the host already collected.
struct PresetPicker(Option<Vec<Analysis>>);

impl AnalysisPicker for PresetPicker {
    fn pick<'a>(&'a mut self, _title: &'a str, _items: &'a [PickItem]) -> PickFuture<'a> {
        Box::pin(std::future::ready(self.0.take()))
    }
}

pub struct Bridge<C, L> {
    reconciler: Reconciler<C, L, HostSink, HostNotifier>,
    notebooks: HashMap<NotebookKey, InMemoryNotebook>,
    outbox: Outbox,
    stop_on_exit: bool,
}

impl Bridge<TcpConnector, ProcessLauncher> {
    pub fn from_config(config: &NbsyncConfig) -> Self {
        let server = &config.server;
        let connector = TcpConnector::new(server.host.clone(), server.port);
        let launcher = if server.auto_start {
            ProcessLauncher::new(
                server.python.clone(),
                server.entry.clone(),
                server.startup_window(),
            )
        } else {
            ProcessLauncher::disabled()
        };
        tracing::info!(
            endpoint = connector.endpoint(),
            auto_start = server.auto_start,
            "Bridge configured"
        );
        Self::new(
            connector,
            launcher,
            config.analyses.initial(),
            server.stop_on_exit,
        )
    }
}

impl<C, L> Bridge<C, L>
where
    C: Connector,
    L: ServerLauncher,
{
    pub fn new(connector: C, launcher: L, active: ActiveAnalyses, stop_on_exit: bool) -> Self {
        let outbox = Outbox::default();
        let sink = HostSink {
            store: DiagnosticsStore::new(),
            outbox: Rc::clone(&outbox),
        };
        let notifier = HostNotifier {
            outbox: Rc::clone(&outbox),
        };
        Self {
            reconciler: Reconciler::new(connector, launcher, sink, notifier, active),
            notebooks: HashMap::new(),
            outbox,
            stop_on_exit,
        }
    }

    /// Events produced since the last call, in emission order.
    pub fn drain(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    /// Handle one host message. `Break` once the host asked to shut down.
    pub async fn handle(&mut self, message: HostMessage) -> ControlFlow<()> {
        match message {
            HostMessage::Open { notebook, cells } => {
                let key = NotebookKey::from_uri(&notebook);
                let model = InMemoryNotebook::new(key.clone(), cells.into_iter().map(Into::into));
                let model = self.notebooks.entry(key).insert_entry(model).into_mut();
                self.reconciler.open_document(&*model).await;
            }
            HostMessage::CellsChanged { notebook, changes } => {
                self.cells_changed(&notebook, changes).await;
            }
            HostMessage::CellsInserted {
                notebook,
                index,
                cells,
            } => {
                let Some(model) = lookup(&mut self.notebooks, &notebook) else {
                    return ControlFlow::Continue(());
                };
                let cells: Vec<CellSnapshot> = cells.into_iter().map(Into::into).collect();
                if let Err(e) = model.insert(index, cells.clone()) {
                    tracing::warn!(notebook = %notebook, "Rejected insertion: {e}");
                    return ControlFlow::Continue(());
                }
                let change = StructuralChange::Inserted {
                    position: index,
                    cells,
                };
                self.reconciler.on_structure_changed(&*model, &[change]).await;
            }
            HostMessage::CellsRemoved {
                notebook,
                start,
                count,
            } => {
                let Some(model) = lookup(&mut self.notebooks, &notebook) else {
                    return ControlFlow::Continue(());
                };
                let removed = match model.remove(start, count) {
                    Ok(removed) => removed,
                    Err(e) => {
                        tracing::warn!(notebook = %notebook, "Rejected removal: {e}");
                        return ControlFlow::Continue(());
                    }
                };
                let change = StructuralChange::Removed {
                    position: start,
                    cells: removed,
                };
                self.reconciler.on_structure_changed(&*model, &[change]).await;
            }
            HostMessage::SelectionChanged { notebook } => {
                if let Some(model) = lookup(&mut self.notebooks, &notebook) {
                    self.reconciler.on_selection_changed(&*model).await;
                }
            }
            HostMessage::Close { notebook } => {
                let key = NotebookKey::from_uri(&notebook);
                match self.notebooks.remove(&key) {
                    Some(model) => self.reconciler.close_document(&model).await,
                    None => tracing::debug!(notebook = %notebook, "Close for unknown notebook"),
                }
            }
            HostMessage::ShowAnalyses => {
                let items = self
                    .reconciler
                    .analysis_choices()
                    .into_iter()
                    .map(CatalogItem::from)
                    .collect();
                self.outbox
                    .borrow_mut()
                    .push(HostEvent::AnalysisCatalog { items });
            }
            HostMessage::ChooseAnalyses { selection } => {
                let mut picker = PresetPicker(selection.map(|names| parse_selection(&names)));
                let mut documents: Vec<&InMemoryNotebook> = self.notebooks.values().collect();
                documents.sort_by(|a, b| a.key().cmp(b.key()));
                self.reconciler
                    .choose_analyses(&mut picker, &documents)
                    .await;
            }
            HostMessage::Status => {
                let snapshot = self.reconciler.sink().store().snapshot();
                let lines = snapshot
                    .cells()
                    .iter()
                    .flat_map(|(cell, items)| {
                        items.iter().map(move |d| format!("{cell} {}", d.display()))
                    })
                    .collect();
                self.outbox.borrow_mut().push(HostEvent::Status {
                    text: snapshot.status_string(),
                    total: snapshot.total_count(),
                    lines,
                });
            }
            HostMessage::Shutdown => {
                self.shutdown().await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn cells_changed(&mut self, notebook: &str, changes: Vec<HostCellChange>) {
        let Some(model) = lookup(&mut self.notebooks, notebook) else {
            return;
        };
        let mut accepted = Vec::with_capacity(changes.len());
        for change in changes {
            if let Some(source) = change.source
                && let Err(e) = model.set_text(change.index, source)
            {
                tracing::warn!(notebook = %notebook, "Rejected cell edit: {e}");
                continue;
            }
            accepted.push(match change.execution {
                Some(run) => CellChange::executed(change.index, run.success),
                None => CellChange::edited(change.index),
            });
        }
        self.reconciler.on_cells_changed(&*model, &accepted).await;
    }

    /// Stop the server if configured to. Called on `shutdown` and at EOF.
    pub async fn shutdown(&mut self) {
        if !self.stop_on_exit {
            return;
        }
        if let Err(e) = self.reconciler.shutdown_server().await {
            tracing::warn!("Failed to stop analysis server: {e}");
        }
    }
}

fn lookup<'a>(
    notebooks: &'a mut HashMap<NotebookKey, InMemoryNotebook>,
    notebook: &str,
) -> Option<&'a mut InMemoryNotebook> {
    let model = notebooks.get_mut(&NotebookKey::from_uri(notebook));
    if model.is_none() {
        tracing::debug!(notebook = %notebook, "Event for unknown notebook");
    }
    model
}

fn parse_selection(names: &[String]) -> Vec<Analysis> {
    names
        .iter()
        .filter_map(|name| match name.parse::<Analysis>() {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::warn!("Ignoring selected analysis: {e}");
                None
            }
        })
        .collect()
}
