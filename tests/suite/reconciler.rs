//! Reconciler driven end to end over TCP

use nbsync_client::{
    CellChange, CellRange, DiagnosticsStore, NotebookDocument, Reconciler, SERVER_STOPPED_MESSAGE,
    SESSION_ENDED_MESSAGE, StructuralChange, TcpConnector,
};
use nbsync_types::{ActiveAnalyses, Analysis};
use serde_json::json;

use crate::common::{
    FakeAnalysisServer, NoLauncher, RecordingNotifier, Reply, code, sample_notebook,
};

type TcpReconciler = Reconciler<TcpConnector, NoLauncher, DiagnosticsStore, RecordingNotifier>;

fn reconciler(server: &FakeAnalysisServer, active: &[Analysis]) -> TcpReconciler {
    Reconciler::new(
        server.connector(),
        NoLauncher,
        DiagnosticsStore::new(),
        RecordingNotifier::default(),
        ActiveAnalyses::new(active.iter().copied()),
    )
}

/// Reports a stale `x` in cell 2 whenever analyses are (re)run.
fn stale_x(request: &serde_json::Value) -> Reply {
    match request["event"].as_str() {
        Some("add_active_analyses" | "change_cell") => Reply::Json(json!({
            "status": "success",
            "result": [{
                "cell_id": 2,
                "errors": [{
                    "line": 2,
                    "label": "x",
                    "message": "x may hold a stale value",
                    "error_type": "Stale Cells Analysis"
                }]
            }]
        })),
        _ => Reply::Json(json!({ "status": "success", "result": [] })),
    }
}

#[tokio::test]
async fn open_pushes_analyses_and_projects_findings() {
    let server = FakeAnalysisServer::with_responder(stale_x).await;
    let mut r = reconciler(&server, &[Analysis::StaleCells]);
    let nb = sample_notebook("/work/train.ipynb");

    r.open_document(&nb).await;

    assert_eq!(server.events(), ["open_notebook", "add_active_analyses"]);
    let cells = server.requests()[0]["params"]["notebook_json"].clone();
    assert_eq!(cells[0]["cell_type"], "markdown");
    assert_eq!(cells[2]["source"], "x = df['a']\ny = x + 1");

    let marker_cell = nb.cell(2).unwrap().uri.clone();
    let markers = r.sink().get(&marker_cell);
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].range(), CellRange::on_line(1, 4, 5));
    assert_eq!(markers[0].source(), "Stale Cells Analysis");
    assert_eq!(r.sink().snapshot().status_string(), "W:1 in 1 cells");
}

#[tokio::test]
async fn edit_then_move_commits_with_result() {
    let server = FakeAnalysisServer::with_responder(stale_x).await;
    let mut r = reconciler(&server, &[]);
    let mut nb = sample_notebook("/work/train.ipynb");
    r.open_document(&nb).await;
    server.clear();

    nb.set_text(1, "import pandas as pd\ndf = pd.read_csv('test.csv')")
        .unwrap();
    r.on_cells_changed(&nb, &[CellChange::edited(1)]).await;
    assert!(server.requests().is_empty());

    r.on_selection_changed(&nb).await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0]["params"],
        json!({
            "new_code": "import pandas as pd\ndf = pd.read_csv('test.csv')",
            "cell_index": 1,
            "with_result": 1
        })
    );
    assert_eq!(r.sink().snapshot().total_count(), 1);
}

#[tokio::test]
async fn structural_change_commits_pending_edit_first() {
    let server = FakeAnalysisServer::start().await;
    let mut r = reconciler(&server, &[]);
    let mut nb = sample_notebook("/work/train.ipynb");
    r.open_document(&nb).await;
    server.clear();

    nb.set_text(2, "x = df['b']\ny = x + 1").unwrap();
    r.on_cells_changed(&nb, &[CellChange::edited(2)]).await;

    nb.insert(1, [code("import numpy as np")]).unwrap();
    r.on_structure_changed(
        &nb,
        &[StructuralChange::Inserted {
            position: 1,
            cells: vec![code("import numpy as np")],
        }],
    )
    .await;

    let removed = nb.remove(0, 1).unwrap();
    r.on_structure_changed(
        &nb,
        &[StructuralChange::Removed {
            position: 0,
            cells: removed,
        }],
    )
    .await;

    let requests = server.requests();
    assert_eq!(server.events(), ["change_cell", "add_cell", "remove_cell"]);
    assert_eq!(requests[0]["params"]["new_code"], "x = df['b']\ny = x + 1");
    assert_eq!(requests[0]["params"]["cell_index"], 2);
    assert_eq!(requests[0]["params"]["with_result"], 0);
    assert_eq!(requests[1]["params"]["position"], 1);
    assert_eq!(requests[1]["params"]["kind"], 2);
    assert_eq!(requests[2]["params"]["position"], 0);
    assert_eq!(r.pending(nb.key()), None);
}

#[tokio::test]
async fn execution_runs_cell_immediately() {
    let server = FakeAnalysisServer::start().await;
    let mut r = reconciler(&server, &[]);
    let nb = sample_notebook("/work/train.ipynb");
    r.open_document(&nb).await;
    server.clear();

    r.on_cells_changed(&nb, &[CellChange::executed(1, true)]).await;

    assert_eq!(
        server.requests(),
        [json!({
            "event": "run_cell",
            "notebook_name": "/work/train.ipynb",
            "params": {
                "changed_cell_id": 1,
                "changed_cell_code": "import pandas as pd\ndf = pd.read_csv('train.csv')"
            }
        })]
    );
}

#[tokio::test]
async fn close_clears_markers_and_ends_session() {
    let server = FakeAnalysisServer::with_responder(stale_x).await;
    let mut r = reconciler(&server, &[Analysis::StaleCells]);
    let nb = sample_notebook("/work/train.ipynb");
    r.open_document(&nb).await;
    assert!(!r.sink().snapshot().is_empty());
    server.clear();

    r.close_document(&nb).await;

    assert_eq!(
        server.requests(),
        [json!({ "event": "close_notebook", "notebook_name": "/work/train.ipynb" })]
    );
    assert!(r.sink().snapshot().is_empty());
    assert_eq!(r.notifier().warnings, [SESSION_ENDED_MESSAGE]);
    assert!(!r.is_open(nb.key()));
}

#[tokio::test]
async fn selection_broadcasts_to_all_open_notebooks() {
    let server = FakeAnalysisServer::start().await;
    let mut r = reconciler(&server, &[]);
    let a = sample_notebook("/work/a.ipynb");
    let b = sample_notebook("/work/b.ipynb");
    r.open_document(&a).await;
    r.open_document(&b).await;
    server.clear();

    r.set_active_analyses([Analysis::IsolatedCells, Analysis::DataLeak], &[&a, &b])
        .await;

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    let targets: Vec<&str> = requests
        .iter()
        .map(|r| r["notebook_name"].as_str().unwrap())
        .collect();
    assert_eq!(targets, ["/work/a.ipynb", "/work/b.ipynb"]);
    for request in &requests {
        assert_eq!(
            request["params"]["active_analyses"],
            json!(["Isolated Cells Analysis", "Data Leak Analysis"])
        );
    }
}

#[tokio::test]
async fn lost_server_is_reported_once_per_batch() {
    let server = FakeAnalysisServer::start().await;
    let mut r = reconciler(&server, &[]);
    let mut nb = sample_notebook("/work/train.ipynb");
    r.open_document(&nb).await;
    drop(server);

    let cells = vec![code("a = 1"), code("b = 2")];
    nb.insert(0, cells.clone()).unwrap();
    r.on_structure_changed(
        &nb,
        &[StructuralChange::Inserted { position: 0, cells }],
    )
    .await;

    assert_eq!(r.notifier().errors, [SERVER_STOPPED_MESSAGE]);
}

#[tokio::test]
async fn undecodable_reply_does_not_desync_the_mirror() {
    let server = FakeAnalysisServer::with_responder(|request| match request["event"].as_str() {
        Some("change_cell") => Reply::Text("not json at all"),
        _ => Reply::Json(json!({ "status": "success" })),
    })
    .await;
    let mut r = reconciler(&server, &[]);
    let mut nb = sample_notebook("/work/train.ipynb");
    r.open_document(&nb).await;
    server.clear();

    nb.set_text(2, "x = df['c']\ny = x + 1").unwrap();
    r.on_cells_changed(&nb, &[CellChange::edited(2)]).await;
    nb.insert(0, [code("import os")]).unwrap();
    r.on_structure_changed(
        &nb,
        &[StructuralChange::Inserted {
            position: 0,
            cells: vec![code("import os")],
        }],
    )
    .await;

    assert_eq!(server.events(), ["change_cell", "add_cell"]);
    assert!(r.notifier().errors.is_empty());
    assert_eq!(r.pending(nb.key()), None);
}
