//! TCP connector against an in-process analysis server

use nbsync_client::{Connector, Request, TcpConnector, TransportError};
use nbsync_types::{ActiveAnalyses, Analysis, NotebookKey};
use serde_json::json;

use crate::common::{FakeAnalysisServer, Reply, code, free_port};

#[tokio::test]
async fn each_call_is_one_round_trip() {
    let server = FakeAnalysisServer::start().await;
    let connector = server.connector();
    let key = NotebookKey::new("/work/a.ipynb");

    connector
        .call(&Request::open_notebook(&key, &[code("x = 1")]))
        .await
        .unwrap();
    connector
        .call(&Request::add_active_analyses(
            &key,
            &ActiveAnalyses::new([Analysis::StaleCells]),
        ))
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0],
        json!({
            "event": "open_notebook",
            "notebook_name": "/work/a.ipynb",
            "params": {
                "notebook_json": [{ "cell_type": "code", "language": "python", "source": "x = 1" }]
            }
        })
    );
    assert_eq!(
        requests[1]["params"]["active_analyses"],
        json!(["Stale Cells Analysis"])
    );
}

#[tokio::test]
async fn findings_come_back_uninterpreted() {
    let server = FakeAnalysisServer::with_responder(|_| {
        Reply::Json(json!({
            "status": "success",
            "result": [{ "cell_id": 0, "errors": [{ "line": 1, "label": "x", "message": "m" }] }]
        }))
    })
    .await;

    let response = server
        .connector()
        .call(&Request::run_cell(&NotebookKey::new("/a.ipynb"), 0, "x"))
        .await
        .unwrap();

    assert!(response.is_success());
    let findings = response.findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].errors[0].label, "x");
}

#[tokio::test]
async fn terminated_status_is_not_a_transport_error() {
    let server =
        FakeAnalysisServer::with_responder(|_| Reply::Json(json!({ "status": "terminated" })))
            .await;

    let response = server
        .connector()
        .call(&Request::close_notebook(&NotebookKey::new("/a.ipynb")))
        .await
        .unwrap();
    assert_eq!(response.status(), Some("terminated"));
    assert!(!response.is_success());
}

#[tokio::test]
async fn close_farewell_is_malformed() {
    let server = FakeAnalysisServer::with_responder(|_| Reply::Text("Server is stopping...\n")).await;

    let err = server.connector().call(&Request::close()).await.unwrap_err();
    assert!(matches!(err, TransportError::Malformed(_)), "got {err:?}");
    assert_eq!(server.requests(), [json!({ "event": "close" })]);
}

#[tokio::test]
async fn hang_up_is_closed() {
    let server = FakeAnalysisServer::with_responder(|_| Reply::HangUp).await;

    let err = server
        .connector()
        .call(&Request::remove_cell(&NotebookKey::new("/a.ipynb"), 0))
        .await
        .unwrap_err();
    assert!(
        matches!(err, TransportError::Closed | TransportError::Unreachable { .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn nobody_listening_is_unreachable() {
    let connector = TcpConnector::new("127.0.0.1", free_port());
    let err = connector
        .call(&Request::open_notebook(&NotebookKey::new("/a.ipynb"), &[]))
        .await
        .unwrap_err();
    assert!(err.is_unreachable(), "got {err:?}");
    assert!(err.to_string().contains("127.0.0.1"));
}
