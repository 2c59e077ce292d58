//! Integration tests for the HTTP router.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! connecting peer is injected with `MockConnectInfo`, and the orchestrator
//! runs with scripted collaborators so no collector binary is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use feedback_core::{
    CallerHandle, Error, EventBus, IdentityResolver, Result, WorkerInvocation, WorkerInvoker,
    WorkerOutput,
};
use feedback_daemon::{router, AppState, ClientConnection};
use feedback_jobs::{OrchestratorConfig, ReportOrchestrator};

// ============================================================================
// HELPERS
// ============================================================================

/// Maps the test peer port to an account: 40000 is alice, everything else is unknown.
struct PortIdentity;

impl IdentityResolver for PortIdentity {
    fn resolve(&self, caller: &CallerHandle) -> Result<String> {
        match caller.peer.port() {
            40000 => Ok("alice".to_string()),
            41000 => Err(Error::IdentityUnavailable("no socket table".to_string())),
            port => Err(Error::IdentityLookupFailed(format!("no account for port {}", port))),
        }
    }
}

fn has_arg(invocation: &WorkerInvocation, arg: &str) -> bool {
    invocation.args.iter().any(|a| a == arg)
}

/// Writes the requested output file and succeeds; answers distro queries.
/// Report invocations are recorded.
#[derive(Default)]
struct WritingCollector {
    reports: Mutex<Vec<WorkerInvocation>>,
}

#[async_trait]
impl WorkerInvoker for WritingCollector {
    async fn run(&self, invocation: &WorkerInvocation) -> Result<WorkerOutput> {
        let stdout = if has_arg(invocation, "--distro-name") {
            "Deepin\n".to_string()
        } else if has_arg(invocation, "--distro-release") {
            "20\n".to_string()
        } else {
            let output = invocation
                .args
                .iter()
                .position(|a| a == "--output")
                .and_then(|at| invocation.args.get(at + 1));
            if let Some(output) = output {
                std::fs::write(output, b"report")?;
            }
            self.reports.lock().unwrap().push(invocation.clone());
            String::new()
        };
        Ok(WorkerOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

struct TestApp {
    state: AppState,
    collector: Arc<WritingCollector>,
    _tmp: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let collector = Arc::new(WritingCollector::default());
        let orchestrator = ReportOrchestrator::new(
            OrchestratorConfig::default().with_output_dir(tmp.path()),
            Arc::new(PortIdentity),
            collector.clone(),
            EventBus::new(64),
        );
        Self {
            state: AppState::new(Arc::new(orchestrator)),
            collector,
            _tmp: tmp,
        }
    }

    fn router_for_port(&self, port: u16) -> Router {
        let peer = std::net::SocketAddr::from(([127, 0, 0, 1], port));
        router(self.state.clone()).layer(MockConnectInfo(ClientConnection::from(peer)))
    }

    fn router(&self) -> Router {
        self.router_for_port(40000)
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_distro_info() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/api/v1/distro")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"distro_name": "Deepin", "distro_release": "20"})
    );
}

#[tokio::test]
async fn test_categories() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/api/v1/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let categories = body.as_array().unwrap();
    assert_eq!(categories.len(), 17);
    assert_eq!(categories[0]["Value"], "dde");
    assert_eq!(categories[0]["BugzillaProject"], "深度桌面环境");
    assert_eq!(categories[0]["Name"], "Deepin Desktop Environment");

    let again = body_json(app.router().oneshot(get("/api/v1/categories")).await.unwrap()).await;
    assert_eq!(body, again);
}

#[tokio::test]
async fn test_generate_report_returns_request_id() {
    let app = TestApp::new();
    let mut rx = app.state.orchestrator.events().subscribe();

    let response = app
        .router()
        .oneshot(post_json(
            "/api/v1/reports",
            json!({"category": "dde", "allow_privacy": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = body_json(response).await["request_id"].as_u64().unwrap();
    assert_eq!(request_id, 1);

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let envelope = rx.recv().await.unwrap();
            if envelope.event_type == "report.finished" {
                return envelope;
            }
        }
    })
    .await
    .unwrap();
    let payload = serde_json::to_value(&finished.payload).unwrap();
    assert_eq!(payload["request_id"], 1);
    assert_eq!(payload["files"].as_array().unwrap().len(), 1);
    assert_eq!(finished.actor.id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_generate_report_unknown_account_is_unauthorized() {
    let app = TestApp::new();
    let response = app
        .router_for_port(40001)
        .oneshot(post_json("/api/v1/reports", json!({"category": "dde"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("Identity lookup failed"));
    assert!(app.state.orchestrator.working_set().is_empty());
}

#[tokio::test]
async fn test_generate_report_identity_unavailable() {
    let app = TestApp::new();
    let response = app
        .router_for_port(41000)
        .oneshot(post_json("/api/v1/reports", json!({"category": "dde"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_generate_report_empty_category_rejected() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(post_json("/api/v1/reports", json!({"category": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.orchestrator.working_set().is_empty());
}

#[tokio::test]
async fn test_generate_report_category_passed_verbatim() {
    let app = TestApp::new();
    let mut rx = app.state.orchestrator.events().subscribe();

    let response = app
        .router()
        .oneshot(post_json("/api/v1/reports", json!({"category": " dde "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(10), async {
        while rx.recv().await.unwrap().event_type != "report.finished" {}
    })
    .await
    .unwrap();
    let reports = app.collector.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(has_arg(&reports[0], " dde "));
    assert!(!has_arg(&reports[0], "dde"));
}

#[tokio::test]
async fn test_working_set_snapshot() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/api/v1/working-set")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"request_ids": [], "in_working": false})
    );

    let id = app.state.orchestrator.tracker().admit();
    let response = app.router().oneshot(get("/api/v1/working-set")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"request_ids": [id.get()], "in_working": true})
    );
}

#[tokio::test]
async fn test_event_stream_delivers_envelopes() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/api/v1/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut stream = response.into_body().into_data_stream();
    app.state.orchestrator.tracker().admit();

    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: WorkingSetChanged"));
    assert!(text.contains("\"event_type\":\"working_set.changed\""));
    assert!(text.contains("\"request_ids\":[1]"));
}

#[tokio::test]
async fn test_event_stream_ends_on_shutdown() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/api/v1/events")).await.unwrap();
    let mut stream = response.into_body().into_data_stream();

    app.state.begin_shutdown();

    let end = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = stream.next().await {
            frame.unwrap();
        }
    })
    .await;
    assert!(end.is_ok());
}
