//! # feedback-daemon
//!
//! HTTP front end for the report orchestrator.
//!
//! The binary in `main.rs` wires configuration, logging and the listener;
//! this library holds the router so it can be driven directly in tests.

pub mod config;
pub mod handlers;
pub mod idle;
pub mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::connect_info::Connected,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    serve::IncomingStream,
    Json, Router,
};
use tokio::sync::watch;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use feedback_core::{CallerHandle, Error};
use feedback_jobs::ReportOrchestrator;

pub use config::DaemonConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ReportOrchestrator>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ReportOrchestrator>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            orchestrator,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Ask long-lived responses (event streams) to end so the server can drain.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Transport description of an accepted connection.
#[derive(Debug, Clone, Copy)]
pub struct ClientConnection(pub CallerHandle);

impl Connected<IncomingStream<'_>> for ClientConnection {
    fn connect_info(target: IncomingStream<'_>) -> Self {
        let caller = CallerHandle::new(target.remote_addr());
        match target.local_addr() {
            Ok(local) => Self(caller.with_local(local)),
            Err(_) => Self(caller),
        }
    }
}

impl From<SocketAddr> for ClientConnection {
    fn from(peer: SocketAddr) -> Self {
        Self(CallerHandle::new(peer))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::reports::health_check))
        .route("/api/v1/distro", get(handlers::reports::get_distro_info))
        .route("/api/v1/categories", get(handlers::reports::get_categories))
        .route("/api/v1/reports", post(handlers::reports::generate_report))
        .route("/api/v1/working-set", get(handlers::reports::get_working_set))
        .route("/api/v1/events", get(handlers::events::sse_events))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Unavailable(String),
    BadRequest(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::IdentityLookupFailed(_) => ApiError::Unauthorized(err.to_string()),
            Error::IdentityUnavailable(_) => ApiError::Unavailable(err.to_string()),
            Error::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
