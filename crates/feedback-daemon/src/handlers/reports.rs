//! Report request handlers.

use axum::{
    extract::{ConnectInfo, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use feedback_core::{Category, DistroInfo, Error, RequestId};

use crate::{ApiError, AppState, ClientConnection};

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_distro_info(State(state): State<AppState>) -> Json<DistroInfo> {
    Json(state.orchestrator.distro_info().await)
}

pub async fn get_categories(State(state): State<AppState>) -> Json<Vec<Category>> {
    Json(state.orchestrator.categories().to_vec())
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportBody {
    pub category: String,
    /// When false the collector runs in privacy mode.
    #[serde(default)]
    pub allow_privacy: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportResponse {
    pub request_id: RequestId,
}

/// Start a report for the connecting user. Returns as soon as the request is
/// accepted; completion arrives on the event stream.
pub async fn generate_report(
    State(state): State<AppState>,
    ConnectInfo(ClientConnection(caller)): ConnectInfo<ClientConnection>,
    Json(body): Json<GenerateReportBody>,
) -> Result<Json<GenerateReportResponse>, ApiError> {
    // Passed to the collector verbatim; only an empty value is refused.
    if body.category.is_empty() {
        return Err(Error::InvalidInput("category must not be empty".to_string()).into());
    }
    debug!(caller = %caller, category = %body.category, "GenerateReport requested");

    let request_id = state
        .orchestrator
        .generate_report(&caller, &body.category, body.allow_privacy)
        .await?;
    Ok(Json(GenerateReportResponse { request_id }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkingSetResponse {
    pub request_ids: Vec<RequestId>,
    pub in_working: bool,
}

pub async fn get_working_set(State(state): State<AppState>) -> Json<WorkingSetResponse> {
    let request_ids = state.orchestrator.working_set();
    Json(WorkingSetResponse {
        in_working: !request_ids.is_empty(),
        request_ids,
    })
}
