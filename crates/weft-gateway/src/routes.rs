use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use weft_core::error::WeftError;
use weft_core::graph::WorkflowGraph;
use weft_core::types::ExecutionId;

use crate::auth;
use crate::middleware::Authenticated;
use crate::state::AppState;

fn error_status(e: &WeftError) -> StatusCode {
    match e {
        WeftError::Validation(_) => StatusCode::BAD_REQUEST,
        WeftError::Auth(_) => StatusCode::UNAUTHORIZED,
        WeftError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// GET /api/health — no auth required
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
pub struct ExecuteBody {
    pub workflow: WorkflowGraph,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

// POST /api/workflows/execute — requires Operator+
pub async fn execute(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !auth::has_operator_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    let id = state
        .coordinator
        .execute(body.workflow, &auth_result.name, body.variables)
        .await
        .map_err(|e| error_status(&e))?;

    info!(execution_id = %id, owner = %auth_result.name, "Execution accepted");
    Ok(Json(serde_json::json!({ "execution_id": id.to_string() })))
}

// POST /api/workflows/executions/:id/pause — requires Operator+
pub async fn pause(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !auth::has_operator_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    let id = ExecutionId::from_string(&id);
    state
        .coordinator
        .pause(&id, &auth_result.name)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(serde_json::json!({ "execution_id": id.to_string(), "status": "paused" })))
}

// POST /api/workflows/executions/:id/resume — requires Operator+
pub async fn resume(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !auth::has_operator_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    let id = ExecutionId::from_string(&id);
    state
        .coordinator
        .resume(&id, &auth_result.name)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(serde_json::json!({ "execution_id": id.to_string(), "status": "running" })))
}

// POST /api/workflows/executions/:id/stop — requires Operator+
pub async fn stop(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !auth::has_operator_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    let id = ExecutionId::from_string(&id);
    state
        .coordinator
        .stop(&id, &auth_result.name)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(serde_json::json!({ "execution_id": id.to_string(), "status": "cancelled" })))
}

// GET /api/workflows/executions/:id — requires Viewer+
pub async fn status(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !auth::has_viewer_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    let id = ExecutionId::from_string(&id);
    let record = state
        .coordinator
        .status(&id, &auth_result.name)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(serde_json::json!({ "execution": record })))
}

// GET /api/workflows/executions — requires Viewer+
pub async fn list(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !auth::has_viewer_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    let records = state
        .coordinator
        .list(&auth_result.name)
        .await
        .map_err(|e| error_status(&e))?;
    Ok(Json(serde_json::json!({ "executions": records })))
}
