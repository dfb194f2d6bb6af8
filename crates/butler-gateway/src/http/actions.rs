//! Pending-action endpoints — the propose/confirm/cancel gate.

use std::sync::Arc;

use axum::{extract::State, Json};
use butler_actions::ActionIntent;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::{action_error, HandlerError};

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub user_id: String,
    pub intent: ActionIntent,
}

/// POST /v1/actions/propose — build a proposal and return the preview with
/// its confirm/cancel controls. No side effect reaches GitHub here.
pub async fn propose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<Value>, HandlerError> {
    let proposal = state
        .workflow
        .propose(&req.user_id, req.intent)
        .await
        .map_err(action_error)?;
    Ok(Json(json!({
        "pending_id": proposal.pending_id,
        "preview": proposal.preview,
        "controls": proposal.controls,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub user_id: String,
    pub id: i64,
}

/// POST /v1/actions/confirm — execute a proposed action after ownership,
/// expiry, and claim checks.
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .workflow
        .confirm(&req.user_id, req.id)
        .await
        .map_err(action_error)?;
    Ok(Json(json!({ "message": message })))
}

/// POST /v1/actions/cancel — idempotent ownership-checked discard.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .workflow
        .cancel(&req.user_id, req.id)
        .map_err(action_error)?;
    Ok(Json(json!({ "message": message })))
}
