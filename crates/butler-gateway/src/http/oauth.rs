//! GitHub account connection — the OAuth begin/callback pair.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::{action_error, HandlerError};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
}

/// POST /v1/github/connect — start the flow, returning the URL the user
/// must visit. The pending state row expires after ten minutes.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<Value>, HandlerError> {
    let url = state
        .workflow
        .begin_connect(&req.user_id, &req.display_name)
        .map_err(action_error)?;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: String,
    pub code: String,
}

/// GET /v1/github/callback — the redirect target GitHub calls with the
/// one-time code. Plain text because a browser renders it.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, HandlerError> {
    state
        .workflow
        .complete_connect(&query.state, &query.code)
        .await
        .map_err(action_error)
}
