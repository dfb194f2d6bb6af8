//! Digest configuration endpoints — thin wrappers over the config service.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::{scheduler_error, HandlerError};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// GET /v1/digest/overview?user_id=…
pub async fn overview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .digest
        .overview(&query.user_id)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub user_id: String,
    pub item: String,
}

/// POST /v1/digest/items/add
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .digest
        .add_item(&req.user_id, &req.item)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "message": message })))
}

/// POST /v1/digest/items/remove
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .digest
        .remove_item(&req.user_id, &req.item)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
pub struct TimeRequest {
    pub user_id: String,
    pub time: String,
}

/// POST /v1/digest/time — set the local delivery time; implicitly enables.
pub async fn set_time(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TimeRequest>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .digest
        .set_time(&req.user_id, &req.time)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub user_id: String,
    pub enabled: bool,
}

/// POST /v1/digest/enabled
pub async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnabledRequest>,
) -> Result<Json<Value>, HandlerError> {
    let message = state
        .digest
        .set_enabled(&req.user_id, req.enabled)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "message": message })))
}
