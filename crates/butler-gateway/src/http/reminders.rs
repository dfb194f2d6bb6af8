//! Reminder endpoints: creation plus the snooze/done button callbacks.

use std::sync::Arc;

use axum::{extract::State, Json};
use butler_scheduler::ReminderKind;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::{scheduler_error, HandlerError};

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub user_id: String,
    pub message: String,
    pub remind_at: DateTime<Utc>,
    #[serde(default = "default_kind")]
    pub kind: ReminderKind,
}

fn default_kind() -> ReminderKind {
    ReminderKind::Plain
}

/// POST /v1/reminders — schedule a one-off delivery.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Value>, HandlerError> {
    let reminder = state
        .reminders
        .create(&req.user_id, &req.message, req.remind_at, req.kind)
        .map_err(scheduler_error)?;
    Ok(Json(json!({
        "id": reminder.id,
        "remind_at": reminder.remind_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub user_id: String,
    pub id: i64,
    pub minutes: i64,
}

/// POST /v1/reminders/snooze — reschedule relative to now. Also resets the
/// done flag, so an already-fired reminder fires again at the new time.
pub async fn snooze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SnoozeRequest>,
) -> Result<Json<Value>, HandlerError> {
    let reminder = state
        .reminders
        .snooze(&req.user_id, req.id, req.minutes)
        .map_err(scheduler_error)?;
    Ok(Json(json!({
        "message": format!("Snoozed for {} minutes.", req.minutes),
        "remind_at": reminder.remind_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DoneRequest {
    pub user_id: String,
    pub id: i64,
}

/// POST /v1/reminders/done — mark done; also how cancellation works.
pub async fn done(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DoneRequest>,
) -> Result<Json<Value>, HandlerError> {
    state
        .reminders
        .mark_done(&req.user_id, req.id)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "message": "Done — I won't remind you again." })))
}
