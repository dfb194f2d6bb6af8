pub mod actions;
pub mod digest;
pub mod health;
pub mod oauth;
pub mod reminders;

use axum::http::StatusCode;
use axum::Json;
use butler_actions::ActionError;
use butler_scheduler::SchedulerError;
use serde_json::{json, Value};
use tracing::error;

pub type HandlerError = (StatusCode, Json<Value>);

/// Render a workflow error as an HTTP response.
///
/// User-facing variants get their chat message and a 4xx status; everything
/// else is logged here and answered with a generic 500 so no internals leak.
pub fn action_error(e: ActionError) -> HandlerError {
    let status = match e {
        ActionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ActionError::NotFound => StatusCode::NOT_FOUND,
        ActionError::Expired => StatusCode::GONE,
        ActionError::NotConnected => StatusCode::CONFLICT,
        ActionError::Timeout
        | ActionError::External(_)
        | ActionError::DiffApply(_) => StatusCode::BAD_GATEWAY,
        ActionError::Database(_) | ActionError::Serialization(_) | ActionError::User(_) => {
            error!("action handler failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "message": e.user_message() })))
}

pub fn scheduler_error(e: SchedulerError) -> HandlerError {
    match e {
        SchedulerError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "message": msg })))
        }
        SchedulerError::ReminderNotFound { .. } => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "I couldn't find that reminder." })),
        ),
        other => {
            error!("scheduler handler failed: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Something went wrong on my side. Please try again." })),
            )
        }
    }
}
