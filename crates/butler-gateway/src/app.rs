use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use butler_actions::ActionWorkflow;
use butler_core::config::ButlerConfig;
use butler_scheduler::{DigestService, ReminderStore};

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ButlerConfig,
    pub workflow: ActionWorkflow,
    pub digest: DigestService,
    pub reminders: ReminderStore,
}

impl AppState {
    pub fn new(
        config: ButlerConfig,
        workflow: ActionWorkflow,
        digest: DigestService,
        reminders: ReminderStore,
    ) -> Self {
        Self {
            config,
            workflow,
            digest,
            reminders,
        }
    }
}

/// Assemble the full Axum router.
///
/// The inbound chat layer is a collaborator: it does the transport and the
/// intent classification, then drives these endpoints. Button callbacks
/// (confirm/cancel, snooze/done) land here too, relayed by the same layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/v1/actions/propose", post(crate::http::actions::propose))
        .route("/v1/actions/confirm", post(crate::http::actions::confirm))
        .route("/v1/actions/cancel", post(crate::http::actions::cancel))
        .route("/v1/github/connect", post(crate::http::oauth::connect))
        .route("/v1/github/callback", get(crate::http::oauth::callback))
        .route("/v1/reminders", post(crate::http::reminders::create))
        .route("/v1/reminders/snooze", post(crate::http::reminders::snooze))
        .route("/v1/reminders/done", post(crate::http::reminders::done))
        .route("/v1/digest/overview", get(crate::http::digest::overview))
        .route("/v1/digest/items/add", post(crate::http::digest::add_item))
        .route(
            "/v1/digest/items/remove",
            post(crate::http::digest::remove_item),
        )
        .route("/v1/digest/time", post(crate::http::digest::set_time))
        .route("/v1/digest/enabled", post(crate::http::digest::set_enabled))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
