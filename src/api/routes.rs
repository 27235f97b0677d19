use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::UpdateMode;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/status", get(handlers::status));

    if state.config.bot.update_mode == UpdateMode::Webhook {
        router = router.route("/telegram/webhook", post(handlers::telegram_webhook));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
