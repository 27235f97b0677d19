use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::JSend;
use crate::config::UpdateMode;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub active_sessions: usize,
    pub pending_renames: usize,
    pub update_mode: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<JSend<StatusResponse>> {
    let update_mode = match state.config.bot.update_mode {
        UpdateMode::Polling => "polling",
        UpdateMode::Webhook => "webhook",
    };

    JSend::success(StatusResponse {
        active_sessions: state.router.active_sessions(),
        pending_renames: state.pending.len(),
        update_mode: update_mode.to_string(),
    })
}
