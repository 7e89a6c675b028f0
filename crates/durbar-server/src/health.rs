use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured liveness response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub sessions: SessionInfo,
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub active: usize,
    pub players: usize,
}

/// Liveness endpoint: confirms the service is running and reports
/// connection and session counts.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.ws_connection_count.load(Ordering::Relaxed);
    let (active, players) = {
        let sessions = state.sessions.read().await;
        sessions.stats()
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        sessions: SessionInfo { active, players },
    })
}
