pub mod config;
pub mod health;
pub mod session_host;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    // The game is served to browser clients on arbitrary origins.
    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/healthz", axum::routing::get(health::health_check))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task that periodically removes idle sessions.
pub fn spawn_session_sweeper(state: AppState) {
    tokio::spawn(async move {
        let check_interval = Duration::from_secs(state.config.sessions.idle_check_interval_secs);
        let max_idle = Duration::from_secs(state.config.sessions.idle_timeout_secs);
        let mut ticker = tokio::time::interval(check_interval);
        // The immediate first tick would sweep an empty map; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = {
                let mut sessions = state.sessions.write().await;
                sessions.cleanup_idle_sessions(max_idle)
            };
            if removed > 0 {
                tracing::info!(removed, "removed idle sessions");
            }
        }
    });
}
