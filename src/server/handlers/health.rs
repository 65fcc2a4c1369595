//! Health and status endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::server::AppState;

/// `/health` — always 200, regardless of upstream state
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "postern",
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "features": {
                "strip_ads": state.config.rewrite.strip_ads,
                "tunnel": state.config.tunnel.enabled,
                "pinned_mounts": state.mounts.len(),
            },
        })),
    )
}

/// `/api/status` — service identity plus live counters
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "postern",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "active_tunnels": state.tunnels.active_count(),
    }))
}

/// `/api/search-engines` — the engine table for UI pickers
pub async fn search_engines(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "engines": state.engines.all() }))
}
