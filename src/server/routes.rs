//! Route definitions
//!
//! Explicit core routes plus one nested sub-router per pinned mount;
//! nesting strips the mount prefix before the handler runs. Proxied
//! surfaces get permissive CORS; everything is traced.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Extension, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::mounts::PinnedMount;

use super::handlers;
use super::AppState;

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/status", get(handlers::health::status))
        .route("/api/search-engines", get(handlers::health::search_engines))
        .route("/search", get(handlers::search::search))
        .route("/proxy/", any(handlers::proxy::proxy))
        .route("/proxy/*target", any(handlers::proxy::proxy));

    if state.config.tunnel.enabled {
        router = router.route("/tunnel", get(handlers::tunnel::tunnel_ws));
    }

    let mounts = state.mounts.clone();
    for mount in mounts.iter() {
        router = router.nest(&mount.prefix, mount_router(mount.clone()));
    }

    router
        .fallback(not_found)
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Sub-router for one pinned mount; the mount rides along as an extension
fn mount_router(mount: Arc<PinnedMount>) -> Router<AppState> {
    Router::new()
        .route("/", any(handlers::mount::forward))
        .route("/*path", any(handlers::mount::forward))
        .layer(Extension(mount))
}

/// Permissive CORS: the proxy exists to be embedded from anywhere
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "route not found" })),
    )
}
