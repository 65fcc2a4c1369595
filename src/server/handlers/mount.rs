//! Pinned-mount handler
//!
//! Runs inside a nested sub-router, one per mount; nesting has already
//! stripped the prefix, so `Uri` here is the forwarded suffix.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Extension;

use crate::mounts::PinnedMount;
use crate::server::{dispatch, AppState};

pub async fn forward(
    State(state): State<AppState>,
    Extension(mount): Extension<Arc<PinnedMount>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch::run_mount(&state, &mount, uri.path(), uri.query(), method, &headers, body).await
}
