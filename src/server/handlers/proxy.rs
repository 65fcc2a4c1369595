//! Generic proxy handler
//!
//! `/proxy/{encodedUrl}` — the target rides in the path, percent-encoded
//! exactly once. The raw (still-encoded) path remainder goes to the
//! resolver, which performs the single decode; axum's `Path` extractor
//! would decode a second time, so the raw `Uri` is used instead.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

use crate::server::{dispatch, AppState};

pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw_target = uri.path().strip_prefix("/proxy/").unwrap_or_default();

    dispatch::run_generic(&state, raw_target, uri.query(), method, &headers, body).await
}
