//! Search redirect handler
//!
//! Builds the engine's result URL and redirects into the generic proxy.
//! Unknown engines fall back to the default; a missing query is a plain
//! 400 (no upstream was ever involved, so no error page).

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::debug;

use crate::error::PosternError;
use crate::resolver;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    engine: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q,
        _ => {
            return PosternError::InvalidRequest("missing query parameter: q".into())
                .into_response()
        }
    };

    let engine = state.engines.select(params.engine.as_deref());
    let url = engine.query_url(query);
    debug!(engine = engine.key, url = %url, "search redirect");

    Redirect::temporary(&format!("/proxy/{}", resolver::encode_target(&url))).into_response()
}
