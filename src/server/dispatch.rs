//! Request dispatch
//!
//! The two proxy pipelines live here: the generic rewrite proxy and the
//! pinned-mount reverse proxy. Both share the same shape — fetch, pick a
//! strategy from the content, apply header hygiene, respond — and both
//! end at the same error boundary: every failure renders through the
//! error page builder, never as a bare status with no body.

use std::time::Instant;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{info, warn};

use crate::error::PosternError;
use crate::error_page;
use crate::fetch::{is_hop_by_hop_header, FetchResult};
use crate::mounts::PinnedMount;
use crate::resolver;
use crate::rewrite::{is_blocked_response_header, RewriteContext, RewriteKind};

use super::AppState;

/// Terminal strategy chosen per request; logged, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    GenericRewrite,
    PinnedMount,
    BinaryPassthrough,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::GenericRewrite => "generic_rewrite",
            RouteDecision::PinnedMount => "pinned_mount",
            RouteDecision::BinaryPassthrough => "binary_passthrough",
        }
    }
}

/// Generic rewrite-proxy pipeline: resolve → fetch → rewrite-or-stream.
///
/// `raw_target` is the still-encoded path remainder after `/proxy/`;
/// `loose_query` is a query string the client appended outside the
/// encoded blob, attached when the target carries none of its own.
pub async fn run_generic(
    state: &AppState,
    raw_target: &str,
    loose_query: Option<&str>,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    let target = match resolver::resolve(raw_target) {
        Ok(target) => target,
        Err(e) => {
            warn!(target = raw_target, error = %e, "rejected proxy target");
            return error_page::response(&e, raw_target);
        }
    };

    let mut url = target.into_url();
    if url.query().is_none() {
        url.set_query(loose_query);
    }
    let requested = url.to_string();

    let result = match state.fetch.fetch(url, method, headers, body).await {
        Ok(result) => result,
        Err(e) => {
            warn!(target = %requested, error = %e, "upstream fetch failed");
            return error_page::response(&e, &requested);
        }
    };

    // Upstream answered but with an error: render the page, mirror the
    // status so automated callers still see the real code.
    if result.status.is_client_error() || result.status.is_server_error() {
        let err = PosternError::UpstreamStatus {
            status: result.status.as_u16(),
        };
        return error_page::response(&err, &requested);
    }

    // Rewriting buffers the whole body; text payloads declaring more
    // than the configured cap stream through unrewritten instead.
    let kind = result
        .content_type()
        .and_then(RewriteKind::from_content_type)
        .filter(|_| {
            result
                .content_length()
                .map_or(true, |len| len <= state.config.fetch.max_body_bytes as u64)
        });
    let decision = match kind {
        Some(_) => RouteDecision::GenericRewrite,
        None => RouteDecision::BinaryPassthrough,
    };

    let status = result.status;
    let response_headers = proxied_headers(&result.headers);
    let response = match kind {
        Some(kind) => {
            let ctx = RewriteContext::new(&result.final_url);
            match rewritten_body(state, result, &ctx, kind).await {
                Ok(body) => assemble(status, response_headers, body),
                Err(e) => {
                    warn!(target = %requested, error = %e, "body read failed");
                    return error_page::response(&e, &requested);
                }
            }
        }
        None => assemble(
            status,
            response_headers,
            Body::from_stream(result.bytes_stream()),
        ),
    };

    info!(
        target = %requested,
        decision = decision.as_str(),
        status = status.as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "proxied"
    );

    response
}

/// Pinned-mount pipeline: fixed origin, no content rewriting, upstream
/// status forwarded verbatim like a plain reverse proxy.
pub async fn run_mount(
    state: &AppState,
    mount: &PinnedMount,
    path: &str,
    query: Option<&str>,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    let url = match mount.target_url(path, query) {
        Ok(url) => url,
        Err(e) => return error_page::response(&e, path),
    };
    let requested = url.to_string();

    let result = match state.fetch.fetch(url, method, headers, body).await {
        Ok(result) => result,
        Err(e) => {
            warn!(mount = %mount.prefix, target = %requested, error = %e, "mount fetch failed");
            return error_page::response(&e, &requested);
        }
    };

    let status = result.status;
    let response = assemble(
        status,
        proxied_headers(&result.headers),
        Body::from_stream(result.bytes_stream()),
    );

    info!(
        mount = %mount.prefix,
        target = %requested,
        decision = RouteDecision::PinnedMount.as_str(),
        status = status.as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "proxied"
    );

    response
}

/// Upstream headers after hygiene: embedding blockers, cookies, and
/// hop-by-hop headers removed; permissive CORS added.
fn proxied_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in upstream.iter() {
        if is_blocked_response_header(name.as_str()) || is_hop_by_hop_header(name.as_str()) {
            continue;
        }
        headers.append(name, value.clone());
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );

    headers
}

/// Buffer and rewrite a text body. A body that declares a rewritable
/// type but is not valid UTF-8 passes through untouched rather than
/// being lossily transcoded.
async fn rewritten_body(
    state: &AppState,
    result: FetchResult,
    ctx: &RewriteContext,
    kind: RewriteKind,
) -> crate::error::Result<Body> {
    let bytes = result.bytes().await?;

    Ok(match std::str::from_utf8(&bytes) {
        Ok(text) => Body::from(state.rewriter.rewrite(text, ctx, kind)),
        Err(_) => Body::from(bytes),
    })
}

fn assemble(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
