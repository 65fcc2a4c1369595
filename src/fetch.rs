//! Outbound fetching with a spoofed browser identity
//!
//! One shared client fetches every upstream target: fixed User-Agent,
//! Accept, and Accept-Language; bounded redirects; transparent gzip.
//! Caller identity headers are never forwarded upstream.

use bytes::Bytes;
use futures::Stream;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::redirect;
use tracing::debug;
use url::Url;

use crate::config::{FetchConfig, DEFAULT_ACCEPT, DEFAULT_ACCEPT_LANGUAGE};
use crate::error::{PosternError, Result};

/// Shared outbound HTTP client
#[derive(Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    max_redirects: usize,
}

impl FetchClient {
    /// Build the shared client from configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        default_headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PosternError::InvalidConfig(format!("fetch client: {}", e)))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }

    /// Fetch a target URL, following redirects up to the configured limit.
    ///
    /// Any HTTP response is a success at this layer; the status code rides
    /// along in the result. Errors are transport-level only: `Timeout`,
    /// `TooManyRedirects`, or `Network`.
    pub async fn fetch(
        &self,
        url: Url,
        method: Method,
        client_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<FetchResult> {
        let mut request = self.client.request(method, url);

        for (name, value) in client_headers.iter() {
            if should_forward_request_header(name.as_str()) {
                request = request.header(name, value);
            }
        }

        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_fetch_error(e, self.max_redirects))?;

        let result = FetchResult::new(response);
        debug!(
            final_url = %result.final_url,
            status = %result.status,
            "upstream responded"
        );

        Ok(result)
    }
}

/// A completed upstream exchange. `final_url` is the post-redirect URL
/// and is the base for all content rewriting.
#[derive(Debug)]
pub struct FetchResult {
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    response: reqwest::Response,
}

impl FetchResult {
    fn new(response: reqwest::Response) -> Self {
        Self {
            final_url: response.url().clone(),
            status: response.status(),
            headers: response.headers().clone(),
            response,
        }
    }

    /// Declared content type, without inspecting the body
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE)?.to_str().ok()
    }

    /// Declared body length, when the upstream sent one
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }

    /// Buffer the whole body (rewritable text content)
    pub async fn bytes(self) -> Result<Bytes> {
        self.response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                PosternError::Timeout
            } else {
                PosternError::Network(format!("body read failed: {}", e))
            }
        })
    }

    /// Stream the body without buffering (passthrough content)
    pub fn bytes_stream(self) -> impl Stream<Item = reqwest::Result<Bytes>> {
        self.response.bytes_stream()
    }
}

fn classify_fetch_error(err: reqwest::Error, redirect_limit: usize) -> PosternError {
    if err.is_timeout() {
        PosternError::Timeout
    } else if err.is_redirect() {
        PosternError::TooManyRedirects {
            limit: redirect_limit,
        }
    } else if err.is_connect() {
        PosternError::Network(format!("connection failed: {}", err))
    } else {
        PosternError::Network(err.to_string())
    }
}

/// Headers meaningful only for the client<->proxy hop
pub(crate) fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name,
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Whether a client request header may travel upstream. Identity headers
/// are replaced by the fixed browser identity; conditional headers are
/// dropped because the rewriter needs full bodies; cookies stay on the
/// client side of the fence.
fn should_forward_request_header(name: &str) -> bool {
    if is_hop_by_hop_header(name) || name.starts_with("sec-") {
        return false;
    }

    !matches!(
        name,
        "host"
            | "origin"
            | "referer"
            | "cookie"
            | "user-agent"
            | "accept"
            | "accept-language"
            | "accept-encoding"
            | "content-length"
            | "if-none-match"
            | "if-modified-since"
            | "if-range"
            | "forwarded"
            | "x-forwarded-for"
            | "x-forwarded-proto"
            | "x-forwarded-host"
    )
}
