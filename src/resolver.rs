//! Target URL resolution
//!
//! Turns the raw, percent-encoded target from the request path into a
//! validated absolute URL. Pure string work: no I/O, no panics.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{PosternError, Result};

/// Characters escaped when embedding a URL as a single path segment under
/// `/proxy/`. Mirrors JavaScript's `encodeURIComponent` unreserved set.
const TARGET_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A validated absolute http(s) target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    url: Url,
}

impl ResolvedTarget {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn into_url(self) -> Url {
        self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Origin of the target: scheme + host + non-default port, no
    /// trailing slash. This is the base every rewritten reference
    /// resolves against.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

/// Resolve a raw target into an absolute http(s) URL.
///
/// The input is percent-decoded exactly once. A bare domain
/// (`example.com/path`) gains an `https://` prefix; a scheme-relative
/// reference (`//host/x`) gains `https:`. Every other scheme is rejected.
pub fn resolve(raw: &str) -> Result<ResolvedTarget> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| PosternError::InvalidTarget("not valid UTF-8 after decoding".into()))?;
    let decoded = decoded.trim();

    if decoded.is_empty() {
        return Err(PosternError::InvalidTarget("empty target".into()));
    }

    match Url::parse(decoded) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(ResolvedTarget { url }),
            _ if looks_like_authority(decoded) => parse_with_https_prefix(decoded),
            scheme => Err(PosternError::InvalidTarget(format!(
                "unsupported scheme: {}",
                scheme
            ))),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => parse_with_https_prefix(decoded),
        Err(e) => Err(PosternError::InvalidTarget(e.to_string())),
    }
}

/// Percent-encode a URL for use as a single `/proxy/{target}` segment
pub fn encode_target(url: &str) -> String {
    utf8_percent_encode(url, TARGET_ENCODE_SET).to_string()
}

/// `example.com:8080/path` parses as scheme `example.com`; a numeric part
/// after the colon means host:port rather than a real scheme.
fn looks_like_authority(s: &str) -> bool {
    match s.split_once(':') {
        Some((_, rest)) => {
            let port = rest.split('/').next().unwrap_or("");
            !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn parse_with_https_prefix(decoded: &str) -> Result<ResolvedTarget> {
    let candidate = if decoded.starts_with("//") {
        format!("https:{}", decoded)
    } else {
        format!("https://{}", decoded)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| PosternError::InvalidTarget(format!("{}: {}", decoded, e)))?;

    if url.host_str().is_none() {
        return Err(PosternError::InvalidTarget(format!(
            "no host in: {}",
            decoded
        )));
    }

    Ok(ResolvedTarget { url })
}
