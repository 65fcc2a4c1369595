//! Error page rendering
//!
//! Every user-visible failure renders through here: the page names the
//! failure category, echoes the requested URL, and offers go-back and
//! retry affordances. Pure and infallible; the status code stays the
//! machine-readable side channel.

use axum::response::Response;
use http::header;

use crate::error::PosternError;
use crate::resolver;

/// Render the error page for a failed proxy request
pub fn render(err: &PosternError, requested_url: &str) -> String {
    let (title, detail) = describe(err);
    let shown_url = html_escape::encode_text(requested_url);
    let retry_href = html_escape::encode_double_quoted_attribute(&format!(
        "/proxy/{}",
        resolver::encode_target(requested_url)
    ))
    .into_owned();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  body {{ font-family: system-ui, sans-serif; background: #1a1a2e; color: #eee;
         display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; }}
  .card {{ background: #16213e; border-radius: 12px; padding: 2.5rem; max-width: 540px; text-align: center; }}
  h1 {{ margin: 0 0 0.75rem; font-size: 1.5rem; }}
  p {{ color: #aab; line-height: 1.5; }}
  .url {{ word-break: break-all; color: #7aa2f7; font-family: monospace; font-size: 0.85rem; }}
  .actions a {{ display: inline-block; margin: 1rem 0.4rem 0; padding: 0.6rem 1.4rem;
               border-radius: 8px; background: #0f3460; color: #fff; text-decoration: none; }}
</style>
</head>
<body>
<div class="card">
  <h1>{title}</h1>
  <p>{detail}</p>
  <p class="url">{shown_url}</p>
  <div class="actions">
    <a href="javascript:history.back()">Go back</a>
    <a href="{retry_href}">Retry</a>
  </div>
</div>
</body>
</html>"#,
        title = title,
        detail = html_escape::encode_text(&detail),
        shown_url = shown_url,
        retry_href = retry_href,
    )
}

/// Pair the rendered page with the error's status code
pub fn response(err: &PosternError, requested_url: &str) -> Response {
    let mut response = Response::new(render(err, requested_url).into());
    *response.status_mut() = err.status_code();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Category title and human-readable detail. Upstream internals never
/// leak into the page; the URL is the only caller-controlled content.
fn describe(err: &PosternError) -> (&'static str, String) {
    match err {
        PosternError::InvalidTarget(reason) => (
            "Invalid address",
            format!("This is not an address the proxy can open: {}.", reason),
        ),
        PosternError::Timeout => (
            "Site took too long",
            "The site did not respond within the time limit.".to_string(),
        ),
        PosternError::TooManyRedirects { limit } => (
            "Too many redirects",
            format!("The site redirected more than {} times without settling.", limit),
        ),
        PosternError::UpstreamStatus { status } => (
            "Site returned an error",
            format!("The site answered with HTTP {}.", status),
        ),
        PosternError::Network(_) => (
            "Site unreachable",
            "The site could not be reached. It may be down, or the address may be wrong."
                .to_string(),
        ),
        PosternError::TunnelError(_) => (
            "Tunnel failed",
            "The connection to the site could not be established.".to_string(),
        ),
        _ => (
            "Something went wrong",
            "An unexpected error occurred while loading the page.".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_page_echoes_requested_url() {
        let page = render(
            &PosternError::Timeout,
            "https://example.com/slow?q=1",
        );
        assert!(page.contains("https://example.com/slow?q=1"));
        assert!(page.contains("Site took too long"));
    }

    #[test]
    fn test_page_has_back_and_retry_affordances() {
        let page = render(&PosternError::Network("refused".into()), "https://example.com/");
        assert!(page.contains("history.back()"));
        assert!(page.contains("/proxy/https%3A%2F%2Fexample.com%2F"));
        assert!(page.contains("Retry"));
    }

    #[test]
    fn test_page_escapes_hostile_url() {
        let page = render(
            &PosternError::InvalidTarget("unsupported scheme".into()),
            "<script>alert(1)</script>",
        );
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_page_never_leaks_network_internals() {
        let page = render(
            &PosternError::Network("error trying to connect: tcp connect error 10.0.0.1".into()),
            "https://example.com/",
        );
        assert!(!page.contains("10.0.0.1"));
        assert!(page.contains("could not be reached"));
    }

    #[test]
    fn test_page_nonempty_for_every_category() {
        let errors = [
            PosternError::InvalidTarget("x".into()),
            PosternError::Timeout,
            PosternError::TooManyRedirects { limit: 10 },
            PosternError::UpstreamStatus { status: 503 },
            PosternError::Network("x".into()),
            PosternError::TunnelError("x".into()),
            PosternError::Internal("x".into()),
        ];
        for err in errors {
            let page = render(&err, "https://example.com/");
            assert!(page.contains("<!DOCTYPE html>"));
            assert!(page.contains("https://example.com/"));
        }
    }

    #[test]
    fn test_response_carries_error_status_and_html_type() {
        let resp = response(&PosternError::Timeout, "https://example.com/");
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );

        let resp = response(
            &PosternError::InvalidTarget("bad".into()),
            "ftp://example.com/",
        );
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
