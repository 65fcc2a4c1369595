//! HTML/CSS content rewriting
//!
//! Regex-level transforms, applied in order: embedding-unblock (strip
//! CSP/framing meta tags), reference absolutization against the base
//! origin, base-tag injection, optional ad element removal. Deliberately
//! an approximation of real parsing; everything stays behind this module
//! so the engine can be swapped without touching call sites.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use crate::config::RewriteConfig;

/// Content categories the rewriter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteKind {
    Html,
    Css,
}

impl RewriteKind {
    /// Only HTML and CSS are rewritten; everything else passes through
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/html" | "application/xhtml+xml" => Some(RewriteKind::Html),
            "text/css" => Some(RewriteKind::Css),
            _ => None,
        }
    }
}

/// Per-response rewrite input: the origin every reference resolves against.
/// Built from the post-redirect URL, never the originally requested one.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    base_origin: String,
    scheme: String,
}

impl RewriteContext {
    pub fn new(final_url: &Url) -> Self {
        Self {
            base_origin: final_url.origin().ascii_serialization(),
            scheme: final_url.scheme().to_string(),
        }
    }

    pub fn base_origin(&self) -> &str {
        &self.base_origin
    }
}

static META_BLOCKING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta\b[^>]*http-equiv\s*=\s*["']?\s*(?:content-security-policy|x-frame-options|x-content-type-options)\b[^>]*>"#,
    )
    .unwrap()
});

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(href|src|action)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

static CSS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(?:"([^"]*)"|'([^']*)'|([^"'()\s][^()\s]*))\s*\)"#).unwrap()
});

static CSS_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).unwrap());

static STYLE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)").unwrap());

static STYLE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

static HEAD_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());

static BASE_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<base\b").unwrap());

/// Shared, immutable rewriter. Ad patterns are compiled once at startup;
/// rewriting itself holds no state and is safe under concurrency.
pub struct ContentRewriter {
    strip_ads: bool,
    ad_iframe_re: Option<Regex>,
    ad_script_re: Option<Regex>,
    ad_container_res: Vec<(String, Regex)>,
}

impl ContentRewriter {
    pub fn new(config: &RewriteConfig) -> Self {
        if !config.strip_ads || config.ad_hosts.is_empty() {
            return Self {
                strip_ads: false,
                ad_iframe_re: None,
                ad_script_re: None,
                ad_container_res: Vec::new(),
            };
        }

        let hosts = config
            .ad_hosts
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");

        let ad_iframe_re = Regex::new(&format!(
            r#"(?is)<iframe\b[^>]*src\s*=\s*["'][^"']*(?:{})[^"']*["'][^>]*>.*?</iframe\s*>"#,
            hosts
        ))
        .expect("ad iframe pattern");

        let ad_script_re = Regex::new(&format!(
            r#"(?is)<script\b[^>]*src\s*=\s*["'][^"']*(?:{})[^"']*["'][^>]*>\s*</script\s*>"#,
            hosts
        ))
        .expect("ad script pattern");

        let markers = config
            .ad_markers
            .iter()
            .map(|m| regex::escape(m))
            .collect::<Vec<_>>()
            .join("|");

        let ad_container_res = ["div", "ins", "aside", "section"]
            .iter()
            .map(|tag| {
                let re = Regex::new(&format!(
                    r#"(?is)<{tag}\b[^>]*\b(?:class|id)\s*=\s*["'][^"']*(?:{})[^"']*["'][^>]*>(.*?)</{tag}\s*>"#,
                    markers,
                    tag = tag
                ))
                .expect("ad container pattern");
                (tag.to_string(), re)
            })
            .collect();

        Self {
            strip_ads: true,
            ad_iframe_re: Some(ad_iframe_re),
            ad_script_re: Some(ad_script_re),
            ad_container_res,
        }
    }

    /// Apply every transform appropriate for the content kind.
    /// Idempotent: rewriting already-rewritten output changes nothing.
    pub fn rewrite(&self, body: &str, ctx: &RewriteContext, kind: RewriteKind) -> String {
        match kind {
            RewriteKind::Html => self.rewrite_html(body, ctx),
            RewriteKind::Css => self.rewrite_css_text(body, ctx),
        }
    }

    fn rewrite_html(&self, html: &str, ctx: &RewriteContext) -> String {
        let unblocked = META_BLOCKING_RE.replace_all(html, "");

        let absolutized = ATTR_RE.replace_all(&unblocked, |caps: &Captures| {
            let attr = &caps[1];
            let (value, quote) = match (caps.get(2), caps.get(3)) {
                (Some(v), _) => (v.as_str(), '"'),
                (_, Some(v)) => (v.as_str(), '\''),
                _ => return caps[0].to_string(),
            };

            match absolutize(value, ctx) {
                Some(new) => format!("{}={}{}{}", attr, quote, new, quote),
                None => caps[0].to_string(),
            }
        });

        let styled = STYLE_BLOCK_RE.replace_all(&absolutized, |caps: &Captures| {
            format!(
                "{}{}{}",
                &caps[1],
                self.rewrite_css_text(&caps[2], ctx),
                &caps[3]
            )
        });

        let inline_styled = STYLE_ATTR_RE.replace_all(&styled, |caps: &Captures| {
            let (value, quote) = match (caps.get(1), caps.get(2)) {
                (Some(v), _) => (v.as_str(), '"'),
                (_, Some(v)) => (v.as_str(), '\''),
                _ => return caps[0].to_string(),
            };
            format!("style={}{}{}", quote, rewrite_css_urls(value, ctx), quote)
        });

        let based = self.inject_base_tag(&inline_styled, ctx);

        if self.strip_ads {
            self.strip_ad_elements(&based)
        } else {
            based
        }
    }

    fn rewrite_css_text(&self, css: &str, ctx: &RewriteContext) -> String {
        let urls = rewrite_css_urls(css, ctx);

        CSS_IMPORT_RE
            .replace_all(&urls, |caps: &Captures| {
                let (value, quote) = match (caps.get(1), caps.get(2)) {
                    (Some(v), _) => (v.as_str(), '"'),
                    (_, Some(v)) => (v.as_str(), '\''),
                    _ => return caps[0].to_string(),
                };
                match absolutize(value, ctx) {
                    Some(new) => format!("@import {}{}{}", quote, new, quote),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// `<base href>` as the first child of `<head>`; an existing base tag
    /// wins (browsers honor the first one, and this keeps the pass
    /// idempotent). Head-less documents get the tag prepended.
    fn inject_base_tag(&self, html: &str, ctx: &RewriteContext) -> String {
        if BASE_TAG_RE.is_match(html) {
            return html.to_string();
        }

        let tag = format!(r#"<base href="{}">"#, ctx.base_origin);

        match HEAD_OPEN_RE.find(html) {
            Some(m) => format!("{}{}{}", &html[..m.end()], tag, &html[m.end()..]),
            None => format!("{}{}", tag, html),
        }
    }

    /// Best-effort ad element removal. A container whose inner HTML opens
    /// another element of the same tag has no clean regex match and is
    /// left untouched rather than risk unbalanced markup.
    fn strip_ad_elements(&self, html: &str) -> String {
        let mut out = html.to_string();

        if let Some(re) = &self.ad_iframe_re {
            out = re.replace_all(&out, "").into_owned();
        }
        if let Some(re) = &self.ad_script_re {
            out = re.replace_all(&out, "").into_owned();
        }

        for (tag, re) in &self.ad_container_res {
            let open = format!("<{}", tag);
            out = re
                .replace_all(&out, |caps: &Captures| {
                    if caps[1].to_ascii_lowercase().contains(&open) {
                        caps[0].to_string()
                    } else {
                        String::new()
                    }
                })
                .into_owned();
        }

        out
    }
}

fn rewrite_css_urls(css: &str, ctx: &RewriteContext) -> String {
    CSS_URL_RE
        .replace_all(css, |caps: &Captures| {
            let (value, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(v), _, _) => (v.as_str(), "\""),
                (_, Some(v), _) => (v.as_str(), "'"),
                (_, _, Some(v)) => (v.as_str(), ""),
                _ => return caps[0].to_string(),
            };

            match absolutize(value, ctx) {
                Some(new) => format!("url({}{}{})", quote, new, quote),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// The reference rule: absolute http(s) and non-navigational schemes stay,
/// scheme-relative gains the base scheme, root-relative and relative
/// resolve against the base origin. `None` means leave the value alone.
fn absolutize(value: &str, ctx: &RewriteContext) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return None;
    }
    for skip in ["#", "data:", "javascript:", "mailto:", "tel:", "blob:", "about:"] {
        if lower.starts_with(skip) {
            return None;
        }
    }

    if trimmed.starts_with("//") {
        return Some(format!("{}:{}", ctx.scheme, trimmed));
    }

    if trimmed.starts_with('/') {
        Some(format!("{}{}", ctx.base_origin, trimmed))
    } else {
        Some(format!("{}/{}", ctx.base_origin, trimmed))
    }
}

/// Response headers stripped before re-serving: embedding blockers plus
/// headers invalidated by body rewriting. Hop-by-hop headers are handled
/// separately at the dispatch layer.
pub fn is_blocked_response_header(name: &str) -> bool {
    matches!(
        name,
        "content-security-policy"
            | "content-security-policy-report-only"
            | "x-frame-options"
            | "x-content-type-options"
            | "strict-transport-security"
            | "set-cookie"
            | "content-length"
            | "content-encoding"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;

    fn rewriter() -> ContentRewriter {
        ContentRewriter::new(&RewriteConfig {
            strip_ads: true,
            ad_hosts: vec![
                "doubleclick.net".to_string(),
                "googlesyndication.com".to_string(),
            ],
            ad_markers: vec!["ad-slot".to_string(), "adsbygoogle".to_string()],
        })
    }

    fn ctx() -> RewriteContext {
        RewriteContext::new(&Url::parse("https://example.com/page/index.html").unwrap())
    }

    #[test]
    fn test_rewrites_root_relative_href() {
        let out = rewriter().rewrite(r#"<a href="/a/b">x</a>"#, &ctx(), RewriteKind::Html);
        assert!(out.contains(r#"<a href="https://example.com/a/b">x</a>"#));
    }

    #[test]
    fn test_rewrites_relative_src_and_action() {
        let out = rewriter().rewrite(
            r#"<img src="img/logo.png"><form action="submit.php">"#,
            &ctx(),
            RewriteKind::Html,
        );
        assert!(out.contains(r#"src="https://example.com/img/logo.png""#));
        assert!(out.contains(r#"action="https://example.com/submit.php""#));
    }

    #[test]
    fn test_preserves_absolute_and_special_refs() {
        let input = concat!(
            r#"<a href="https://other.example/x">a</a>"#,
            r##"<a href="#top">b</a>"##,
            r#"<img src="data:image/png;base64,AA==">"#,
            r#"<a href="javascript:void(0)">c</a>"#,
            r#"<a href="mailto:a@b.example">d</a>"#,
        );
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(out.contains(r#"href="https://other.example/x""#));
        assert!(out.contains(r##"href="#top""##));
        assert!(out.contains(r#"src="data:image/png;base64,AA==""#));
        assert!(out.contains(r#"href="javascript:void(0)""#));
        assert!(out.contains(r#"href="mailto:a@b.example""#));
    }

    #[test]
    fn test_scheme_relative_gains_base_scheme() {
        let out = rewriter().rewrite(
            r#"<script src="//cdn.example.net/lib.js"></script>"#,
            &ctx(),
            RewriteKind::Html,
        );
        assert!(out.contains(r#"src="https://cdn.example.net/lib.js""#));
    }

    #[test]
    fn test_single_quoted_attributes_keep_quote_style() {
        let out = rewriter().rewrite(r#"<a href='/only/path'>x</a>"#, &ctx(), RewriteKind::Html);
        assert!(out.contains("href='https://example.com/only/path'"));
    }

    #[test]
    fn test_strips_blocking_meta_tags() {
        let input = concat!(
            r#"<head><meta charset="utf-8">"#,
            r#"<meta http-equiv="Content-Security-Policy" content="default-src 'self'">"#,
            r#"<meta http-equiv="X-Frame-Options" content="DENY">"#,
            r#"<title>t</title></head>"#,
        );
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(!out.contains("Content-Security-Policy"));
        assert!(!out.contains("X-Frame-Options"));
        assert!(out.contains(r#"<meta charset="utf-8">"#));
        assert!(out.contains("<title>t</title>"));
    }

    #[test]
    fn test_injects_base_tag_as_first_child_of_head() {
        let out = rewriter().rewrite(
            "<html><head><title>t</title></head><body></body></html>",
            &ctx(),
            RewriteKind::Html,
        );
        assert!(out.contains(r#"<head><base href="https://example.com"><title>"#));
    }

    #[test]
    fn test_existing_base_tag_suppresses_injection() {
        let input = r#"<head><base href="/sub/"><title>t</title></head>"#;
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert_eq!(out.matches("<base").count(), 1);
        // The upstream base itself still gets absolutized
        assert!(out.contains(r#"<base href="https://example.com/sub/">"#));
    }

    #[test]
    fn test_headless_document_gets_base_prepended() {
        let out = rewriter().rewrite("<p>hi</p>", &ctx(), RewriteKind::Html);
        assert!(out.starts_with(r#"<base href="https://example.com"><p>hi</p>"#));
    }

    #[test]
    fn test_css_url_and_import_forms() {
        let input = concat!(
            "body { background: url(/bg.png); }\n",
            ".a { background: url('img/a.png'); }\n",
            ".b { background: url(\"https://other.example/b.png\"); }\n",
            ".c { background: url(data:image/gif;base64,R0); }\n",
            "@import \"theme.css\";\n",
            "@import url('/deep.css');\n",
        );
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Css);
        assert!(out.contains("url(https://example.com/bg.png)"));
        assert!(out.contains("url('https://example.com/img/a.png')"));
        assert!(out.contains("url(\"https://other.example/b.png\")"));
        assert!(out.contains("url(data:image/gif;base64,R0)"));
        assert!(out.contains("@import \"https://example.com/theme.css\""));
        assert!(out.contains("url('https://example.com/deep.css')"));
    }

    #[test]
    fn test_style_blocks_and_inline_styles_rewritten() {
        let input = concat!(
            "<head><style>body { background: url('/bg.png'); }</style></head>",
            r#"<div style="background:url(/i.png)">x</div>"#,
        );
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(out.contains("url('https://example.com/bg.png')"));
        assert!(out.contains("url(https://example.com/i.png)"));
    }

    #[test]
    fn test_ad_iframe_and_script_removed() {
        let input = concat!(
            r#"<p>before</p>"#,
            r#"<iframe src="https://ads.doubleclick.net/frame"><p>ad</p></iframe>"#,
            r#"<script src="https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js"></script>"#,
            r#"<p>after</p>"#,
        );
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(!out.contains("doubleclick"));
        assert!(!out.contains("googlesyndication"));
        assert!(out.contains("<p>before</p>"));
        assert!(out.contains("<p>after</p>"));
    }

    #[test]
    fn test_flat_ad_container_removed() {
        let input = r#"<p>a</p><div class="banner ad-slot">BUY NOW</div><p>b</p>"#;
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(!out.contains("BUY NOW"));
        assert!(out.contains("<p>a</p>"));
        assert!(out.contains("<p>b</p>"));
    }

    #[test]
    fn test_nested_ad_container_left_untouched() {
        // No clean match: removal would orphan the trailing </div>
        let input = r#"<div class="ad-slot"><div>inner</div><p>tail</p></div>"#;
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(out.contains("inner"));
        assert!(out.contains("tail"));
    }

    #[test]
    fn test_ads_kept_when_stripping_disabled() {
        let quiet = ContentRewriter::new(&RewriteConfig {
            strip_ads: false,
            ad_hosts: vec!["doubleclick.net".to_string()],
            ad_markers: vec!["ad-slot".to_string()],
        });
        let input = r#"<div class="ad-slot">BUY</div>"#;
        let out = quiet.rewrite(input, &ctx(), RewriteKind::Html);
        assert!(out.contains("BUY"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let input = concat!(
            r#"<html><head>"#,
            r#"<meta http-equiv="Content-Security-Policy" content="default-src 'self'">"#,
            r#"<style>body { background: url('/bg.png'); }</style>"#,
            r#"</head><body>"#,
            r#"<a href="/a/b">rel</a>"#,
            r#"<a href="https://other.example/c">abs</a>"#,
            r#"<img src="img/d.png">"#,
            r#"<div class="ad-slot">BUY</div>"#,
            r#"<iframe src="https://ads.doubleclick.net/f"></iframe>"#,
            r#"</body></html>"#,
        );
        let r = rewriter();
        let once = r.rewrite(input, &ctx(), RewriteKind::Html);
        let twice = r.rewrite(&once, &ctx(), RewriteKind::Html);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_broken_markup_degrades_to_passthrough() {
        // Unterminated quote: the attribute pattern cannot match safely
        let input = r#"<a href="/broken <p>text</p>"#;
        let out = rewriter().rewrite(input, &ctx(), RewriteKind::Html);
        assert!(out.contains("<p>text</p>"));
    }

    #[test]
    fn test_rewrite_kind_gate() {
        assert_eq!(
            RewriteKind::from_content_type("text/html; charset=utf-8"),
            Some(RewriteKind::Html)
        );
        assert_eq!(
            RewriteKind::from_content_type("application/xhtml+xml"),
            Some(RewriteKind::Html)
        );
        assert_eq!(
            RewriteKind::from_content_type("TEXT/CSS"),
            Some(RewriteKind::Css)
        );
        assert_eq!(RewriteKind::from_content_type("image/png"), None);
        assert_eq!(RewriteKind::from_content_type("application/json"), None);
        assert_eq!(RewriteKind::from_content_type(""), None);
    }

    #[test]
    fn test_blocked_response_headers() {
        assert!(is_blocked_response_header("content-security-policy"));
        assert!(is_blocked_response_header("x-frame-options"));
        assert!(is_blocked_response_header("set-cookie"));
        assert!(is_blocked_response_header("content-length"));
        assert!(!is_blocked_response_header("content-type"));
        assert!(!is_blocked_response_header("cache-control"));
    }
}
