use crate::error::{PosternError, Result};
use std::env;
use std::time::Duration;

/// Default browser identity presented to upstream servers. The proxy is
/// the browser as far as upstreams are concerned; caller identity headers
/// are never forwarded.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Accept header sent with every outbound request
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Accept-Language header sent with every outbound request
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Outbound fetch configuration
    pub fetch: FetchConfig,
    /// Content rewriting configuration
    pub rewrite: RewriteConfig,
    /// Raw tunnel configuration
    pub tunnel: TunnelConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 3000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Total request timeout in seconds
    pub request_timeout: u64,
    /// Maximum redirects followed before failing the fetch
    pub max_redirects: usize,
    /// User-Agent presented to upstream servers
    pub user_agent: String,
    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RewriteConfig {
    /// Remove known ad/tracking elements from rewritten HTML
    pub strip_ads: bool,
    /// Hosts whose iframes/scripts are treated as ad serving
    pub ad_hosts: Vec<String>,
    /// class/id markers identifying ad container elements
    pub ad_markers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Whether the raw tunnel endpoint is exposed
    pub enabled: bool,
    /// Timeout for dialing the tunnel target, in seconds
    pub connect_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            server: ServerConfig {
                port: get_env_or("PROXY_PORT", "3000").parse().map_err(|_| {
                    PosternError::InvalidConfig("PROXY_PORT must be a valid port number".into())
                })?,
                host: get_env_or("PROXY_HOST", "0.0.0.0"),
            },
            fetch: FetchConfig {
                connect_timeout: get_env_or("FETCH_CONNECT_TIMEOUT", "10")
                    .parse()
                    .unwrap_or(10),
                request_timeout: get_env_or("FETCH_REQUEST_TIMEOUT", "30")
                    .parse()
                    .unwrap_or(30),
                max_redirects: get_env_or("FETCH_MAX_REDIRECTS", "10").parse().map_err(
                    |_| {
                        PosternError::InvalidConfig(
                            "FETCH_MAX_REDIRECTS must be a valid number".into(),
                        )
                    },
                )?,
                user_agent: get_env_or("FETCH_USER_AGENT", DEFAULT_USER_AGENT),
                max_body_bytes: get_env_or("FETCH_MAX_BODY_BYTES", "10485760")
                    .parse()
                    .unwrap_or(10 * 1024 * 1024),
            },
            rewrite: RewriteConfig {
                strip_ads: get_env_or("REWRITE_STRIP_ADS", "true").parse().unwrap_or(true),
                ad_hosts: default_ad_hosts(),
                ad_markers: default_ad_markers(),
            },
            tunnel: TunnelConfig {
                enabled: get_env_or("TUNNEL_ENABLED", "true").parse().unwrap_or(true),
                connect_timeout: get_env_or("TUNNEL_CONNECT_TIMEOUT", "10")
                    .parse()
                    .unwrap_or(10),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl TunnelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// Hosts whose embedded iframes and scripts are stripped when ad removal
/// is enabled
fn default_ad_hosts() -> Vec<String> {
    [
        "doubleclick.net",
        "googlesyndication.com",
        "adservice.google.com",
        "google-analytics.com",
        "googletagmanager.com",
        "adnxs.com",
        "taboola.com",
        "outbrain.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// class/id substrings identifying ad container elements
fn default_ad_markers() -> Vec<String> {
    [
        "adsbygoogle",
        "ad-slot",
        "ad-banner",
        "ad-container",
        "ad-wrapper",
        "sponsored-content",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
