//! Postern - Web-Unblocking Proxy
//!
//! A reverse proxy that fetches remote pages on the client's behalf,
//! rewrites their content to render correctly from the proxy's origin,
//! and re-serves the result with permissive CORS.
//!
//! ## Features
//!
//! - Generic rewrite proxy: `/proxy/{encodedUrl}` with reference
//!   absolutization, base-tag injection, and embedding-unblock
//! - Pinned reverse-proxy mounts for fixed upstream origins
//! - Binary passthrough streaming for media content
//! - Search redirect endpoint over a fixed engine table
//! - Raw WebSocket-to-TCP byte tunnel
//! - Optional ad/tracking element removal

pub mod config;
pub mod engines;
pub mod error;
pub mod error_page;
pub mod fetch;
pub mod mounts;
pub mod resolver;
pub mod rewrite;
pub mod server;
pub mod tunnel;

pub use config::Config;
pub use error::{PosternError, Result};
pub use server::ProxyServer;
