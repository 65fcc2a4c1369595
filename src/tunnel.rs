//! Raw byte tunnel
//!
//! Relays opaque bytes between a client WebSocket and an upstream TCP
//! connection, for traffic that cannot be represented as discrete HTTP
//! request/response pairs. No framing or payload interpretation beyond
//! the WebSocket transport itself; either side closing, or an I/O error
//! on either side, tears down both ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PosternError, Result};

/// An active relay, held in the registry for its lifetime
#[derive(Debug, Clone)]
pub struct TunnelSession {
    pub id: Uuid,
    pub target: String,
}

/// Registry of live tunnel sessions, shared across handlers for the
/// status endpoint. Sessions deregister themselves on drop.
#[derive(Clone, Default)]
pub struct TunnelRegistry {
    sessions: Arc<DashMap<Uuid, TunnelSession>>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, target: &str) -> TunnelGuard {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            TunnelSession {
                id,
                target: target.to_string(),
            },
        );
        TunnelGuard {
            id,
            sessions: Arc::clone(&self.sessions),
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

/// RAII guard deregistering the session when the relay ends
pub struct TunnelGuard {
    id: Uuid,
    sessions: Arc<DashMap<Uuid, TunnelSession>>,
}

impl TunnelGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
    }
}

/// Parse a `host:port` tunnel target. Port defaults to 443; bracketed
/// IPv6 literals are supported.
pub fn parse_target(raw: &str) -> Result<(String, u16)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PosternError::InvalidRequest("empty tunnel target".into()));
    }

    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| PosternError::InvalidRequest(format!("unclosed IPv6 literal: {}", raw)))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(p, raw)?,
            None if tail.is_empty() => 443,
            None => {
                return Err(PosternError::InvalidRequest(format!(
                    "malformed tunnel target: {}",
                    raw
                )))
            }
        };
        return Ok((host.to_string(), port));
    }

    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port, raw)?)),
        Some(_) => Err(PosternError::InvalidRequest(format!(
            "missing host in tunnel target: {}",
            raw
        ))),
        None => Ok((raw.to_string(), 443)),
    }
}

fn parse_port(port: &str, raw: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| PosternError::InvalidRequest(format!("invalid port in tunnel target: {}", raw)))
}

/// Dial the tunnel target, bounded by the configured connect timeout
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };

    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(PosternError::TunnelError(format!(
            "connect to {} failed: {}",
            addr, e
        ))),
        Err(_) => Err(PosternError::TunnelError(format!(
            "connect to {} timed out",
            addr
        ))),
    }
}

/// Relay bytes between the client WebSocket and the upstream stream,
/// both directions concurrently. Returns (bytes sent upstream, bytes
/// received from upstream) at teardown.
pub async fn relay<S>(socket: WebSocket, upstream: S) -> (u64, u64)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut tcp_rx, mut tcp_tx) = tokio::io::split(upstream);

    let sent = AtomicU64::new(0);
    let received = AtomicU64::new(0);

    let client_to_upstream = async {
        while let Some(msg) = ws_rx.next().await {
            match msg.context("client socket error")? {
                Message::Binary(data) => {
                    tcp_tx
                        .write_all(&data)
                        .await
                        .context("upstream write failed")?;
                    sent.fetch_add(data.len() as u64, Ordering::Relaxed);
                }
                Message::Text(text) => {
                    tcp_tx
                        .write_all(text.as_bytes())
                        .await
                        .context("upstream write failed")?;
                    sent.fetch_add(text.len() as u64, Ordering::Relaxed);
                }
                Message::Close(_) => break,
                // Ping/pong stays on the client hop
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        let _ = tcp_tx.shutdown().await;
        Ok::<_, anyhow::Error>(())
    };

    let upstream_to_client = async {
        let mut buf = vec![0u8; 16 * 1024];
        loop {
            let n = tcp_rx.read(&mut buf).await.context("upstream read failed")?;
            if n == 0 {
                break;
            }
            ws_tx
                .send(Message::Binary(buf[..n].to_vec()))
                .await
                .context("client send failed")?;
            received.fetch_add(n as u64, Ordering::Relaxed);
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        Ok::<_, anyhow::Error>(())
    };

    // First direction to finish (close or error) drops the other,
    // closing both ends together.
    tokio::select! {
        result = client_to_upstream => {
            if let Err(e) = result {
                debug!("client-to-upstream relay ended: {:#}", e);
            }
        }
        result = upstream_to_client => {
            if let Err(e) = result {
                debug!("upstream-to-client relay ended: {:#}", e);
            }
        }
    }

    (sent.load(Ordering::Relaxed), received.load(Ordering::Relaxed))
}
