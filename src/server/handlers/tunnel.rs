//! Tunnel upgrade handler
//!
//! `GET /tunnel?target=host:port` upgrades to WebSocket, dials the
//! target over TCP, then hands both ends to the byte relay.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use crate::server::AppState;
use crate::tunnel;

#[derive(Debug, Deserialize)]
pub struct TunnelParams {
    target: String,
}

pub async fn tunnel_ws(
    ws: WebSocketUpgrade,
    Query(params): Query<TunnelParams>,
    State(state): State<AppState>,
) -> Response {
    let (host, port) = match tunnel::parse_target(&params.target) {
        Ok(target) => target,
        Err(e) => return e.into_response(),
    };

    let connect_timeout = state.config.tunnel.connect_timeout();
    let registry = state.tunnels.clone();

    ws.on_upgrade(move |socket| async move {
        let target = format!("{}:{}", host, port);

        let upstream = match tunnel::connect(&host, port, connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(target = %target, error = %e, "tunnel dial failed");
                return;
            }
        };

        let guard = registry.register(&target);
        info!(session_id = %guard.id(), target = %target, "tunnel opened");

        let (sent, received) = tunnel::relay(socket, upstream).await;

        info!(
            session_id = %guard.id(),
            target = %target,
            bytes_sent = sent,
            bytes_received = received,
            "tunnel closed"
        );
    })
}
