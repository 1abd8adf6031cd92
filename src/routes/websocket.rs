//! WebSocket upgrade endpoint.

use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::any,
};
use tracing::info;

use crate::{services::websocket_service, state::SharedState};

/// Upgrade to the realtime command protocol. The first frame must be an
/// `authenticate` command.
pub async fn ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    info!(%addr, "websocket upgrade");
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket))
}

/// WebSocket route.
pub fn router() -> Router<SharedState> {
    Router::new().route("/ws", any(ws_handler))
}
