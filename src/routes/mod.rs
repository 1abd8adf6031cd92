//! HTTP surface: REST routes, WebSocket upgrade, API docs.

pub mod docs;
pub mod health;
pub mod score;
pub mod session;
pub mod websocket;

use axum::Router;

use crate::state::SharedState;

/// Assemble the complete application router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(session::router())
        .merge(score::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}
