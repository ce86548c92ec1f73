//! HTTP adapters.
//!
//! The relay exposes two endpoints:
//! - `GET /session/new` - issue a handshake token
//! - `GET /ws` - upgrade to the relay WebSocket

pub mod session;

pub use session::{session_routes, SessionTokenResponse, SessionTokenState};

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, WebSocketState};

/// Assemble the full application router.
pub fn app_router(ws: WebSocketState, tokens: SessionTokenState) -> Router {
    Router::new()
        .merge(websocket_router().with_state(ws))
        .merge(session_routes(tokens))
        .layer(TraceLayer::new_for_http())
}
