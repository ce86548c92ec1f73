//! WebSocket upgrade handler for relay connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Admit the handshake (origin, ban, rate limit, token)
//! 2. Upgrade to WebSocket, offering the `chat` subprotocol
//! 3. Open the session (local registry + directory) and greet the client
//! 4. Run the delivery pump and the read loop until either stops
//! 5. Tear the session down through the lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;

use crate::application::{InboundDispatcher, OpenedSession, SessionLifecycle};

use super::admission::HandshakeAdmission;
use super::inbound::run_read_loop;
use super::pump::run_delivery_pump;

pub const SUBPROTOCOL: &str = "chat";

/// Timing knobs for one connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub keepalive: Duration,
    pub read_timeout: Duration,
    /// How long the pump may flush after teardown before it is aborted.
    pub close_grace: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            close_grace: Duration::from_secs(1),
        }
    }
}

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub admission: Arc<HandshakeAdmission>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub dispatcher: Arc<InboundDispatcher>,
    pub settings: ConnectionSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    State(state): State<WebSocketState>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let ip = match state
        .admission
        .admit(&headers, peer, query.token.as_deref())
        .await
    {
        Ok(ip) => ip,
        Err(rejection) => return rejection.into_response(),
    };

    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, ip, state))
}

/// Run an established connection to completion.
async fn handle_socket(socket: WebSocket, ip: String, state: WebSocketState) {
    let OpenedSession {
        session,
        mut outbound,
    } = match state.lifecycle.open(&ip).await {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!(ip = %ip, error = %e, "refusing connection");
            let _ = socket.close().await;
            return;
        }
    };

    let client_id = session.id();
    let settings = state.settings;
    let (mut sink, mut stream) = socket.split();

    let mut pump = {
        let evicted = session.evicted();
        tokio::spawn(async move {
            run_delivery_pump(
                &mut sink,
                &mut outbound,
                evicted,
                settings.keepalive,
                client_id,
            )
            .await
        })
    };

    let mut reader = {
        let dispatcher = Arc::clone(&state.dispatcher);
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            run_read_loop(&mut stream, &session, &dispatcher, settings.read_timeout).await
        })
    };

    let pump_finished = tokio::select! {
        exit = &mut pump => {
            reader.abort();
            tracing::debug!(client_id = %client_id, ?exit, "delivery pump stopped");
            true
        }
        exit = &mut reader => {
            tracing::debug!(client_id = %client_id, ?exit, "read loop stopped");
            false
        }
    };

    state.lifecycle.close(client_id).await;

    // Teardown queued a close frame; give the pump a moment to flush it.
    if !pump_finished && tokio::time::timeout(settings.close_grace, &mut pump).await.is_err() {
        pump.abort();
    }
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}
