//! WebSocket transport for relay clients.
//!
//! # Architecture
//!
//! ```text
//!             GET /ws?token=...
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │ HandshakeAdmission                      │
//! │   origin → ban → rate limit → token     │
//! └─────────────────────────────────────────┘
//!                    │ upgrade ("chat")
//!                    ▼
//! ┌──────────────────┐      ┌──────────────────┐
//! │ read loop        │      │ delivery pump    │
//! │ frames →         │      │ outbound queue → │
//! │ InboundDispatcher│      │ socket + pings   │
//! └──────────────────┘      └──────────────────┘
//!            └──── either stops ────┘
//!                    ▼
//!        SessionLifecycle::close (once)
//! ```
//!
//! # Components
//!
//! - [`admission`] - Handshake gates and client address resolution
//! - [`handler`] - Axum upgrade handler and per-connection task wiring
//! - [`inbound`] - Read loop with timeout
//! - [`pump`] - Outbound delivery and keepalive

pub mod admission;
pub mod handler;
pub mod inbound;
pub mod pump;

pub use admission::{client_ip, AdmissionRejection, HandshakeAdmission, SESSION_TOKEN_HEADER};
pub use handler::{websocket_router, ws_handler, ConnectionSettings, WebSocketState, SUBPROTOCOL};
pub use inbound::{run_read_loop, ReadExit};
pub use pump::{run_delivery_pump, PumpExit};
