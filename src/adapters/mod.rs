//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the relay core to external systems:
//! - `memory` - In-process shared store, queue, bus and ban list
//! - `redis` - Redis-backed equivalents for multi-process fleets
//! - `rate_limiter` - Handshake rate limiting (in-memory, Redis)
//! - `auth` - HMAC session tokens
//! - `websocket` - Client transport, admission and per-connection tasks
//! - `http` - Router assembly and the token endpoint

pub mod auth;
pub mod http;
pub mod memory;
pub mod rate_limiter;
pub mod redis;
pub mod websocket;
