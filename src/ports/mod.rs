//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay core and the outside world. Adapters implement these ports.
//!
//! ## Shared Store Ports
//!
//! - `ClientDirectory` - Fleet-wide client records and process liveness
//! - `MatchQueue` - Shared FIFO of clients waiting for a partner
//! - `SignalBus` - Per-process broker channels for cross-instance delivery
//! - `IpBanList` - Temporary address bans
//!
//! ## Handshake Ports
//!
//! - `RateLimiter` - Per-IP handshake admission
//! - `HandshakeAuthorizer` / `SessionTokenIssuer` - Session tokens

mod client_directory;
mod handshake_authorizer;
mod ip_ban_list;
mod match_queue;
mod rate_limiter;
mod signal_bus;

pub use client_directory::{server_key, ClientDirectory, StoreError};
pub use handshake_authorizer::{HandshakeAuthorizer, IssuedToken, SessionTokenIssuer};
pub use ip_ban_list::{ban_key, IpBanList};
pub use match_queue::{MatchQueue, MATCH_QUEUE_KEY};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitPolicy, RateLimitResult,
    RateLimitScope, RateLimitStatus, RateLimiter,
};
pub use signal_bus::SignalBus;
