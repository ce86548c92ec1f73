//! Redis adapters for the shared store ports.
//!
//! ## Key Layout
//!
//! - `client:<id>` - JSON client record, 2 hour TTL
//! - `server:<id>` - process liveness, 60 second TTL
//! - `matchmaking:queue` - list of waiting client ids
//! - `ban:<ip>` - ban reason, TTL is the ban length
//! - `signal:<server_id>` - Pub/Sub channel per process

mod client_directory;
mod ip_ban_list;
mod match_queue;
mod signal_bus;

pub use client_directory::RedisClientDirectory;
pub use ip_ban_list::RedisIpBanList;
pub use match_queue::RedisMatchQueue;
pub use signal_bus::RedisSignalBus;
