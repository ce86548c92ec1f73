//! In-memory adapters for the shared store ports.
//!
//! Suitable for single-process deployments and for tests that simulate
//! several relay processes sharing one store.

mod client_directory;
mod ip_ban_list;
mod match_queue;
mod signal_bus;

pub use client_directory::InMemoryClientDirectory;
pub use ip_ban_list::InMemoryIpBanList;
pub use match_queue::InMemoryMatchQueue;
pub use signal_bus::InMemorySignalBus;
