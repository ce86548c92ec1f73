//! ClientDirectory port - Fleet-wide client metadata and process liveness.
//!
//! In a multi-server deployment, a client's connection lives on exactly one
//! relay process while its partner may live on another. The directory is the
//! shared record that lets any process answer "who owns client X" and
//! "who is X paired with".
//!
//! ## Use Case
//!
//! 1. Client connects to Server A, which registers a record naming itself
//! 2. The pairing loop on Server B pops the client from the shared queue
//! 3. Server B pairs the two records atomically in the directory
//! 4. Server B looks up each record's owner and publishes to its channel
//!
//! Every read-modify-write operation must be atomic from the store's
//! perspective; callers never patch a record field by field.

use async_trait::async_trait;

use crate::domain::foundation::{ClientId, ServerId};
use crate::domain::relay::{ClientRecord, QueueAdmission};

/// Errors raised by the shared store (directory, queue and broker).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Redis communication error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Store is unreachable or the subscription ended
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Port for the fleet-visible client directory.
///
/// Implementations should:
/// - Expire client records after their TTL so a crashed process cannot
///   leave records behind forever
/// - Expire process liveness records after their TTL
/// - Make `mark_queued`, `pair` and `unpair` atomic
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Write a fresh record, replacing any previous one, with the given TTL.
    async fn register(&self, record: &ClientRecord, ttl_secs: u64) -> Result<(), StoreError>;

    /// Read a record. Expired and missing records are both `None`.
    async fn get(&self, id: &ClientId) -> Result<Option<ClientRecord>, StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn remove(&self, id: &ClientId) -> Result<(), StoreError>;

    /// Flag the client as waiting unless it is already waiting or matched.
    async fn mark_queued(&self, id: &ClientId) -> Result<QueueAdmission, StoreError>;

    /// Drop the waiting flag. A missing record is ignored.
    async fn clear_queued(&self, id: &ClientId) -> Result<(), StoreError>;

    /// Link `a` and `b` as partners and clear both waiting flags.
    ///
    /// Returns `false` and changes nothing if either record is missing or
    /// either side already has a partner.
    async fn pair(&self, a: &ClientId, b: &ClientId, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Read and clear `id`'s partner, clearing the partner's back reference
    /// in the same step when it still points at `id`.
    ///
    /// Returns the former partner, or `None` if `id` was not paired.
    async fn unpair(&self, id: &ClientId, ttl_secs: u64) -> Result<Option<ClientId>, StoreError>;

    /// Refresh this process's liveness record.
    async fn refresh_server(&self, server_id: &ServerId, ttl_secs: u64) -> Result<(), StoreError>;

    /// Whether a process's liveness record is present.
    async fn is_server_alive(&self, server_id: &ServerId) -> Result<bool, StoreError>;
}

/// Liveness key for a relay process.
pub fn server_key(server_id: &ServerId) -> String {
    format!("server:{}", server_id)
}
