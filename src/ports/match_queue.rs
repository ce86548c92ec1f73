//! MatchQueue port - Shared FIFO of client ids waiting for a partner.

use async_trait::async_trait;
use std::time::Duration;

use super::StoreError;
use crate::domain::foundation::ClientId;

/// Port for the matchmaking queue.
///
/// The queue is ordered oldest-first. Callers guarantee an id is pushed at
/// most once while it is waiting (the directory's queued flag gates pushes).
#[async_trait]
pub trait MatchQueue: Send + Sync {
    /// Append an id behind every waiting id.
    async fn push(&self, id: &ClientId) -> Result<(), StoreError>;

    /// Put an id back in front of every waiting id.
    ///
    /// Used when a pop succeeded but its pairing could not proceed, so the
    /// id keeps its place.
    async fn push_front(&self, id: &ClientId) -> Result<(), StoreError>;

    /// Remove and return the oldest id, waiting up to `timeout` for one.
    async fn pop(&self, timeout: Duration) -> Result<Option<ClientId>, StoreError>;

    /// Remove the first occurrence of `id`. Returns whether one was removed.
    async fn remove(&self, id: &ClientId) -> Result<bool, StoreError>;

    /// Number of waiting ids.
    async fn len(&self) -> Result<usize, StoreError>;
}

/// Key of the shared queue list.
pub const MATCH_QUEUE_KEY: &str = "matchmaking:queue";
