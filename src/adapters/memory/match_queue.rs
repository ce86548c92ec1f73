//! In-memory matchmaking queue.
//!
//! A `VecDeque` behind a mutex, with a `Notify` to wake a blocked pop.
//! Membership lives in a map beside the deque so every operation under the
//! lock is O(1) amortized: removal only drops the map entry, and pops skip
//! deque entries whose tag no longer matches. Pushing an id that is already
//! waiting is a no-op.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::foundation::ClientId;
use crate::ports::{MatchQueue, StoreError};

#[derive(Debug, Default)]
struct Waiting {
    order: VecDeque<(ClientId, u64)>,
    /// Live ids and the tag of their current deque entry.
    members: HashMap<ClientId, u64>,
    next_tag: u64,
}

impl Waiting {
    /// Tag a new entry for `id`, or `None` if it is already waiting.
    fn admit(&mut self, id: ClientId) -> Option<(ClientId, u64)> {
        if self.members.contains_key(&id) {
            return None;
        }
        let tag = self.next_tag;
        self.next_tag += 1;
        self.members.insert(id, tag);
        Some((id, tag))
    }

    fn pop_front(&mut self) -> Option<ClientId> {
        while let Some((id, tag)) = self.order.pop_front() {
            if self.members.get(&id) == Some(&tag) {
                self.members.remove(&id);
                return Some(id);
            }
        }
        None
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMatchQueue {
    waiting: Mutex<Waiting>,
    available: Notify,
}

impl InMemoryMatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of waiting ids, oldest first.
    pub async fn snapshot(&self) -> Vec<ClientId> {
        let waiting = self.waiting.lock().await;
        waiting
            .order
            .iter()
            .filter(|(id, tag)| waiting.members.get(id) == Some(tag))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[async_trait]
impl MatchQueue for InMemoryMatchQueue {
    async fn push(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut waiting = self.waiting.lock().await;
        if let Some(entry) = waiting.admit(*id) {
            waiting.order.push_back(entry);
            self.available.notify_one();
        }
        Ok(())
    }

    async fn push_front(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut waiting = self.waiting.lock().await;
        if let Some(entry) = waiting.admit(*id) {
            waiting.order.push_front(entry);
            self.available.notify_one();
        }
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<ClientId>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(id) = self.waiting.lock().await.pop_front() {
                return Ok(Some(id));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn remove(&self, id: &ClientId) -> Result<bool, StoreError> {
        Ok(self.waiting.lock().await.members.remove(id).is_some())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.waiting.lock().await.members.len())
    }
}
