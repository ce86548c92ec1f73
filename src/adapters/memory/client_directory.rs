//! In-memory client directory for single-process deployments and tests.
//!
//! Every operation runs under one lock, which makes the read-modify-write
//! operations atomic. Expiry is checked lazily on access.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::domain::foundation::{ClientId, ServerId};
use crate::domain::relay::{ClientRecord, QueueAdmission, QueueState};
use crate::ports::{ClientDirectory, StoreError};

#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl_secs: u64) -> Self {
        Self {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, Expiring<ClientRecord>>,
    servers: HashMap<ServerId, Instant>,
}

impl State {
    fn live_client(&mut self, id: &ClientId) -> Option<&mut ClientRecord> {
        if self.clients.get(id).is_some_and(|entry| !entry.is_live()) {
            self.clients.remove(id);
        }
        self.clients.get_mut(id).map(|entry| &mut entry.value)
    }

    fn is_waiting(&mut self, id: &ClientId) -> bool {
        self.live_client(id)
            .is_some_and(|r| r.queue_state() == QueueState::Queued)
    }

    fn touch(&mut self, id: &ClientId, ttl_secs: u64) {
        if let Some(entry) = self.clients.get_mut(id) {
            entry.expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        }
    }
}

/// Directory held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryClientDirectory {
    state: Mutex<State>,
}

impl InMemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live client records (for tests and monitoring).
    pub async fn client_count(&self) -> usize {
        let state = self.state.lock().await;
        state.clients.values().filter(|e| e.is_live()).count()
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn register(&self, record: &ClientRecord, ttl_secs: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .clients
            .insert(record.id, Expiring::new(record.clone(), ttl_secs));
        Ok(())
    }

    async fn get(&self, id: &ClientId) -> Result<Option<ClientRecord>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.live_client(id).cloned())
    }

    async fn remove(&self, id: &ClientId) -> Result<(), StoreError> {
        self.state.lock().await.clients.remove(id);
        Ok(())
    }

    async fn mark_queued(&self, id: &ClientId) -> Result<QueueAdmission, StoreError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.live_client(id) else {
            return Ok(QueueAdmission::UnknownClient);
        };

        match record.queue_state() {
            QueueState::Matched => Ok(QueueAdmission::AlreadyMatched),
            QueueState::Queued => Ok(QueueAdmission::AlreadyQueued),
            QueueState::Unqueued => {
                record.in_queue = true;
                Ok(QueueAdmission::Admitted)
            }
        }
    }

    async fn clear_queued(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.live_client(id) {
            record.in_queue = false;
        }
        Ok(())
    }

    async fn pair(&self, a: &ClientId, b: &ClientId, ttl_secs: u64) -> Result<bool, StoreError> {
        if a == b {
            return Ok(false);
        }

        // Both sides must still be waiting. Leaving clears the flag before
        // unpairing, so a client on its way out can never be linked.
        let mut state = self.state.lock().await;
        if !state.is_waiting(a) || !state.is_waiting(b) {
            return Ok(false);
        }

        for (this, other) in [(a, b), (b, a)] {
            if let Some(record) = state.live_client(this) {
                record.partner_id = Some(*other);
                record.in_queue = false;
            }
            state.touch(this, ttl_secs);
        }
        Ok(true)
    }

    async fn unpair(&self, id: &ClientId, ttl_secs: u64) -> Result<Option<ClientId>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(former) = state.live_client(id).and_then(|r| r.partner_id.take()) else {
            return Ok(None);
        };
        state.touch(id, ttl_secs);

        if let Some(partner) = state.live_client(&former) {
            if partner.partner_id == Some(*id) {
                partner.partner_id = None;
                state.touch(&former, ttl_secs);
            }
        }
        Ok(Some(former))
    }

    async fn refresh_server(&self, server_id: &ServerId, ttl_secs: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .servers
            .insert(server_id.clone(), Instant::now() + Duration::from_secs(ttl_secs));
        Ok(())
    }

    async fn is_server_alive(&self, server_id: &ServerId) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .servers
            .get(server_id)
            .is_some_and(|expires_at| Instant::now() < *expires_at))
    }
}
