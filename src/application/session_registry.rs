//! Connection session manager.
//!
//! Process-local registry of live client sessions. Each [`Session`] owns a
//! bounded outbound queue drained by exactly one delivery pump; producers
//! never wait on it.
//!
//! # Thread Safety
//!
//! The registry uses a single `RwLock` around its map. Lookups (every routed
//! message) take the shared side, register/remove take the exclusive side,
//! and no I/O happens while the lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, RwLock};

use crate::domain::foundation::{ClientId, Timestamp};
use crate::domain::relay::{ServerMessage, Signal};

/// One item in a session's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Data(ServerMessage),
    Close,
}

/// What happened to a message handed to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Enqueued,
    /// Outbound queue was full; the message was discarded.
    DroppedFull,
    /// The delivery pump is gone.
    Closed,
    /// No session with that id on this process.
    NotConnected,
    /// An unpair notice for a pairing this session already left.
    Stale,
}

/// Server-side state for one live connection.
#[derive(Debug)]
pub struct Session {
    id: ClientId,
    ip: String,
    connected_at: Timestamp,
    outbound: mpsc::Sender<Outbound>,
    partner: Mutex<Option<ClientId>>,
    evicted: watch::Sender<bool>,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue.
    pub fn new(
        id: ClientId,
        ip: impl Into<String>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (evicted, _) = watch::channel(false);
        let session = Arc::new(Self {
            id,
            ip: ip.into(),
            connected_at: Timestamp::now(),
            outbound: tx,
            partner: Mutex::new(None),
            evicted,
        });
        (session, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    /// Enqueue a message without waiting. A full queue drops the message.
    pub fn send(&self, message: ServerMessage) -> Delivery {
        match self.outbound.try_send(Outbound::Data(message)) {
            Ok(()) => Delivery::Enqueued,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::debug!(client_id = %self.id, ?dropped, "outbound queue full, dropping");
                Delivery::DroppedFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Ask the delivery pump to close the connection.
    ///
    /// The close marker is queued behind pending messages when there is
    /// room; the eviction signal fires regardless so a stalled pump still
    /// stops.
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
        self.evicted.send_replace(true);
    }

    /// Fires once the session has been evicted.
    pub fn evicted(&self) -> watch::Receiver<bool> {
        self.evicted.subscribe()
    }

    pub async fn partner(&self) -> Option<ClientId> {
        *self.partner.lock().await
    }

    pub async fn set_partner(&self, partner: ClientId) {
        *self.partner.lock().await = Some(partner);
    }

    /// Clear and return the current partner.
    pub async fn clear_partner(&self) -> Option<ClientId> {
        self.partner.lock().await.take()
    }

    /// Apply a routed signal's partner transition, then enqueue the
    /// envelope the client should see.
    pub async fn apply(&self, signal: Signal) -> Delivery {
        match &signal {
            Signal::Paired { partner, .. } => {
                self.set_partner(*partner).await;
            }
            Signal::Unpaired { former_partner } => {
                let mut partner = self.partner.lock().await;
                match *partner {
                    Some(current) if current != *former_partner => {
                        tracing::debug!(
                            client_id = %self.id,
                            former_partner = %former_partner,
                            current_partner = %current,
                            "dropping stale unpair notice"
                        );
                        return Delivery::Stale;
                    }
                    _ => *partner = None,
                }
            }
            Signal::Relay { .. } => {}
        }
        self.send(signal.to_server_message())
    }
}

/// Errors from registry mutation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("client {0} is already registered")]
    DuplicateId(ClientId),
}

/// Process-local map from client id to session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ClientId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Fails if the id is already present.
    pub async fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id()) {
            return Err(RegistryError::DuplicateId(session.id()));
        }
        sessions.insert(session.id(), session);
        Ok(())
    }

    /// Find a live session. `None` is a normal outcome under races.
    pub async fn lookup(&self, id: &ClientId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session, returning it if it was present.
    pub async fn remove(&self, id: &ClientId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    /// Enqueue a message for a local session, if there is one.
    pub async fn deliver(&self, id: &ClientId, message: ServerMessage) -> Delivery {
        match self.lookup(id).await {
            Some(session) => session.send(message),
            None => Delivery::NotConnected,
        }
    }

    /// Apply a routed signal to a local session, if there is one.
    pub async fn apply(&self, id: &ClientId, signal: Signal) -> Delivery {
        match self.lookup(id).await {
            Some(session) => session.apply(signal).await,
            None => Delivery::NotConnected,
        }
    }

    /// Ids of every session currently registered.
    pub async fn ids(&self) -> Vec<ClientId> {
        self.sessions.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
