//! Session lifecycle: opening a connection and the single teardown path.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::matchmaking::MatchmakingEngine;
use super::session_registry::{Outbound, RegistryError, Session, SessionRegistry};
use crate::domain::foundation::{ClientId, ServerId, Timestamp};
use crate::domain::relay::{ClientRecord, ServerMessage};
use crate::ports::{ClientDirectory, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("directory registration failed: {0}")]
    Directory(#[from] StoreError),
}

/// A freshly opened session and the receiving end of its outbound queue.
pub struct OpenedSession {
    pub session: Arc<Session>,
    pub outbound: mpsc::Receiver<Outbound>,
}

pub struct SessionLifecycle {
    server_id: ServerId,
    registry: Arc<SessionRegistry>,
    directory: Arc<dyn ClientDirectory>,
    engine: Arc<MatchmakingEngine>,
    outbound_capacity: usize,
    record_ttl_secs: u64,
}

impl SessionLifecycle {
    pub fn new(
        server_id: ServerId,
        registry: Arc<SessionRegistry>,
        directory: Arc<dyn ClientDirectory>,
        engine: Arc<MatchmakingEngine>,
        outbound_capacity: usize,
        record_ttl_secs: u64,
    ) -> Self {
        Self {
            server_id,
            registry,
            directory,
            engine,
            outbound_capacity,
            record_ttl_secs,
        }
    }

    /// Register a new client locally and in the directory, then greet it.
    ///
    /// A directory failure undoes the local registration so the caller can
    /// refuse the connection cleanly.
    pub async fn open(&self, ip: &str) -> Result<OpenedSession, LifecycleError> {
        let id = ClientId::new();
        let (session, outbound) = Session::new(id, ip, self.outbound_capacity);
        self.registry.register(Arc::clone(&session)).await?;

        let record = ClientRecord::new(id, ip, self.server_id.clone());
        if let Err(e) = self.directory.register(&record, self.record_ttl_secs).await {
            self.registry.remove(&id).await;
            return Err(e.into());
        }

        session.send(ServerMessage::welcome(id));
        tracing::info!(client_id = %id, ip, "client connected");
        Ok(OpenedSession { session, outbound })
    }

    /// Tear a session down. Safe to call more than once; only the first
    /// call does anything.
    ///
    /// Leaves the queue (notifying any partner), drops the local session,
    /// deletes the directory record and stops the delivery pump.
    pub async fn close(&self, id: ClientId) {
        let Some(session) = self.registry.remove(&id).await else {
            return;
        };

        if let Err(e) = self.engine.leave_queue(id).await {
            tracing::warn!(client_id = %id, error = %e, "leave on disconnect failed");
        }
        if let Err(e) = self.directory.remove(&id).await {
            tracing::warn!(client_id = %id, error = %e, "failed to delete directory record");
        }
        session.close();

        let connected_secs = Timestamp::now()
            .as_unix_secs()
            .saturating_sub(session.connected_at().as_unix_secs());
        tracing::info!(client_id = %id, ip = session.ip(), connected_secs, "client disconnected");
    }

    /// Tear down every session this process owns. Used on shutdown so
    /// partners elsewhere in the fleet hear about the disconnects.
    pub async fn close_all(&self) {
        let ids = self.registry.ids().await;
        tracing::info!(sessions = ids.len(), "closing all sessions");
        for id in ids {
            self.close(id).await;
        }
    }
}
