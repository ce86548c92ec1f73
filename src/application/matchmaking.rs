//! Matchmaking engine.
//!
//! Pairs waiting clients oldest-first from the shared queue. The directory's
//! queued flag gates every push, so an id is waiting at most once.
//!
//! # Per-client State
//!
//! ```text
//! Unqueued ──join_queue──► Queued ──pairing loop──► Matched
//!    ▲                        │                        │
//!    └─────── leave_queue ────┘◄──── next / leave ─────┘
//! ```
//!
//! The pairing loop is the only writer that links two clients. The first id
//! popped is the initiator; notifications go out through the signal router.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::session_registry::SessionRegistry;
use super::signal_router::SignalRouter;
use crate::domain::foundation::ClientId;
use crate::domain::relay::{ClientRecord, QueueAdmission, QueueState, Role, Signal};
use crate::ports::{ClientDirectory, MatchQueue, StoreError};

/// Errors surfaced to matchmaking callers.
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("client {0} is not in the directory")]
    UnknownClient(ClientId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a `join_queue` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Queued,
    AlreadyQueued,
    AlreadyMatched,
}

/// Result of one pass of the pairing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    /// Nobody was waiting.
    Idle,
    /// Only one id was available; it went back to the front.
    Requeued(ClientId),
    /// Two clients were linked.
    Paired {
        initiator: ClientId,
        responder: ClientId,
    },
    /// A popped pair could not be linked; both were dropped from the queue.
    Abandoned(ClientId, ClientId),
}

/// Timings and TTLs used by the engine.
#[derive(Debug, Clone)]
pub struct MatchmakingSettings {
    /// TTL written back to records touched by pairing.
    pub record_ttl_secs: u64,
    /// Longest a single blocking pop waits.
    pub pop_timeout: Duration,
    /// Pause after a store failure before the loop retries.
    pub retry_backoff: Duration,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            record_ttl_secs: 7200,
            pop_timeout: Duration::from_secs(1),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

pub struct MatchmakingEngine {
    directory: Arc<dyn ClientDirectory>,
    queue: Arc<dyn MatchQueue>,
    router: Arc<SignalRouter>,
    registry: Arc<SessionRegistry>,
    settings: MatchmakingSettings,
}

impl MatchmakingEngine {
    pub fn new(
        directory: Arc<dyn ClientDirectory>,
        queue: Arc<dyn MatchQueue>,
        router: Arc<SignalRouter>,
        registry: Arc<SessionRegistry>,
        settings: MatchmakingSettings,
    ) -> Self {
        Self {
            directory,
            queue,
            router,
            registry,
            settings,
        }
    }

    /// Put a client in line for a partner. Repeated joins are no-ops.
    pub async fn join_queue(&self, id: ClientId) -> Result<JoinOutcome, MatchmakingError> {
        match self.directory.mark_queued(&id).await? {
            QueueAdmission::Admitted => {}
            QueueAdmission::AlreadyQueued => return Ok(JoinOutcome::AlreadyQueued),
            QueueAdmission::AlreadyMatched => return Ok(JoinOutcome::AlreadyMatched),
            QueueAdmission::UnknownClient => return Err(MatchmakingError::UnknownClient(id)),
        }

        if let Err(e) = self.queue.push(&id).await {
            // Undo the flag so a retry is admitted.
            if let Err(clear) = self.directory.clear_queued(&id).await {
                tracing::warn!(client_id = %id, error = %clear, "failed to clear queued flag");
            }
            return Err(e.into());
        }

        tracing::debug!(client_id = %id, "joined queue");
        Ok(JoinOutcome::Queued)
    }

    /// Leave the queue and end any current pairing.
    ///
    /// Returns the former partner, who has been notified.
    pub async fn leave_queue(&self, id: ClientId) -> Result<Option<ClientId>, MatchmakingError> {
        if self.queue.remove(&id).await? {
            tracing::debug!(client_id = %id, "left queue");
        }
        self.directory.clear_queued(&id).await?;
        self.unpair(id).await
    }

    /// End the current pairing but stay connected and out of the queue.
    pub async fn next(&self, id: ClientId) -> Result<Option<ClientId>, MatchmakingError> {
        self.unpair(id).await
    }

    async fn unpair(&self, id: ClientId) -> Result<Option<ClientId>, MatchmakingError> {
        let former = self
            .directory
            .unpair(&id, self.settings.record_ttl_secs)
            .await?;

        if let Some(session) = self.registry.lookup(&id).await {
            session.clear_partner().await;
        }

        if let Some(partner) = former {
            tracing::info!(client_id = %id, partner = %partner, "pairing ended");
            self.notify(partner, Signal::Unpaired { former_partner: id });
        }
        Ok(former)
    }

    /// Deliver a signal without holding up the caller.
    fn notify(&self, target: ClientId, signal: Signal) {
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            let kind = signal.kind();
            if let Err(e) = router.send_to_client(target, signal).await {
                tracing::warn!(client_id = %target, kind, error = %e, "notification not routed");
            }
        });
    }

    /// Pop up to two waiting ids and try to link them.
    pub async fn pair_next(&self) -> Result<PairingOutcome, MatchmakingError> {
        let timeout = self.settings.pop_timeout;

        let Some(first) = self.queue.pop(timeout).await? else {
            return Ok(PairingOutcome::Idle);
        };

        let second = match self.queue.pop(timeout).await {
            Ok(Some(second)) if second != first => second,
            Ok(_) => {
                self.queue.push_front(&first).await?;
                return Ok(PairingOutcome::Requeued(first));
            }
            Err(e) => {
                self.queue.push_front(&first).await?;
                return Err(e.into());
            }
        };

        self.try_pair(first, second).await
    }

    async fn try_pair(
        &self,
        first: ClientId,
        second: ClientId,
    ) -> Result<PairingOutcome, MatchmakingError> {
        let first_ok = self.is_pairable(&first).await?;
        let second_ok = self.is_pairable(&second).await?;

        let linked = first_ok
            && second_ok
            && self
                .directory
                .pair(&first, &second, self.settings.record_ttl_secs)
                .await?;

        if !linked {
            tracing::warn!(
                first = %first,
                second = %second,
                first_ok,
                second_ok,
                "abandoning pairing with stale queue entry"
            );
            self.directory.clear_queued(&first).await?;
            self.directory.clear_queued(&second).await?;
            return Ok(PairingOutcome::Abandoned(first, second));
        }

        tracing::info!(initiator = %first, responder = %second, "clients paired");
        self.notify(
            first,
            Signal::Paired {
                partner: second,
                role: Role::Initiator,
            },
        );
        self.notify(
            second,
            Signal::Paired {
                partner: first,
                role: Role::Responder,
            },
        );

        Ok(PairingOutcome::Paired {
            initiator: first,
            responder: second,
        })
    }

    /// A queued id can be paired if its record exists, it still wants a
    /// partner, and its owning process is alive.
    async fn is_pairable(&self, id: &ClientId) -> Result<bool, StoreError> {
        let Some(record) = self.directory.get(id).await? else {
            return Ok(false);
        };
        if !record_wants_partner(&record) {
            return Ok(false);
        }
        match record.owner() {
            Some(owner) => self.directory.is_server_alive(owner).await,
            None => Ok(false),
        }
    }

    /// Run the pairing loop until shutdown.
    ///
    /// Shutdown is checked between passes so a popped id is never lost
    /// mid-pass.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tracing::info!("pairing loop started");

        while !*shutdown.borrow() {
            match self.pair_next().await {
                Ok(PairingOutcome::Idle) | Ok(PairingOutcome::Paired { .. }) => {}
                Ok(PairingOutcome::Requeued(id)) => {
                    tracing::trace!(client_id = %id, "waiting for a second client");
                }
                Ok(PairingOutcome::Abandoned(..)) => {}
                Err(e) => {
                    tracing::error!(error = %e, "pairing pass failed");
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
            }
        }

        tracing::info!("pairing loop stopped");
    }
}

fn record_wants_partner(record: &ClientRecord) -> bool {
    record.queue_state() == QueueState::Queued
}
