//! Cross-instance signal router.
//!
//! Resolves "deliver this to client X" into a publish on the channel of the
//! process that owns X's connection, and feeds signals arriving on this
//! process's own channel into the local session registry.
//!
//! ```text
//! Process A                         Broker                    Process B
//! send_to_client(X) ─ directory ─►  signal:<B>  ─ subscribe ─► registry.apply(X)
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;

use super::session_registry::{Delivery, SessionRegistry};
use crate::domain::foundation::{ClientId, ServerId};
use crate::domain::relay::{RoutedSignal, Signal};
use crate::ports::{ClientDirectory, SignalBus, StoreError};

/// Why a signal could not be routed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("client {0} is not in the directory")]
    UnknownClient(ClientId),

    #[error("client {0} has no owning process")]
    NoOwningProcess(ClientId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode routed signal: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct SignalRouter {
    server_id: ServerId,
    directory: Arc<dyn ClientDirectory>,
    bus: Arc<dyn SignalBus>,
    registry: Arc<SessionRegistry>,
    resubscribe_backoff: Duration,
}

impl SignalRouter {
    pub fn new(
        server_id: ServerId,
        directory: Arc<dyn ClientDirectory>,
        bus: Arc<dyn SignalBus>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            server_id,
            directory,
            bus,
            registry,
            resubscribe_backoff: Duration::from_millis(500),
        }
    }

    /// Wait this long before resubscribing after the channel drops.
    pub fn with_resubscribe_backoff(mut self, backoff: Duration) -> Self {
        self.resubscribe_backoff = backoff;
        self
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Deliver `signal` to `client_id` wherever its connection lives.
    ///
    /// Clients owned by this process are handed to the local registry
    /// directly; everyone else goes through the owner's broker channel.
    pub async fn send_to_client(&self, client_id: ClientId, signal: Signal) -> Result<(), RouteError> {
        let record = self
            .directory
            .get(&client_id)
            .await?
            .ok_or(RouteError::UnknownClient(client_id))?;

        let owner = record
            .owner()
            .ok_or(RouteError::NoOwningProcess(client_id))?;

        if *owner == self.server_id {
            let delivery = self.registry.apply(&client_id, signal).await;
            tracing::trace!(client_id = %client_id, ?delivery, "delivered locally");
            return Ok(());
        }

        let kind = signal.kind();
        let raw = RoutedSignal::new(client_id, signal).encode()?;
        self.bus.publish(&owner.signal_channel(), raw).await?;
        tracing::trace!(client_id = %client_id, server_id = %owner, kind, "published signal");
        Ok(())
    }

    /// Subscribe to this process's own channel.
    pub async fn subscribe(&self) -> Result<BoxStream<'static, String>, StoreError> {
        self.bus.subscribe(&self.server_id.signal_channel()).await
    }

    /// Decode one broker message and hand it to the local session.
    pub async fn deliver_raw(&self, raw: &str) -> Delivery {
        let routed = match RoutedSignal::decode(raw) {
            Ok(routed) => routed,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable routed signal");
                return Delivery::NotConnected;
            }
        };

        let delivery = self.registry.apply(&routed.client_id, routed.payload).await;
        if delivery == Delivery::NotConnected {
            tracing::debug!(client_id = %routed.client_id, "signal for departed client dropped");
        }
        delivery
    }

    /// Drain a subscription until it ends or shutdown fires.
    ///
    /// Returns `true` if shutdown was requested.
    pub async fn consume(
        &self,
        mut messages: BoxStream<'static, String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return true;
                    }
                }
                next = messages.next() => match next {
                    Some(raw) => {
                        self.deliver_raw(&raw).await;
                    }
                    None => return false,
                },
            }
        }
    }

    /// Run the subscription loop until shutdown, resubscribing on loss.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(server_id = %self.server_id, "signal router started");

        while !*shutdown.borrow() {
            match self.subscribe().await {
                Ok(stream) => {
                    if self.consume(stream, &mut shutdown).await {
                        break;
                    }
                    tracing::warn!(server_id = %self.server_id, "signal subscription ended, resubscribing");
                }
                Err(e) => {
                    tracing::error!(error = %e, server_id = %self.server_id, "signal subscription failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.resubscribe_backoff) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::info!(server_id = %self.server_id, "signal router stopped");
    }
}
