//! Process liveness heartbeat.
//!
//! Keeps `server:<id>` alive in the directory so the pairing loop on any
//! process can tell whether a client's owner is still running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::foundation::ServerId;
use crate::ports::{ClientDirectory, StoreError};

pub struct ServerHeartbeat {
    server_id: ServerId,
    directory: Arc<dyn ClientDirectory>,
    interval: Duration,
    ttl_secs: u64,
}

impl ServerHeartbeat {
    pub fn new(
        server_id: ServerId,
        directory: Arc<dyn ClientDirectory>,
        interval: Duration,
        ttl_secs: u64,
    ) -> Self {
        Self {
            server_id,
            directory,
            interval,
            ttl_secs,
        }
    }

    /// Write the liveness record once.
    pub async fn beat(&self) -> Result<(), StoreError> {
        self.directory
            .refresh_server(&self.server_id, self.ttl_secs)
            .await
    }

    /// Refresh on every tick until shutdown. The first tick fires at once.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.beat().await {
                        tracing::warn!(server_id = %self.server_id, error = %e, "heartbeat failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(server_id = %self.server_id, "heartbeat stopped");
    }
}
