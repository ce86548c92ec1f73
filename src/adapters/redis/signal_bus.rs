//! Redis Pub/Sub signal bus.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::MultiplexedConnection;

use crate::ports::{SignalBus, StoreError};

/// Publishes over a shared connection; each subscription opens its own
/// connection, as Redis requires.
pub struct RedisSignalBus {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisSignalBus {
    pub fn new(client: redis::Client, conn: MultiplexedConnection) -> Self {
        Self { client, conn }
    }
}

#[async_trait]
impl SignalBus for RedisSignalBus {
    async fn publish(&self, channel: &str, message: String) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError> {
        let mut pubsub = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .into_pubsub();

        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        let messages = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding non-text pubsub payload");
                    None
                }
            }
        });
        Ok(messages.boxed())
    }
}
