//! In-memory signal bus.
//!
//! One `broadcast` channel per broker channel name. Several simulated relay
//! processes can share one bus to exercise cross-instance routing.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, Mutex};

use crate::ports::{SignalBus, StoreError};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct InMemorySignalBus {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemorySignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SignalBus for InMemorySignalBus {
    async fn publish(&self, channel: &str, message: String) -> Result<(), StoreError> {
        let channels = self.channels.lock().await;
        if let Some(tx) = channels.get(channel) {
            // No receivers is fine: fire-and-forget.
            let _ = tx.send(message);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError> {
        let rx = {
            let mut channels = self.channels.lock().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let messages = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "signal subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(messages.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_messages_in_order() {
        let bus = InMemorySignalBus::new();
        let mut messages = bus.subscribe("signal:a").await.unwrap();

        bus.publish("signal:a", "one".into()).await.unwrap();
        bus.publish("signal:a", "two".into()).await.unwrap();

        assert_eq!(messages.next().await.as_deref(), Some("one"));
        assert_eq!(messages.next().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = InMemorySignalBus::new();
        let mut a = bus.subscribe("signal:a").await.unwrap();
        let _b = bus.subscribe("signal:b").await.unwrap();

        bus.publish("signal:b", "for b".into()).await.unwrap();
        bus.publish("signal:a", "for a".into()).await.unwrap();

        assert_eq!(a.next().await.as_deref(), Some("for a"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = InMemorySignalBus::new();
        bus.publish("signal:nobody", "lost".into()).await.unwrap();
        assert_eq!(bus.subscriber_count("signal:nobody").await, 0);
    }
}
