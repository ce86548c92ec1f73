//! SignalBus port - Broker channels between relay processes.
//!
//! Each process subscribes to exactly one channel for its lifetime and
//! publishes to the channel of whichever process owns the target client.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::StoreError;

/// Port for the cross-instance publish/subscribe broker.
///
/// Delivery is fire-and-forget: a message published to a channel with no
/// subscriber is lost.
#[async_trait]
pub trait SignalBus: Send + Sync {
    /// Publish a raw message on `channel`.
    async fn publish(&self, channel: &str, message: String) -> Result<(), StoreError>;

    /// Subscribe to `channel`.
    ///
    /// The stream ends when the underlying connection is lost; callers
    /// resubscribe.
    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError>;
}
