//! Outbound delivery pump.
//!
//! Drains one session's outbound queue onto the socket in order and sends a
//! ping on every keepalive tick. Any failed write ends the pump.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::application::Outbound;
use crate::domain::foundation::ClientId;

/// Why the pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// A close was requested through the queue, or the queue was dropped.
    Closed,
    /// The session was evicted from the registry.
    Evicted,
    /// Writing a frame or a ping failed; the peer is presumed gone.
    WriteFailed,
}

pub async fn run_delivery_pump<S>(
    sink: &mut S,
    outbound: &mut mpsc::Receiver<Outbound>,
    mut evicted: watch::Receiver<bool>,
    keepalive: Duration,
    client_id: ClientId,
) -> PumpExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Queued frames go out before an eviction is acted on.
            biased;

            item = outbound.recv() => match item {
                Some(Outbound::Data(message)) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(client_id = %client_id, error = %e, "dropping unserializable message");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::debug!(client_id = %client_id, error = %e, "write failed");
                        return PumpExit::WriteFailed;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Closed;
                }
            },

            changed = evicted.changed() => {
                if changed.is_err() || *evicted.borrow() {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Evicted;
                }
            }

            _ = ticker.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    tracing::debug!(client_id = %client_id, error = %e, "keepalive failed");
                    return PumpExit::WriteFailed;
                }
            }
        }
    }
}
