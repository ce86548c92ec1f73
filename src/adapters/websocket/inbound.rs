//! Inbound read loop.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};

use crate::application::{Flow, InboundDispatcher, Session};

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadExit {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// The client asked to disconnect.
    ClientDisconnect,
    /// No frame, pong included, arrived within the read timeout.
    TimedOut,
    ReadFailed,
}

/// Read frames until the connection ends, handing text frames to the
/// dispatcher. Every frame, control frames included, resets the timeout.
pub async fn run_read_loop<S, E>(
    stream: &mut S,
    session: &Session,
    dispatcher: &InboundDispatcher,
    read_timeout: Duration,
) -> ReadExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let client_id = session.id();

    loop {
        let frame = match tokio::time::timeout(read_timeout, stream.next()).await {
            Err(_) => {
                tracing::debug!(client_id = %client_id, "read timeout");
                return ReadExit::TimedOut;
            }
            Ok(None) => return ReadExit::PeerClosed,
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id = %client_id, error = %e, "read failed");
                return ReadExit::ReadFailed;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                if dispatcher.handle_text(session, &text).await == Flow::Disconnect {
                    return ReadExit::ClientDisconnect;
                }
            }
            Message::Binary(_) => {
                tracing::warn!(client_id = %client_id, "ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return ReadExit::PeerClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::memory::{InMemoryClientDirectory, InMemoryMatchQueue, InMemorySignalBus};
    use crate::application::{MatchmakingEngine, MatchmakingSettings, SessionRegistry, SignalRouter};
    use crate::domain::foundation::{ClientId, ServerId};
    use crate::domain::relay::ClientRecord;
    use crate::ports::{ClientDirectory, MatchQueue};
    use futures::stream;

    struct Fixture {
        dispatcher: InboundDispatcher,
        session: Arc<Session>,
        queue: Arc<InMemoryMatchQueue>,
    }

    async fn fixture() -> Fixture {
        let server_id = ServerId::new("relay-test");
        let registry = Arc::new(SessionRegistry::new());
        let directory = Arc::new(InMemoryClientDirectory::new());
        let queue = Arc::new(InMemoryMatchQueue::new());
        let router = Arc::new(SignalRouter::new(
            server_id.clone(),
            directory.clone(),
            Arc::new(InMemorySignalBus::new()),
            registry.clone(),
        ));
        let engine = Arc::new(MatchmakingEngine::new(
            directory.clone(),
            queue.clone(),
            router.clone(),
            registry.clone(),
            MatchmakingSettings::default(),
        ));

        let id = ClientId::new();
        let (session, _rx) = Session::new(id, "127.0.0.1", 8);
        registry.register(session.clone()).await.unwrap();
        directory
            .register(&ClientRecord::new(id, "127.0.0.1", server_id), 7200)
            .await
            .unwrap();

        Fixture {
            dispatcher: InboundDispatcher::new(engine, router),
            session,
            queue,
        }
    }

    fn frames(items: Vec<Result<Message, String>>) -> impl Stream<Item = Result<Message, String>> + Unpin {
        stream::iter(items)
    }

    #[tokio::test]
    async fn text_frames_are_dispatched_until_stream_ends() {
        let f = fixture().await;
        let mut input = frames(vec![
            Ok(Message::Ping(vec![1])),
            Ok(Message::Text(r#"{"op":"join_queue"}"#.into())),
            Ok(Message::Binary(vec![0, 1])),
        ]);

        let exit = run_read_loop(&mut input, &f.session, &f.dispatcher, Duration::from_secs(5)).await;

        assert_eq!(exit, ReadExit::PeerClosed);
        assert_eq!(f.queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn disconnect_op_stops_reading() {
        let f = fixture().await;
        let mut input = frames(vec![
            Ok(Message::Text(r#"{"op":"disconnect"}"#.into())),
            Ok(Message::Text(r#"{"op":"join_queue"}"#.into())),
        ]);

        let exit = run_read_loop(&mut input, &f.session, &f.dispatcher, Duration::from_secs(5)).await;

        assert_eq!(exit, ReadExit::ClientDisconnect);
        assert_eq!(f.queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn close_frame_and_errors_end_the_loop() {
        let f = fixture().await;

        let mut closing = frames(vec![Ok(Message::Close(None))]);
        assert_eq!(
            run_read_loop(&mut closing, &f.session, &f.dispatcher, Duration::from_secs(5)).await,
            ReadExit::PeerClosed
        );

        let mut failing = frames(vec![Err("reset".to_string())]);
        assert_eq!(
            run_read_loop(&mut failing, &f.session, &f.dispatcher, Duration::from_secs(5)).await,
            ReadExit::ReadFailed
        );
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let f = fixture().await;
        let mut silent = stream::pending::<Result<Message, String>>();

        let exit = run_read_loop(&mut silent, &f.session, &f.dispatcher, Duration::from_millis(20)).await;
        assert_eq!(exit, ReadExit::TimedOut);
    }
}
