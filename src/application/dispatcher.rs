//! Inbound dispatcher: turns one decoded client operation into its effect.
//!
//! Every handler absorbs its own failures. The only thing that reaches the
//! transport is whether the connection should keep going.

use std::sync::Arc;

use super::matchmaking::MatchmakingEngine;
use super::session_registry::Session;
use super::signal_router::SignalRouter;
use crate::domain::relay::{ClientMessage, IceRelay, SdpRelay, ServerMessage, Signal};

/// What the read loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Disconnect,
}

pub struct InboundDispatcher {
    engine: Arc<MatchmakingEngine>,
    router: Arc<SignalRouter>,
}

impl InboundDispatcher {
    pub fn new(engine: Arc<MatchmakingEngine>, router: Arc<SignalRouter>) -> Self {
        Self { engine, router }
    }

    /// Decode a text frame and dispatch it. Bad frames are logged and
    /// skipped.
    pub async fn handle_text(&self, session: &Session, text: &str) -> Flow {
        match ClientMessage::decode(text) {
            Ok(message) => self.dispatch(session, message).await,
            Err(e) => {
                tracing::warn!(client_id = %session.id(), error = %e, "ignoring client frame");
                Flow::Continue
            }
        }
    }

    pub async fn dispatch(&self, session: &Session, message: ClientMessage) -> Flow {
        let id = session.id();
        tracing::debug!(client_id = %id, op = message.op(), "client op");

        match message {
            ClientMessage::JoinQueue => {
                if let Err(e) = self.engine.join_queue(id).await {
                    tracing::warn!(client_id = %id, error = %e, "join_queue failed");
                }
            }
            ClientMessage::Next => {
                if let Err(e) = self.engine.next(id).await {
                    tracing::warn!(client_id = %id, error = %e, "next failed");
                }
            }
            ClientMessage::Disconnect => return Flow::Disconnect,
            ClientMessage::Chat { message } => {
                self.relay_chat(session, message).await;
            }
            ClientMessage::WebrtcOffer { sdp } => {
                let data = SdpRelay { from: id, sdp };
                self.relay_signaling(session, ServerMessage::WebrtcOffer { data })
                    .await;
            }
            ClientMessage::WebrtcAnswer { sdp } => {
                let data = SdpRelay { from: id, sdp };
                self.relay_signaling(session, ServerMessage::WebrtcAnswer { data })
                    .await;
            }
            ClientMessage::IceCandidate { candidate } => {
                let data = IceRelay { from: id, candidate };
                self.relay_signaling(session, ServerMessage::IceCandidate { data })
                    .await;
            }
        }
        Flow::Continue
    }

    /// Chat is the one op whose failure the sender hears about.
    async fn relay_chat(&self, session: &Session, message: String) {
        let Some(partner) = session.partner().await else {
            session.send(ServerMessage::error("No partner connected"));
            return;
        };

        let signal = Signal::relay(ServerMessage::chat(message));
        if let Err(e) = self.router.send_to_client(partner, signal).await {
            tracing::debug!(client_id = %session.id(), partner = %partner, error = %e, "chat not routed");
            session.send(ServerMessage::error("Partner unavailable"));
        }
    }

    async fn relay_signaling(&self, session: &Session, message: ServerMessage) {
        let op = message.op();
        let Some(partner) = session.partner().await else {
            tracing::debug!(client_id = %session.id(), op, "signaling without partner dropped");
            return;
        };

        if let Err(e) = self.router.send_to_client(partner, Signal::relay(message)).await {
            tracing::debug!(client_id = %session.id(), partner = %partner, op, error = %e, "signaling not routed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryClientDirectory, InMemoryMatchQueue, InMemorySignalBus};
    use crate::application::matchmaking::MatchmakingSettings;
    use crate::application::session_registry::{Outbound, SessionRegistry};
    use crate::domain::foundation::{ClientId, ServerId};
    use crate::domain::relay::ClientRecord;
    use crate::ports::{ClientDirectory, MatchQueue};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        dispatcher: InboundDispatcher,
        registry: Arc<SessionRegistry>,
        directory: Arc<InMemoryClientDirectory>,
        queue: Arc<InMemoryMatchQueue>,
        server_id: ServerId,
    }

    fn fixture() -> Fixture {
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
        Fixture {
            dispatcher: InboundDispatcher::new(engine, router),
            registry,
            directory,
            queue,
            server_id,
        }
    }

    impl Fixture {
        async fn connect(&self) -> (Arc<Session>, mpsc::Receiver<Outbound>) {
            let id = ClientId::new();
            let (session, rx) = Session::new(id, "127.0.0.1", 16);
            self.registry.register(session.clone()).await.unwrap();
            let record = ClientRecord::new(id, "127.0.0.1", self.server_id.clone());
            self.directory.register(&record, 7200).await.unwrap();
            (session, rx)
        }

        async fn link(&self, a: &Session, b: &Session) {
            self.directory.mark_queued(&a.id()).await.unwrap();
            self.directory.mark_queued(&b.id()).await.unwrap();
            assert!(self.directory.pair(&a.id(), &b.id(), 7200).await.unwrap());
            a.set_partner(b.id()).await;
            b.set_partner(a.id()).await;
        }
    }

    fn data(outbound: Option<Outbound>) -> ServerMessage {
        match outbound {
            Some(Outbound::Data(message)) => message,
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_reaches_partner() {
        let f = fixture();
        let (a, _rx_a) = f.connect().await;
        let (b, mut rx_b) = f.connect().await;
        f.link(&a, &b).await;

        let flow = f
            .dispatcher
            .handle_text(&a, r#"{"op":"chat","data":{"message":"hi"}}"#)
            .await;

        assert_eq!(flow, Flow::Continue);
        assert_eq!(data(rx_b.recv().await), ServerMessage::chat("hi"));
    }

    #[tokio::test]
    async fn chat_without_partner_returns_error_to_sender() {
        let f = fixture();
        let (a, mut rx_a) = f.connect().await;

        f.dispatcher
            .handle_text(&a, r#"{"op":"chat","data":{"message":"hi"}}"#)
            .await;

        assert!(matches!(data(rx_a.recv().await), ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn chat_to_vanished_partner_returns_error_to_sender() {
        let f = fixture();
        let (a, mut rx_a) = f.connect().await;
        a.set_partner(ClientId::new()).await;

        f.dispatcher
            .handle_text(&a, r#"{"op":"chat","data":{"message":"hi"}}"#)
            .await;

        assert_eq!(data(rx_a.recv().await), ServerMessage::error("Partner unavailable"));
    }

    #[tokio::test]
    async fn offer_is_stamped_with_sender() {
        let f = fixture();
        let (a, _rx_a) = f.connect().await;
        let (b, mut rx_b) = f.connect().await;
        f.link(&a, &b).await;

        f.dispatcher
            .handle_text(&a, r#"{"op":"webrtc_offer","data":{"sdp":"v=0"}}"#)
            .await;

        assert_eq!(
            data(rx_b.recv().await),
            ServerMessage::WebrtcOffer {
                data: SdpRelay {
                    from: a.id(),
                    sdp: "v=0".into()
                }
            }
        );
    }

    #[tokio::test]
    async fn ice_candidate_is_forwarded_verbatim() {
        let f = fixture();
        let (a, mut rx_a) = f.connect().await;
        let (b, _rx_b) = f.connect().await;
        f.link(&a, &b).await;

        f.dispatcher
            .handle_text(
                &b,
                r#"{"op":"ice_candidate","data":{"candidate":{"candidate":"c1","sdpMid":"0"}}}"#,
            )
            .await;

        assert_eq!(
            data(rx_a.recv().await),
            ServerMessage::IceCandidate {
                data: IceRelay {
                    from: b.id(),
                    candidate: json!({"candidate": "c1", "sdpMid": "0"})
                }
            }
        );
    }

    #[tokio::test]
    async fn signaling_without_partner_is_silent() {
        let f = fixture();
        let (a, mut rx_a) = f.connect().await;

        f.dispatcher
            .handle_text(&a, r#"{"op":"webrtc_answer","data":{"sdp":"x"}}"#)
            .await;

        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_queue_op_enqueues() {
        let f = fixture();
        let (a, _rx) = f.connect().await;

        f.dispatcher.handle_text(&a, r#"{"op":"join_queue"}"#).await;
        assert_eq!(f.queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bad_frames_do_not_end_the_connection() {
        let f = fixture();
        let (a, mut rx_a) = f.connect().await;

        assert_eq!(f.dispatcher.handle_text(&a, "not json").await, Flow::Continue);
        assert_eq!(
            f.dispatcher.handle_text(&a, r#"{"op":"teleport"}"#).await,
            Flow::Continue
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_op_ends_the_connection() {
        let f = fixture();
        let (a, _rx) = f.connect().await;
        assert_eq!(
            f.dispatcher.handle_text(&a, r#"{"op":"disconnect"}"#).await,
            Flow::Disconnect
        );
    }
}
