//! Integration tests for delivery across relay processes.
//!
//! Simulates a fleet of two processes sharing one directory, queue and
//! broker:
//! 1. Each process runs its signal router on its own channel
//! 2. Clients on different processes are paired by either pairing loop
//! 3. Chat, signaling and unpair notices cross the broker
//! 4. A process that stops heartbeating is treated as dead

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use pairlink::adapters::memory::{InMemoryClientDirectory, InMemoryMatchQueue, InMemorySignalBus};
use pairlink::application::{
    InboundDispatcher, MatchmakingEngine, MatchmakingSettings, Outbound, PairingOutcome,
    ServerHeartbeat, Session, SessionLifecycle, SessionRegistry, SignalRouter,
};
use pairlink::domain::foundation::{ClientId, ServerId};
use pairlink::domain::relay::{ClientRecord, RoutedSignal, ServerMessage, Signal};
use pairlink::ports::{ClientDirectory, MatchQueue, SignalBus};

const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Store shared by every simulated process.
#[derive(Clone)]
struct SharedStore {
    directory: Arc<InMemoryClientDirectory>,
    queue: Arc<InMemoryMatchQueue>,
    bus: Arc<InMemorySignalBus>,
}

impl SharedStore {
    fn new() -> Self {
        Self {
            directory: Arc::new(InMemoryClientDirectory::new()),
            queue: Arc::new(InMemoryMatchQueue::new()),
            bus: Arc::new(InMemorySignalBus::new()),
        }
    }
}

struct Process {
    server_id: ServerId,
    engine: Arc<MatchmakingEngine>,
    lifecycle: SessionLifecycle,
    dispatcher: InboundDispatcher,
    shutdown: watch::Sender<bool>,
    router_task: JoinHandle<()>,
}

struct Client {
    session: Arc<Session>,
    outbound: mpsc::Receiver<Outbound>,
}

impl Client {
    fn id(&self) -> ClientId {
        self.session.id()
    }

    async fn next_message(&mut self) -> ServerMessage {
        match tokio::time::timeout(WAIT, self.outbound.recv()).await {
            Ok(Some(Outbound::Data(message))) => message,
            other => panic!("expected a message, got {:?}", other),
        }
    }

    async fn assert_quiet(&mut self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(self.outbound.try_recv().is_err());
    }
}

/// Start a process and wait until its signal router is subscribed.
async fn start_process(name: &str, store: &SharedStore) -> Process {
    let server_id = ServerId::new(name);
    let registry = Arc::new(SessionRegistry::new());

    ServerHeartbeat::new(server_id.clone(), store.directory.clone(), Duration::from_secs(10), 30)
        .beat()
        .await
        .unwrap();

    let router = Arc::new(SignalRouter::new(
        server_id.clone(),
        store.directory.clone(),
        store.bus.clone(),
        registry.clone(),
    ));
    let engine = Arc::new(MatchmakingEngine::new(
        store.directory.clone(),
        store.queue.clone(),
        router.clone(),
        registry.clone(),
        MatchmakingSettings {
            pop_timeout: Duration::from_millis(20),
            ..MatchmakingSettings::default()
        },
    ));
    let lifecycle = SessionLifecycle::new(
        server_id.clone(),
        registry,
        store.directory.clone(),
        engine.clone(),
        64,
        7200,
    );

    let (shutdown, shutdown_rx) = watch::channel(false);
    let router_task = {
        let router = router.clone();
        tokio::spawn(async move { router.run(shutdown_rx).await })
    };

    let channel = server_id.signal_channel();
    tokio::time::timeout(WAIT, async {
        while store.bus.subscriber_count(&channel).await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    Process {
        server_id,
        dispatcher: InboundDispatcher::new(engine.clone(), router),
        engine,
        lifecycle,
        shutdown,
        router_task,
    }
}

impl Process {
    async fn connect(&self) -> Client {
        let opened = self.lifecycle.open("198.51.100.4").await.unwrap();
        let mut client = Client {
            session: opened.session,
            outbound: opened.outbound,
        };
        assert!(matches!(client.next_message().await, ServerMessage::Welcome { .. }));
        client
    }

    async fn send(&self, client: &Client, frame: &str) {
        self.dispatcher.handle_text(&client.session, frame).await;
    }

    async fn stop(self) {
        self.shutdown.send_replace(true);
        tokio::time::timeout(WAIT, self.router_task).await.unwrap().unwrap();
    }
}

// =============================================================================
// Cross-process Pairing
// =============================================================================

#[tokio::test]
async fn clients_on_different_processes_are_paired_through_the_broker() {
    let store = SharedStore::new();
    let p1 = start_process("relay-1", &store).await;
    let p2 = start_process("relay-2", &store).await;

    let mut a = p1.connect().await;
    let mut b = p2.connect().await;
    p1.send(&a, r#"{"op":"join_queue"}"#).await;
    p2.send(&b, r#"{"op":"join_queue"}"#).await;

    // Either process may run the pass; relay-2 does here.
    assert_eq!(
        p2.engine.pair_next().await.unwrap(),
        PairingOutcome::Paired {
            initiator: a.id(),
            responder: b.id()
        }
    );

    assert_eq!(
        a.next_message().await,
        ServerMessage::MatchFound {
            partner: b.id(),
            should_call: true
        }
    );
    assert_eq!(
        b.next_message().await,
        ServerMessage::MatchFound {
            partner: a.id(),
            should_call: false
        }
    );
    assert_eq!(a.session.partner().await, Some(b.id()));
    assert_eq!(b.session.partner().await, Some(a.id()));

    p1.stop().await;
    p2.stop().await;
}

#[tokio::test]
async fn chat_and_signaling_cross_processes() {
    let store = SharedStore::new();
    let p1 = start_process("relay-1", &store).await;
    let p2 = start_process("relay-2", &store).await;

    let mut a = p1.connect().await;
    let mut b = p2.connect().await;
    p1.send(&a, r#"{"op":"join_queue"}"#).await;
    p2.send(&b, r#"{"op":"join_queue"}"#).await;
    p1.engine.pair_next().await.unwrap();
    a.next_message().await;
    b.next_message().await;

    p1.send(&a, r#"{"op":"chat","data":{"message":"from relay-1"}}"#).await;
    p2.send(&b, r#"{"op":"chat","data":{"message":"from relay-2"}}"#).await;
    p1.send(&a, r#"{"op":"webrtc_offer","data":{"sdp":"offer"}}"#).await;

    assert_eq!(b.next_message().await, ServerMessage::chat("from relay-1"));
    assert_eq!(a.next_message().await, ServerMessage::chat("from relay-2"));
    match b.next_message().await {
        ServerMessage::WebrtcOffer { data } => {
            assert_eq!(data.from, a.id());
            assert_eq!(data.sdp, "offer");
        }
        other => panic!("expected offer, got {:?}", other),
    }

    p1.stop().await;
    p2.stop().await;
}

#[tokio::test]
async fn disconnect_on_one_process_notifies_partner_on_another() {
    let store = SharedStore::new();
    let p1 = start_process("relay-1", &store).await;
    let p2 = start_process("relay-2", &store).await;

    let mut a = p1.connect().await;
    let mut b = p2.connect().await;
    p1.send(&a, r#"{"op":"join_queue"}"#).await;
    p2.send(&b, r#"{"op":"join_queue"}"#).await;
    p1.engine.pair_next().await.unwrap();
    a.next_message().await;
    b.next_message().await;

    p1.lifecycle.close(a.id()).await;

    assert_eq!(b.next_message().await, ServerMessage::PartnerDisconnected);
    b.assert_quiet().await;
    assert_eq!(b.session.partner().await, None);
    assert!(store.directory.get(&a.id()).await.unwrap().is_none());
    assert_eq!(store.directory.get(&b.id()).await.unwrap().unwrap().partner_id, None);

    p1.stop().await;
    p2.stop().await;
}

#[tokio::test]
async fn stale_unpair_notice_does_not_clear_new_partner() {
    let store = SharedStore::new();
    let p1 = start_process("relay-1", &store).await;
    let p2 = start_process("relay-2", &store).await;

    let mut a = p1.connect().await;
    let mut b = p2.connect().await;
    let mut c = p2.connect().await;

    p1.send(&a, r#"{"op":"join_queue"}"#).await;
    p2.send(&b, r#"{"op":"join_queue"}"#).await;
    p1.engine.pair_next().await.unwrap();
    a.next_message().await;
    b.next_message().await;

    // b moves on and is paired with c before any late notice about a.
    p2.send(&b, r#"{"op":"next"}"#).await;
    assert_eq!(a.next_message().await, ServerMessage::PartnerDisconnected);
    p2.send(&b, r#"{"op":"join_queue"}"#).await;
    p2.send(&c, r#"{"op":"join_queue"}"#).await;
    p2.engine.pair_next().await.unwrap();
    b.next_message().await;
    c.next_message().await;

    // A leftover notice naming a as the former partner arrives late.
    let late = RoutedSignal::new(
        b.id(),
        Signal::Unpaired {
            former_partner: a.id(),
        },
    )
    .encode()
    .unwrap();
    store
        .bus
        .publish(&p2.server_id.signal_channel(), late)
        .await
        .unwrap();

    b.assert_quiet().await;
    assert_eq!(b.session.partner().await, Some(c.id()));

    p1.stop().await;
    p2.stop().await;
}

// =============================================================================
// Process Liveness
// =============================================================================

#[tokio::test]
async fn client_owned_by_dead_process_is_never_paired() {
    let store = SharedStore::new();
    let p1 = start_process("relay-1", &store).await;

    let mut a = p1.connect().await;
    // A record left behind by a process whose heartbeat has lapsed.
    let ghost = ClientId::new();
    store
        .directory
        .register(&ClientRecord::new(ghost, "192.0.2.1", ServerId::new("relay-dead")), 7200)
        .await
        .unwrap();

    p1.send(&a, r#"{"op":"join_queue"}"#).await;
    p1.engine.join_queue(ghost).await.unwrap();

    assert_eq!(
        p1.engine.pair_next().await.unwrap(),
        PairingOutcome::Abandoned(a.id(), ghost)
    );
    a.assert_quiet().await;
    assert_eq!(store.queue.len().await.unwrap(), 0);

    p1.stop().await;
}

#[tokio::test]
async fn router_stops_on_shutdown_and_releases_its_channel() {
    let store = SharedStore::new();
    let p1 = start_process("relay-1", &store).await;
    let channel = p1.server_id.signal_channel();
    assert_eq!(store.bus.subscriber_count(&channel).await, 1);

    p1.stop().await;

    assert_eq!(store.bus.subscriber_count(&channel).await, 0);
}
