//! Pairlink relay server.
//!
//! Loads configuration from the environment, connects the shared store
//! (Redis, or in-memory when none is configured), starts the background
//! loops and serves the HTTP/WebSocket endpoints until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use pairlink::adapters::auth::{HmacSessionTokens, SessionTokenError};
use pairlink::adapters::http::{app_router, SessionTokenState};
use pairlink::adapters::memory::{
    InMemoryClientDirectory, InMemoryIpBanList, InMemoryMatchQueue, InMemorySignalBus,
};
use pairlink::adapters::rate_limiter::{InMemoryRateLimiter, RedisRateLimiter};
use pairlink::adapters::redis::{
    RedisClientDirectory, RedisIpBanList, RedisMatchQueue, RedisSignalBus,
};
use pairlink::adapters::websocket::{ConnectionSettings, HandshakeAdmission, WebSocketState};
use pairlink::application::{
    InboundDispatcher, MatchmakingEngine, MatchmakingSettings, ServerHeartbeat, SessionLifecycle,
    SessionRegistry, SignalRouter,
};
use pairlink::config::{AppConfig, ConfigError, RedisConfig, ServerConfig, ValidationError};
use pairlink::ports::{ClientDirectory, IpBanList, MatchQueue, RateLimiter, SignalBus};

/// How long background loops get to notice shutdown before they are abandoned.
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("timed out connecting to redis")]
    RedisTimeout,

    #[error(transparent)]
    SessionToken(#[from] SessionTokenError),

    #[error("server I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// The shared-store ports, backed by one implementation family.
struct Stores {
    directory: Arc<dyn ClientDirectory>,
    queue: Arc<dyn MatchQueue>,
    bus: Arc<dyn SignalBus>,
    bans: Arc<dyn IpBanList>,
    limiter: Arc<dyn RateLimiter>,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            directory: Arc::new(InMemoryClientDirectory::new()),
            queue: Arc::new(InMemoryMatchQueue::new()),
            bus: Arc::new(InMemorySignalBus::new()),
            bans: Arc::new(InMemoryIpBanList::new()),
            limiter: Arc::new(InMemoryRateLimiter::new()),
        }
    }

    async fn redis(config: &RedisConfig) -> Result<Self, StartupError> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = connect_redis(&client, config.timeout()).await?;
        // BRPOP parks its connection, so the pairing loop gets its own.
        let blocking = connect_redis(&client, config.timeout()).await?;

        Ok(Self {
            directory: Arc::new(RedisClientDirectory::new(conn.clone())),
            queue: Arc::new(RedisMatchQueue::new(conn.clone(), blocking)),
            bus: Arc::new(RedisSignalBus::new(client.clone(), conn.clone())),
            bans: Arc::new(RedisIpBanList::new(conn.clone())),
            limiter: Arc::new(RedisRateLimiter::new(conn)),
        })
    }
}

async fn connect_redis(
    client: &redis::Client,
    timeout: Duration,
) -> Result<MultiplexedConnection, StartupError> {
    let conn = tokio::time::timeout(timeout, client.get_multiplexed_tokio_connection())
        .await
        .map_err(|_| StartupError::RedisTimeout)??;
    Ok(conn)
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.server);

    let server_id = config.server.server_id();
    let addr = config.server.socket_addr()?;

    let stores = match &config.redis {
        Some(redis) => {
            let stores = Stores::redis(redis).await?;
            tracing::info!("connected to redis");
            stores
        }
        None => {
            tracing::warn!("no redis configured, running as a single process on in-memory stores");
            Stores::in_memory()
        }
    };

    let relay = &config.relay;
    let registry = Arc::new(SessionRegistry::new());
    let router = Arc::new(
        SignalRouter::new(
            server_id.clone(),
            stores.directory.clone(),
            stores.bus.clone(),
            registry.clone(),
        )
        .with_resubscribe_backoff(relay.retry_backoff()),
    );
    let engine = Arc::new(MatchmakingEngine::new(
        stores.directory.clone(),
        stores.queue.clone(),
        router.clone(),
        registry.clone(),
        MatchmakingSettings {
            record_ttl_secs: relay.client_record_ttl_secs,
            pop_timeout: relay.queue_pop_timeout(),
            retry_backoff: relay.retry_backoff(),
        },
    ));
    let lifecycle = Arc::new(SessionLifecycle::new(
        server_id.clone(),
        registry.clone(),
        stores.directory.clone(),
        engine.clone(),
        relay.outbound_queue_capacity,
        relay.client_record_ttl_secs,
    ));
    let heartbeat = Arc::new(ServerHeartbeat::new(
        server_id.clone(),
        stores.directory.clone(),
        relay.server_heartbeat(),
        relay.server_ttl_secs,
    ));

    let tokens = Arc::new(HmacSessionTokens::new(
        config.auth.session_token_secret(),
        config.auth.session_token_ttl(),
    )?);
    let admission = Arc::new(HandshakeAdmission::new(
        config.server.allowed_origins_list(),
        stores.bans.clone(),
        stores.limiter.clone(),
        config.rate_limit.policy(),
        tokens.clone(),
    ));

    let ws_state = WebSocketState {
        admission,
        lifecycle: lifecycle.clone(),
        dispatcher: Arc::new(InboundDispatcher::new(engine.clone(), router.clone())),
        settings: ConnectionSettings {
            keepalive: relay.keepalive_interval(),
            read_timeout: relay.read_timeout(),
            close_grace: relay.close_grace(),
        },
    };
    let app = app_router(ws_state, SessionTokenState::new(tokens));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background: Vec<JoinHandle<()>> = vec![
        {
            let heartbeat = heartbeat.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { heartbeat.run(shutdown).await })
        },
        {
            let router = router.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { router.run(shutdown).await })
        },
        {
            let engine = engine.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        },
    ];

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(server_id = %server_id, %addr, "pairlink listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "server stopped with error");
    }

    // Stop pairing before tearing sessions down so nobody is matched mid-exit.
    shutdown_tx.send_replace(true);
    lifecycle.close_all().await;
    for handle in background {
        if tokio::time::timeout(BACKGROUND_STOP_TIMEOUT, handle).await.is_err() {
            tracing::warn!("background task did not stop in time");
        }
    }

    tracing::info!(server_id = %server_id, "pairlink stopped");
    served.map_err(StartupError::from)
}
