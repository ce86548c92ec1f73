//! Application layer - Relay services.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//!
//! - `SessionRegistry` - Process-local map of live sessions
//! - `SessionLifecycle` - Connect and the single teardown path
//! - `InboundDispatcher` - Client operation handlers
//! - `MatchmakingEngine` - Queue, pairing loop and unpairing
//! - `SignalRouter` - Cross-instance delivery
//! - `ServerHeartbeat` - Process liveness

mod dispatcher;
mod lifecycle;
mod matchmaking;
mod server_heartbeat;
mod session_registry;
mod signal_router;

pub use dispatcher::{Flow, InboundDispatcher};
pub use lifecycle::{LifecycleError, OpenedSession, SessionLifecycle};
pub use matchmaking::{
    JoinOutcome, MatchmakingEngine, MatchmakingError, MatchmakingSettings, PairingOutcome,
};
pub use server_heartbeat::ServerHeartbeat;
pub use session_registry::{Delivery, Outbound, RegistryError, Session, SessionRegistry};
pub use signal_router::{RouteError, SignalRouter};
