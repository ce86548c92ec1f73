//! Relay domain - wire messages, routed signals and directory records.

mod messages;
mod record;
mod signal;

pub use messages::{ClientMessage, EnvelopeError, IceRelay, SdpRelay, ServerMessage};
pub use record::{ClientRecord, QueueAdmission, QueueState};
pub use signal::{Role, RoutedSignal, Signal};
