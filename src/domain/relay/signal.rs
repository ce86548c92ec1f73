//! Signals routed between relay processes.
//!
//! A signal names what should happen to one client's session. It travels
//! over the broker wrapped in a [`RoutedSignal`] and is applied by the
//! process that owns the client's connection.

use serde::{Deserialize, Serialize};

use super::messages::ServerMessage;
use crate::domain::foundation::ClientId;

/// Side of a pairing, fixed at match time.
///
/// The initiator is the first id popped from the queue and is the only side
/// that sends the peer-to-peer offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Whether this side originates the peer handshake.
    pub fn should_call(self) -> bool {
        matches!(self, Role::Initiator)
    }
}

/// State change or message destined for one client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    /// The client was matched with `partner`.
    Paired { partner: ClientId, role: Role },

    /// The client's pairing with `former_partner` ended.
    Unpaired { former_partner: ClientId },

    /// Plain message relay, no partner-state change.
    Relay { message: ServerMessage },
}

impl Signal {
    pub fn relay(message: ServerMessage) -> Self {
        Signal::Relay { message }
    }

    /// The envelope the client sees once this signal is applied.
    pub fn to_server_message(&self) -> ServerMessage {
        match self {
            Signal::Paired { partner, role } => ServerMessage::MatchFound {
                partner: *partner,
                should_call: role.should_call(),
            },
            Signal::Unpaired { .. } => ServerMessage::PartnerDisconnected,
            Signal::Relay { message } => message.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Paired { .. } => "paired",
            Signal::Unpaired { .. } => "unpaired",
            Signal::Relay { .. } => "relay",
        }
    }
}

/// Broker envelope: a signal addressed to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedSignal {
    pub client_id: ClientId,
    pub payload: Signal,
}

impl RoutedSignal {
    pub fn new(client_id: ClientId, payload: Signal) -> Self {
        Self { client_id, payload }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_initiator_calls() {
        assert!(Role::Initiator.should_call());
        assert!(!Role::Responder.should_call());
    }

    #[test]
    fn paired_signal_becomes_match_found() {
        let partner = ClientId::new();
        let signal = Signal::Paired {
            partner,
            role: Role::Responder,
        };
        assert_eq!(
            signal.to_server_message(),
            ServerMessage::MatchFound {
                partner,
                should_call: false
            }
        );
    }

    #[test]
    fn unpaired_signal_becomes_partner_disconnected() {
        let signal = Signal::Unpaired {
            former_partner: ClientId::new(),
        };
        assert_eq!(signal.to_server_message(), ServerMessage::PartnerDisconnected);
    }

    #[test]
    fn routed_envelope_wire_shape() {
        let client_id = ClientId::new();
        let routed = RoutedSignal::new(client_id, Signal::relay(ServerMessage::chat("hi")));
        let value: serde_json::Value = serde_json::from_str(&routed.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "client_id": client_id.to_string(),
                "payload": {"kind": "relay", "message": {"op": "chat", "message": "hi"}}
            })
        );
    }

    #[test]
    fn routed_envelope_decodes_what_it_encodes() {
        let routed = RoutedSignal::new(
            ClientId::new(),
            Signal::Paired {
                partner: ClientId::new(),
                role: Role::Initiator,
            },
        );
        let decoded = RoutedSignal::decode(&routed.encode().unwrap()).unwrap();
        assert_eq!(decoded, routed);
    }

    #[test]
    fn garbage_envelope_fails_to_decode() {
        assert!(RoutedSignal::decode(r#"{"client_id":"nope"}"#).is_err());
    }
}
