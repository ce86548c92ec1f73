//! Wire message types exchanged with connected clients.
//!
//! Defines the protocol between server and clients:
//! - Client → Server: `{"op": "...", "data": {...}}` envelopes
//! - Server → Client: flat objects tagged by `op`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{ClientId, Timestamp};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message after the handshake, carries the assigned id.
    Welcome {
        message: String,
        client_id: ClientId,
        timestamp: u64,
    },

    /// Chat text relayed from the partner.
    Chat { message: String },

    /// A partner was assigned. Exactly one side has `should_call` set.
    MatchFound { partner: ClientId, should_call: bool },

    /// The partner left, moved on, or disconnected.
    PartnerDisconnected,

    /// Error occurred while handling a client request.
    Error { message: String },

    /// SDP offer relayed from the partner.
    WebrtcOffer { data: SdpRelay },

    /// SDP answer relayed from the partner.
    WebrtcAnswer { data: SdpRelay },

    /// ICE candidate relayed from the partner.
    IceCandidate { data: IceRelay },
}

impl ServerMessage {
    /// Greeting sent once the connection is registered.
    pub fn welcome(client_id: ClientId) -> Self {
        ServerMessage::Welcome {
            message: "Hello from server".to_string(),
            client_id,
            timestamp: Timestamp::now().as_unix_secs(),
        }
    }

    pub fn chat(message: impl Into<String>) -> Self {
        ServerMessage::Chat {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Wire name of this message, for logging.
    pub fn op(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Chat { .. } => "chat",
            ServerMessage::MatchFound { .. } => "match_found",
            ServerMessage::PartnerDisconnected => "partner_disconnected",
            ServerMessage::Error { .. } => "error",
            ServerMessage::WebrtcOffer { .. } => "webrtc_offer",
            ServerMessage::WebrtcAnswer { .. } => "webrtc_answer",
            ServerMessage::IceCandidate { .. } => "ice_candidate",
        }
    }
}

/// Relayed session description, stamped with the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdpRelay {
    pub from: ClientId,
    pub sdp: String,
}

/// Relayed ICE candidate, stamped with the sender.
///
/// The candidate object is opaque to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceRelay {
    pub from: ClientId,
    pub candidate: serde_json::Value,
}

// ============================================
// Client → Server Messages
// ============================================

/// All operations a client can request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinQueue,
    Chat { message: String },
    Next,
    Disconnect,
    WebrtcOffer { sdp: String },
    WebrtcAnswer { sdp: String },
    IceCandidate { candidate: serde_json::Value },
}

/// Raw envelope before the op-specific payload is interpreted.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    op: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatData {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SdpData {
    sdp: String,
}

#[derive(Debug, Deserialize)]
struct IceData {
    candidate: serde_json::Value,
}

/// Reasons an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown op: {0}")]
    UnknownOp(String),

    #[error("invalid data for op '{op}': {source}")]
    InvalidData {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let envelope: RawEnvelope = serde_json::from_str(text).map_err(EnvelopeError::Malformed)?;

        let message = match envelope.op.as_str() {
            "join_queue" => ClientMessage::JoinQueue,
            "next" => ClientMessage::Next,
            "disconnect" => ClientMessage::Disconnect,
            "chat" => {
                let data: ChatData = payload("chat", envelope.data)?;
                ClientMessage::Chat {
                    message: data.message,
                }
            }
            "webrtc_offer" => {
                let data: SdpData = payload("webrtc_offer", envelope.data)?;
                ClientMessage::WebrtcOffer { sdp: data.sdp }
            }
            "webrtc_answer" => {
                let data: SdpData = payload("webrtc_answer", envelope.data)?;
                ClientMessage::WebrtcAnswer { sdp: data.sdp }
            }
            "ice_candidate" => {
                let data: IceData = payload("ice_candidate", envelope.data)?;
                ClientMessage::IceCandidate {
                    candidate: data.candidate,
                }
            }
            _ => return Err(EnvelopeError::UnknownOp(envelope.op)),
        };

        Ok(message)
    }

    /// Wire name of this operation, for logging.
    pub fn op(&self) -> &'static str {
        match self {
            ClientMessage::JoinQueue => "join_queue",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Next => "next",
            ClientMessage::Disconnect => "disconnect",
            ClientMessage::WebrtcOffer { .. } => "webrtc_offer",
            ClientMessage::WebrtcAnswer { .. } => "webrtc_answer",
            ClientMessage::IceCandidate { .. } => "ice_candidate",
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    op: &'static str,
    data: serde_json::Value,
) -> Result<T, EnvelopeError> {
    serde_json::from_value(data).map_err(|source| EnvelopeError::InvalidData { op, source })
}
