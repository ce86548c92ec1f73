//! Directory record shared by every relay process.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ClientId, ServerId};

/// Fleet-visible metadata for one connected client.
///
/// Always written as a whole; the store never patches single fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub ip: String,
    /// Process holding the live connection.
    pub server_id: Option<ServerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<ClientId>,
    #[serde(default)]
    pub in_queue: bool,
}

impl ClientRecord {
    /// Fresh record for a client that just connected to `server_id`.
    pub fn new(id: ClientId, ip: impl Into<String>, server_id: ServerId) -> Self {
        Self {
            id,
            ip: ip.into(),
            server_id: Some(server_id),
            partner_id: None,
            in_queue: false,
        }
    }

    /// Owning process, if it is usable as a routing address.
    pub fn owner(&self) -> Option<&ServerId> {
        self.server_id.as_ref().filter(|s| !s.is_empty())
    }

    /// Matchmaking state derived from the stored flags.
    pub fn queue_state(&self) -> QueueState {
        if self.partner_id.is_some() {
            QueueState::Matched
        } else if self.in_queue {
            QueueState::Queued
        } else {
            QueueState::Unqueued
        }
    }

    /// Directory key for this client.
    pub fn key(id: &ClientId) -> String {
        format!("client:{}", id)
    }
}

/// Per-client matchmaking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Unqueued,
    Queued,
    Matched,
}

/// Outcome of asking the directory to mark a client as waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAdmission {
    /// The flag was set; the caller must push the id onto the queue.
    Admitted,
    AlreadyQueued,
    AlreadyMatched,
    UnknownClient,
}
