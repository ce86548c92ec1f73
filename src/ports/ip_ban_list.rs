//! IpBanList port - Temporary bans checked before a handshake.

use async_trait::async_trait;
use std::time::Duration;

use super::StoreError;

/// Port for the shared list of banned client addresses.
///
/// Bans expire on their own; `unban` lifts one early.
#[async_trait]
pub trait IpBanList: Send + Sync {
    /// Ban `ip` for `duration`, recording why.
    async fn ban(&self, ip: &str, duration: Duration, reason: &str) -> Result<(), StoreError>;

    /// The ban reason if `ip` is currently banned.
    async fn is_banned(&self, ip: &str) -> Result<Option<String>, StoreError>;

    /// Lift a ban. Lifting a missing ban is not an error.
    async fn unban(&self, ip: &str) -> Result<(), StoreError>;
}

/// Store key for a ban entry.
pub fn ban_key(ip: &str) -> String {
    format!("ban:{}", ip)
}
