//! In-memory IP ban list with expiry.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::ports::{IpBanList, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryIpBanList {
    bans: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryIpBanList {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IpBanList for InMemoryIpBanList {
    async fn ban(&self, ip: &str, duration: Duration, reason: &str) -> Result<(), StoreError> {
        let mut bans = self.bans.write().await;
        bans.insert(ip.to_string(), (reason.to_string(), Instant::now() + duration));
        Ok(())
    }

    async fn is_banned(&self, ip: &str) -> Result<Option<String>, StoreError> {
        let bans = self.bans.read().await;
        Ok(bans
            .get(ip)
            .filter(|(_, until)| Instant::now() < *until)
            .map(|(reason, _)| reason.clone()))
    }

    async fn unban(&self, ip: &str) -> Result<(), StoreError> {
        self.bans.write().await.remove(ip);
        Ok(())
    }
}
