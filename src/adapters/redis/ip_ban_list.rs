//! Redis-backed IP ban list. Each ban is a `ban:<ip>` key holding the
//! reason, expiring with the ban.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::ports::{ban_key, IpBanList, StoreError};

#[derive(Clone)]
pub struct RedisIpBanList {
    conn: MultiplexedConnection,
}

impl RedisIpBanList {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl IpBanList for RedisIpBanList {
    async fn ban(&self, ip: &str, duration: Duration, reason: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(ban_key(ip))
            .arg(reason)
            .arg("EX")
            .arg(duration.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))
    }

    async fn is_banned(&self, ip: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(ban_key(ip))
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))
    }

    async fn unban(&self, ip: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(ban_key(ip))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))
    }
}
