//! Redis list used as the fleet-wide matchmaking queue.
//!
//! New ids are pushed at the head and the oldest is popped from the tail,
//! so a restored id goes back on the tail.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use crate::domain::foundation::ClientId;
use crate::ports::{MatchQueue, StoreError, MATCH_QUEUE_KEY};

pub struct RedisMatchQueue {
    conn: MultiplexedConnection,
    /// Dedicated connection for BRPOP so a blocked pop never stalls
    /// other commands.
    blocking: Mutex<MultiplexedConnection>,
}

impl RedisMatchQueue {
    pub fn new(conn: MultiplexedConnection, blocking: MultiplexedConnection) -> Self {
        Self {
            conn,
            blocking: Mutex::new(blocking),
        }
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Redis(e.to_string())
}

fn parse_id(raw: &str) -> Result<ClientId, StoreError> {
    raw.parse()
        .map_err(|e: uuid::Error| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl MatchQueue for RedisMatchQueue {
    async fn push(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(MATCH_QUEUE_KEY)
            .arg(id.to_string())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn push_front(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("RPUSH")
            .arg(MATCH_QUEUE_KEY)
            .arg(id.to_string())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<ClientId>, StoreError> {
        let secs = timeout.as_secs().max(1);
        let mut conn = self.blocking.lock().await;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(MATCH_QUEUE_KEY)
            .arg(secs)
            .query_async(&mut *conn)
            .await
            .map_err(unavailable)?;

        popped.map(|(_, raw)| parse_id(&raw)).transpose()
    }

    async fn remove(&self, id: &ClientId) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("LREM")
            .arg(MATCH_QUEUE_KEY)
            .arg(1)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("LLEN")
            .arg(MATCH_QUEUE_KEY)
            .query_async::<_, usize>(&mut conn)
            .await
            .map_err(unavailable)
    }
}
