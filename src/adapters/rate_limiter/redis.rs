//! Redis-backed rate limiter implementation for multi-server deployments.
//!
//! Uses a fixed-window counter algorithm with Redis INCR + EXPIRE, run as one
//! Lua script so a counter can never be left without an expiry.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitPolicy, RateLimitResult,
    RateLimitStatus, RateLimiter,
};

// A counter found without a TTL gets one, whatever its count.
const COUNT_HIT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return {count, redis.call('TTL', KEYS[1])}
"#;

/// Redis-backed rate limiter shared by every relay process.
///
/// Uses a fixed-window counter algorithm:
/// 1. INCR the key to increment the counter
/// 2. If the key has no expiry, set EXPIRE for the window duration
/// 3. If count > limit, deny the request
///
/// Requests can briefly exceed the limit at window boundaries.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    count_hit: Script,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            count_hit: Script::new(COUNT_HIT),
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitResult, RateLimitError> {
        let redis_key = key.to_redis_key();
        let window_secs = policy.window_secs.max(1);
        let mut conn = self.conn.clone();

        let (count, ttl): (i64, i64) = self
            .count_hit
            .key(&redis_key)
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        let reset_secs = if ttl > 0 { ttl as u64 } else { u64::from(window_secs) };
        let reset_at = Timestamp::now().plus_secs(reset_secs);
        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);

        if count > policy.limit {
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit: policy.limit,
                retry_after_secs: (reset_secs as u32).max(1),
                scope: key.scope,
            }));
        }

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(count),
            reset_at,
        }))
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.to_redis_key())
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter").finish_non_exhaustive()
    }
}
