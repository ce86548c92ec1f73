//! In-memory rate limiter implementation for testing and single-process use.
//!
//! Uses a fixed-window counter algorithm with an in-memory HashMap.
//! Not suitable for multi-server deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitPolicy, RateLimitResult,
    RateLimitStatus, RateLimiter,
};

/// In-memory fixed-window rate limiter.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    /// Per-key window state.
    windows: RwLock<HashMap<String, WindowState>>,
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    /// Number of requests in the current window.
    count: u32,
    /// When the current window started.
    window_start: u64,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_secs() -> u64 {
        Timestamp::now().as_unix_secs()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitResult, RateLimitError> {
        let window_secs = u64::from(policy.window_secs.max(1));
        let now = Self::now_secs();

        let mut windows = self.windows.write().await;
        let state = windows
            .entry(key.to_redis_key())
            .or_insert_with(|| WindowState {
                count: 0,
                window_start: now,
            });

        if now >= state.window_start + window_secs {
            state.count = 0;
            state.window_start = now;
        }

        let window_end = state.window_start + window_secs;
        if state.count >= policy.limit {
            let retry_after = window_end.saturating_sub(now) as u32;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit: policy.limit,
                retry_after_secs: retry_after.max(1),
                scope: key.scope,
            }));
        }

        state.count += 1;
        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(state.count),
            reset_at: Timestamp::from_unix_secs(window_end),
        }))
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&key.to_redis_key());
        Ok(())
    }
}
