//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port for different backends.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - In-memory for testing and single-process use
//! - `RedisRateLimiter` - Redis-backed for multi-server deployments

mod in_memory;
mod redis;

pub use in_memory::InMemoryRateLimiter;
pub use self::redis::RedisRateLimiter;
