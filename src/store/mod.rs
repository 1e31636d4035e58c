//! Shared key-value store consumed by the rate limiter and the aggregation cache.
//!
//! The store is the only shared mutable state in the gate. Two narrow traits
//! describe what each consumer needs:
//!
//! - [`QuotaStore`]: atomic `INCR`, `EXPIRE` and `TTL` for fixed-window counters
//! - [`CacheStore`]: `GET` and `SET` with expiry for serialized aggregation results
//!
//! Handles are injected as `Arc<dyn ...>` so the Redis backend can be swapped for
//! [`MemoryStore`] in tests and local development.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Remaining lifetime of a key as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Expires(Duration),
    /// Key exists but carries no expiry.
    Persistent,
    Missing,
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Increment the counter at `key` and return the new value. Must be a single
    /// atomic store operation; a missing key counts from zero.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;
}

/// Run a store round-trip under a deadline.
pub async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}
