//! Cache-aside layer for expensive per-identity aggregations.
//!
//! Lookups go to the store first; a miss runs the computation against the
//! origin data and writes the serialized result back with a fixed TTL.
//!
//! Two trade-offs are accepted here:
//!
//! - Concurrent misses on the same key may each compute and each write. The
//!   last write wins, and every caller still gets the result of its own
//!   computation.
//! - Nothing evicts an entry when the origin data changes. Readers can observe
//!   up to one TTL of staleness after a write.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::Identity;
use crate::error::Result;
use crate::keys::CacheKey;
use crate::store::{bounded, CacheStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub status: CacheStatus,
}

#[derive(Clone)]
pub struct AggregationCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    timeout: Duration,
}

impl AggregationCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, timeout: Duration) -> Self {
        Self { store, ttl, timeout }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get_or_compute<T, F, Fut>(&self, identity: &Identity, period: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.fetch(identity, period, compute).await.map(|fetched| fetched.value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) but also reports whether the
    /// value came from the store.
    pub async fn fetch<T, F, Fut>(&self, identity: &Identity, period: &str, compute: F) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = CacheKey::new(identity, period).to_string();

        if let Some(value) = self.lookup(&key).await {
            debug!(period, "aggregation cache hit");
            return Ok(Fetched {
                value,
                status: CacheStatus::Hit,
            });
        }

        debug!(period, "aggregation cache miss, computing");
        let value = compute().await?;
        self.populate(&key, &value).await;

        Ok(Fetched {
            value,
            status: CacheStatus::Miss,
        })
    }

    /// Any failure to produce a well-formed value counts as a miss.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match bounded(self.timeout, self.store.get(key)).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "malformed cache entry, treating as miss");
                None
            }
        }
    }

    /// Write failures never fail the request.
    async fn populate<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "could not serialize aggregation for caching");
                return;
            }
        };

        if let Err(e) = bounded(self.timeout, self.store.set(key, &bytes, self.ttl)).await {
            warn!(error = %e, "cache write failed, returning uncached result");
        }
    }
}
