use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::{CacheStore, KeyTtl, QuotaStore, StoreError};

const SWEEP_INTERVAL: u64 = 4096;

/// In-process stand-in for Redis with the same expiry semantics.
///
/// Uses tokio's clock so tests can pause and advance time. Every command holds
/// the map lock only for its own duration, which gives `incr` the same
/// atomicity Redis provides.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    offline: Arc<AtomicBool>,
    operations: Arc<AtomicU64>,
}

#[derive(Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Clone)]
enum Value {
    Counter(i64),
    Bytes(Vec<u8>),
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of commands issued against the store so far.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Overwrite `key` with raw bytes and no expiry.
    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Bytes(value.to_vec()),
                    expires_at: None,
                },
            );
        }
    }

    /// Live keys currently held.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count the command and fail it if the store is offline. Returns the
    /// command's sequence number.
    fn check_online(&self) -> Result<u64, StoreError> {
        let sequence = self.operations.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(sequence)
    }

    /// Run one command against `key`. Expiry is lazy, as in Redis: an expired
    /// entry is dropped when its key is touched and is otherwise invisible.
    fn with_key<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let sequence = self.check_online()?;

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;

        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        // Keys that are never touched again are reclaimed by a periodic sweep
        if sequence % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            entries.retain(|_, entry| entry.is_live(now));
        }
        f(&mut entries, now)
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.with_key(key, |entries, _| {
            let entry = entries.entry(key.to_string()).or_insert(Entry {
                value: Value::Counter(0),
                expires_at: None,
            });

            match &mut entry.value {
                Value::Counter(count) => {
                    *count += 1;
                    Ok(*count)
                }
                Value::Bytes(_) => Err(StoreError::Unavailable(format!(
                    "value at {key} is not an integer"
                ))),
            }
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.with_key(key, |entries, now| {
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(now + ttl);
            }
            Ok(())
        })
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        self.with_key(key, |entries, now| {
            Ok(match entries.get(key) {
                None => KeyTtl::Missing,
                Some(Entry { expires_at: None, .. }) => KeyTtl::Persistent,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => KeyTtl::Expires(at.saturating_duration_since(now)),
            })
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online().map(|_| ())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_key(key, |entries, _| {
            Ok(entries.get(key).and_then(|entry| match &entry.value {
                Value::Bytes(bytes) => Some(bytes.clone()),
                Value::Counter(count) => Some(count.to_string().into_bytes()),
            }))
        })
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.with_key(key, |entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Bytes(value.to_vec()),
                    expires_at: Some(now + ttl),
                },
            );
            Ok(())
        })
    }
}
