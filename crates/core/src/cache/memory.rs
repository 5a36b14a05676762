//! In-memory cache store backend.
//!
//! Serves single-process and development deployments, and every test in the
//! workspace. Built on `moka` with a per-entry expiry policy so TTL semantics
//! match a distributed keyed store: counters keep the expiry they were
//! created with, `set` and `expire` move the deadline.
//!
//! Atomicity comes from moka's per-key entry API; all mutating operations go
//! through a single atomic compute per key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use super::{CacheError, CacheStore, with_deadline};

const MAX_ENTRIES: u64 = 100_000;

/// One stored slot. Counters and text share the key space, as they would in
/// Redis.
#[derive(Debug, Clone)]
struct Slot {
    value: SlotValue,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
enum SlotValue {
    Text(String),
    Counter(i64),
}

/// Expiry policy that honors each slot's absolute deadline, so updates do not
/// silently extend a key's life.
struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        slot: &Slot,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(slot.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.expires_at.saturating_duration_since(updated_at))
    }
}

/// In-memory [`CacheStore`] implementation.
pub struct MemoryCacheStore {
    cache: Cache<String, Slot>,
    deadline: Duration,
}

impl MemoryCacheStore {
    /// Create a store whose operations observe the given deadline.
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .expire_after(SlotExpiry)
            .build();
        Self { cache, deadline }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let slot = with_deadline(self.deadline, self.cache.get(key)).await?;
        Ok(slot.map(|s| match s.value {
            SlotValue::Text(t) => t,
            SlotValue::Counter(n) => n.to_string(),
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let slot = Slot {
            value: SlotValue::Text(value.to_string()),
            expires_at: Instant::now() + ttl,
        };
        with_deadline(self.deadline, self.cache.insert(key.to_string(), slot)).await?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CacheError> {
        let entry = with_deadline(
            self.deadline,
            self.cache.entry(key.to_string()).and_upsert_with(|existing| {
                let next = match existing {
                    Some(entry) => {
                        let slot = entry.into_value();
                        match slot.value {
                            SlotValue::Counter(n) => Slot {
                                value: SlotValue::Counter(n + 1),
                                expires_at: slot.expires_at,
                            },
                            // A text value under a counter key is a layout
                            // bug; restart the counter rather than corrupt it.
                            SlotValue::Text(_) => Slot {
                                value: SlotValue::Counter(1),
                                expires_at: Instant::now() + ttl,
                            },
                        }
                    }
                    None => Slot {
                        value: SlotValue::Counter(1),
                        expires_at: Instant::now() + ttl,
                    },
                };
                std::future::ready(next)
            }),
        )
        .await?;

        match entry.into_value().value {
            SlotValue::Counter(n) => Ok(n),
            SlotValue::Text(_) => Err(CacheError::Unavailable(
                "counter key holds non-counter value".to_string(),
            )),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let result = with_deadline(
            self.deadline,
            self.cache.entry(key.to_string()).and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => {
                        let slot = entry.into_value();
                        let matches = matches!(&slot.value, SlotValue::Text(t) if t == expected);
                        if matches {
                            Op::Put(Slot {
                                value: SlotValue::Text(new.to_string()),
                                expires_at: Instant::now() + ttl,
                            })
                        } else {
                            Op::Nop
                        }
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            }),
        )
        .await?;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        with_deadline(
            self.deadline,
            self.cache.entry(key.to_string()).and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => {
                        let mut slot = entry.into_value();
                        slot.expires_at = Instant::now() + ttl;
                        Op::Put(slot)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        with_deadline(self.deadline, self.cache.invalidate(key)).await?;
        Ok(())
    }
}
