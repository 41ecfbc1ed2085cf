//! In-memory key-value cache with per-entry expiry
//!
//! Expiry is checked on access, and every `SWEEP_INTERVAL` writes the whole
//! map is swept so entries nobody reads again do not pile up. Time comes from
//! `tokio::time`, so a paused test clock drives expiry deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::core::traits::IdempotencyCache;
use crate::types::LedgerError;

/// Writes between two sweeps of expired entries
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Process-local implementation of [`IdempotencyCache`]
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    writes: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    // Must not be called while holding a map guard
    fn record_write(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }
    }
}

#[async_trait]
impl IdempotencyCache for InMemoryCache {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LedgerError> {
        let claimed = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    false
                } else {
                    occupied.insert(CacheEntry::new(value, ttl));
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                true
            }
        };

        if claimed {
            self.record_write();
        }
        Ok(claimed)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), LedgerError> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        self.record_write();
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let live = self
            .entries
            .get(key)
            .map(|entry| entry.is_live().then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), LedgerError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_if_absent_only_once() {
        let cache = InMemoryCache::new();

        assert!(cache.set_if_absent("k", "a", TTL).await.unwrap());
        assert!(!cache.set_if_absent("k", "b", TTL).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = InMemoryCache::new();
        cache.set_if_absent("k", "a", TTL).await.unwrap();

        cache.set("k", "b", TTL).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();
        cache.set("k", "a", TTL).await.unwrap();

        cache.delete("k").await.unwrap();
        cache.delete("absent").await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = InMemoryCache::new();
        cache
            .set("short", "a", Duration::from_secs(1))
            .await
            .unwrap();
        cache.set("long", "b", TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_can_be_claimed() {
        let cache = InMemoryCache::new();
        cache
            .set_if_absent("k", "a", Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(cache.set_if_absent("k", "b", TTL).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_drops_unread_entries() {
        let cache = InMemoryCache::new();
        for i in 0..10 {
            cache
                .set(&format!("old-{}", i), "a", Duration::from_secs(1))
                .await
                .unwrap();
        }
        cache.set("fresh", "b", TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 10);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_entries() {
        let cache = InMemoryCache::new();
        cache
            .set("never-read", "a", Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        for i in 0..SWEEP_INTERVAL {
            cache
                .set_if_absent(&format!("k{}", i), "b", TTL)
                .await
                .unwrap();
        }

        assert_eq!(cache.len() as u64, SWEEP_INTERVAL);
        assert_eq!(cache.get("never-read").await.unwrap(), None);
    }
}
