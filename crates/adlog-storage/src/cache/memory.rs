//! In-memory TTL cache with sorted indexes
//!
//! Values expire lazily on read or through [`MemoryCache::purge_expired`].
//! Indexes behave like sorted sets: a member has a single score, re-adding
//! it moves it, and ranges are served highest score first.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use adlog_core::{Cache, CacheError};

/// Configuration for [`MemoryCache`]
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheConfig {
    /// Maximum live entries; the soonest-expiring entry is evicted first
    pub max_entries: Option<usize>,
    /// Maximum members per index; lowest scores are dropped first
    pub max_index_len: Option<usize>,
}

#[derive(Debug)]
struct CacheSlot {
    value: Bytes,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct SortedIndex {
    /// (score, member), ascending
    by_score: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

impl SortedIndex {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.by_score.remove(&(old, member.to_string()));
        }
        self.by_score.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => self.by_score.remove(&(score, member.to_string())),
            None => false,
        }
    }

    /// Drop lowest-scored members until at most `max` remain
    fn trim(&mut self, max: usize) -> usize {
        let mut dropped = 0;
        while self.by_score.len() > max {
            if let Some((_, member)) = self.by_score.pop_first() {
                self.scores.remove(&member);
                dropped += 1;
            }
        }
        dropped
    }

    fn range_desc(&self, offset: usize, count: usize) -> Vec<String> {
        self.by_score
            .iter()
            .rev()
            .skip(offset)
            .take(count)
            .map(|(_, member)| member.clone())
            .collect()
    }
}

/// In-memory implementation of [`Cache`]
#[derive(Debug)]
pub struct MemoryCache {
    config: MemoryCacheConfig,
    entries: DashMap<String, CacheSlot>,
    indexes: DashMap<String, SortedIndex>,
    available: AtomicBool,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_config(MemoryCacheConfig::default())
    }

    pub fn with_config(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            indexes: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the cache going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop everything, as after a cache restart
    pub fn clear(&self) {
        self.entries.clear();
        self.indexes.clear();
    }

    /// Remove expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Entries currently held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Members in an index
    pub fn index_len(&self, index: &str) -> usize {
        self.indexes
            .get(index)
            .map(|idx| idx.by_score.len())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::unavailable("memory cache offline"))
        }
    }

    /// Make room for one new entry under `max_entries`
    fn make_room(&self, max_entries: usize) {
        if self.entries.len() < max_entries {
            return;
        }
        self.purge_expired();

        while self.entries.len() >= max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().expires_at)
                .map(|entry| entry.key().clone());
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                    trace!(key = %key, "Evicted cache entry");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.check_available()?;

        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(slot) if slot.expires_at > now => return Ok(Some(slot.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.check_available()?;

        if let Some(max) = self.config.max_entries
            && !self.entries.contains_key(key)
        {
            self.make_room(max);
        }

        self.entries.insert(
            key.to_string(),
            CacheSlot {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str) -> Result<bool, CacheError> {
        self.check_available()?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn index_add(&self, index: &str, member: &str, score: i64) -> Result<(), CacheError> {
        self.check_available()?;

        let mut idx = self.indexes.entry(index.to_string()).or_default();
        idx.insert(member, score);
        if let Some(max) = self.config.max_index_len {
            let dropped = idx.trim(max);
            if dropped > 0 {
                trace!(index, dropped, "Trimmed index");
            }
        }
        Ok(())
    }

    async fn index_range(
        &self,
        index: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, CacheError> {
        self.check_available()?;

        Ok(self
            .indexes
            .get(index)
            .map(|idx| idx.range_desc(offset, count))
            .unwrap_or_default())
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<bool, CacheError> {
        self.check_available()?;

        Ok(self
            .indexes
            .get_mut(index)
            .map(|mut idx| idx.remove(member))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_get_expire() {
        let cache = MemoryCache::new();

        cache.set("k", Bytes::from_static(b"v"), TTL).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));

        assert!(cache.expire("k").await.unwrap());
        assert!(!cache.expire("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("short", Bytes::new(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", Bytes::new(), Duration::from_secs(100)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_soonest_expiring() {
        let cache = MemoryCache::with_config(MemoryCacheConfig {
            max_entries: Some(2),
            max_index_len: None,
        });
        cache.set("a", Bytes::new(), Duration::from_secs(10)).await.unwrap();
        cache.set("b", Bytes::new(), Duration::from_secs(100)).await.unwrap();
        cache.set("c", Bytes::new(), Duration::from_secs(50)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_some());
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_index_orders_by_descending_score() {
        let cache = MemoryCache::new();
        cache.index_add("recent", "a", 10).await.unwrap();
        cache.index_add("recent", "b", 30).await.unwrap();
        cache.index_add("recent", "c", 20).await.unwrap();

        assert_eq!(cache.index_range("recent", 0, 10).await.unwrap(), vec!["b", "c", "a"]);
        assert_eq!(cache.index_range("recent", 1, 1).await.unwrap(), vec!["c"]);
        assert!(cache.index_range("recent", 5, 1).await.unwrap().is_empty());
        assert!(cache.index_range("other", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_rescore_and_remove() {
        let cache = MemoryCache::new();
        cache.index_add("recent", "a", 10).await.unwrap();
        cache.index_add("recent", "b", 20).await.unwrap();
        cache.index_add("recent", "a", 30).await.unwrap();

        assert_eq!(cache.index_len("recent"), 2);
        assert_eq!(cache.index_range("recent", 0, 10).await.unwrap(), vec!["a", "b"]);

        assert!(cache.index_remove("recent", "a").await.unwrap());
        assert!(!cache.index_remove("recent", "a").await.unwrap());
        assert_eq!(cache.index_range("recent", 0, 10).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_index_trim() {
        let cache = MemoryCache::with_config(MemoryCacheConfig {
            max_entries: None,
            max_index_len: Some(3),
        });
        for (i, member) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            cache.index_add("recent", member, i as i64).await.unwrap();
        }

        assert_eq!(cache.index_range("recent", 0, 10).await.unwrap(), vec!["e", "d", "c"]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let cache = MemoryCache::new();
        cache.set("k", Bytes::new(), TTL).await.unwrap();
        cache.set_available(false);

        assert!(matches!(cache.get("k").await, Err(CacheError::Unavailable(_))));
        assert!(matches!(
            cache.index_range("recent", 0, 1).await,
            Err(CacheError::Unavailable(_))
        ));

        cache.set_available(true);
        assert!(cache.get("k").await.unwrap().is_some());
    }
}
