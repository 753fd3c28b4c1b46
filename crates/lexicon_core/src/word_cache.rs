//! crates/lexicon_core/src/word_cache.rs
//!
//! Cache-aside memoization of dictionary lookups.
//!
//! Concurrent misses for the same word share a single in-flight fetch, so the
//! dictionary is contacted once and every waiter sees the same outcome. Gates are
//! keyed per word; unrelated words never contend.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{normalize_word, CachedWordEntry, Sense, SenseRef};
use crate::error::{CoreError, CoreResult};
use crate::ports::DictionaryService;

type Lookup = Shared<BoxFuture<'static, CoreResult<CachedWordEntry>>>;

/// Staleness and size policy for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries older than this are re-fetched on the next access. `None` never expires.
    pub ttl: Option<Duration>,
    /// Upper bound on cached words. The least recently fetched word is evicted first.
    pub capacity: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::from_secs(7 * 24 * 60 * 60)),
            capacity: Some(10_000),
        }
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub evictions: u64,
}

struct Inner {
    dictionary: Arc<dyn DictionaryService>,
    entries: DashMap<String, CachedWordEntry>,
    in_flight: DashMap<String, Lookup>,
    ttl: Option<chrono::Duration>,
    capacity: Option<usize>,
    stats: CacheStats,
}

/// Memoizes [`DictionaryService`] lookups under the normalized word.
#[derive(Clone)]
pub struct WordCache {
    inner: Arc<Inner>,
}

impl WordCache {
    pub fn new(dictionary: Arc<dyn DictionaryService>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                dictionary,
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                ttl: config.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()),
                capacity: config.capacity,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Returns the definitions of `word`, fetching them on a miss.
    ///
    /// If the dictionary fails, a previously cached (possibly stale) copy is
    /// returned instead; without one the lookup fails with `LookupFailed`.
    pub async fn get(&self, word: &str) -> CoreResult<CachedWordEntry> {
        let key = normalize_word(word);
        if key.is_empty() {
            return Err(CoreError::LookupFailed {
                word: word.to_string(),
                reason: "empty word".to_string(),
            });
        }

        if let Some(entry) = self.inner.fresh(&key) {
            self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }
        self.join_or_fetch(key).await
    }

    /// Waits on the fetch already in flight for `key`, or starts one.
    async fn join_or_fetch(&self, key: String) -> CoreResult<CachedWordEntry> {
        let stats = &self.inner.stats;
        let lookup = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => {
                stats.misses.fetch_add(1, Ordering::Relaxed);
                pending.get().clone()
            }
            Entry::Vacant(slot) => {
                // Another caller may have finished a fetch since the fast path.
                if let Some(entry) = self.inner.fresh(&key) {
                    stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry);
                }
                stats.misses.fetch_add(1, Ordering::Relaxed);
                let lookup = Inner::fetch(self.inner.clone(), key).boxed().shared();
                slot.insert(lookup.clone());
                lookup
            }
        };

        lookup.await
    }

    /// Resolves a journal's weak sense reference. `Ok(None)` means the word is known
    /// but the referenced sense no longer exists.
    pub async fn resolve(&self, sense_ref: &SenseRef) -> CoreResult<Option<Sense>> {
        let entry = self.get(&sense_ref.word).await?;
        Ok(entry.sense(sense_ref.index).cloned())
    }

    /// Drops the cached copy of `word` so the next lookup goes to the dictionary.
    pub fn invalidate(&self, word: &str) -> bool {
        let removed = self.inner.entries.remove(&normalize_word(word)).is_some();
        if removed {
            self.inner.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let stats = &self.inner.stats;
        CacheStatsSnapshot {
            hits: stats.hits.load(Ordering::Relaxed),
            misses: stats.misses.load(Ordering::Relaxed),
            fetches: stats.fetches.load(Ordering::Relaxed),
            evictions: stats.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn fresh(&self, key: &str) -> Option<CachedWordEntry> {
        let entry = self.entries.get(key)?;
        if self.is_expired(entry.fetched_at, Utc::now()) {
            return None;
        }
        Some(entry.value().clone())
    }

    fn is_expired(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - fetched_at >= ttl,
            None => false,
        }
    }

    async fn fetch(inner: Arc<Inner>, key: String) -> CoreResult<CachedWordEntry> {
        inner.stats.fetches.fetch_add(1, Ordering::Relaxed);
        debug!("Fetching definitions for '{}'", key);

        let outcome = match inner.dictionary.fetch_definitions(&key).await {
            Ok(senses) if !senses.is_empty() => {
                let entry = CachedWordEntry {
                    word: key.clone(),
                    senses,
                    fetched_at: Utc::now(),
                };
                inner.store(entry.clone());
                Ok(entry)
            }
            Ok(_) => inner.fallback(&key, "dictionary returned no definitions".to_string()),
            Err(e) => inner.fallback(&key, e.to_string()),
        };

        inner.in_flight.remove(&key);
        outcome
    }

    fn fallback(&self, key: &str, reason: String) -> CoreResult<CachedWordEntry> {
        match self.entries.get(key) {
            Some(stale) => {
                warn!("Lookup of '{}' failed ({}); serving cached copy", key, reason);
                Ok(stale.value().clone())
            }
            None => {
                warn!("Lookup of '{}' failed: {}", key, reason);
                Err(CoreError::LookupFailed {
                    word: key.to_string(),
                    reason,
                })
            }
        }
    }

    fn store(&self, entry: CachedWordEntry) {
        if let Some(capacity) = self.capacity {
            if !self.entries.contains_key(&entry.word) {
                while self.entries.len() >= capacity.max(1) {
                    let oldest = self
                        .entries
                        .iter()
                        .min_by_key(|e| e.fetched_at)
                        .map(|e| e.key().clone());
                    match oldest {
                        Some(word) => {
                            self.entries.remove(&word);
                            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                            info!("Evicted '{}' from the word cache", word);
                        }
                        None => break,
                    }
                }
            }
        }
        self.entries.insert(entry.word.clone(), entry);
    }
}
