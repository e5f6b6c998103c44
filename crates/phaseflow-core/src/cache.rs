//! In-memory TTL cache of successful transition results.
//!
//! Owned by one engine instance. All operations are synchronous; callers
//! wrap the cache in a mutex and never hold it across an await.

use crate::types::{Phase, ProjectType};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub from: Phase,
    pub to: Phase,
    pub project_type: ProjectType,
}

impl CacheKey {
    pub fn new(from: Phase, to: Phase, project_type: ProjectType) -> Self {
        Self {
            from,
            to,
            project_type,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_to_{}:{}", self.from, self.to, self.project_type)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub result: V,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug)]
pub struct TransformationCache<V> {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<CacheKey, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V: Clone> TransformationCache<V> {
    pub fn new(ttl: std::time::Duration, max_entries: usize) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
            max_entries,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    /// Clone of the live entry for `key` as of `now`. An expired entry is
    /// removed and reported as a miss.
    pub fn get_at(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits += 1;
                Some(entry.result.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.evictions += 1;
                self.misses += 1;
                tracing::debug!(key = %key, "cache entry expired");
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn set(&mut self, key: CacheKey, result: V) {
        self.set_at(key, result, Utc::now());
    }

    pub fn set_at(&mut self, key: CacheKey, result: V, now: DateTime<Utc>) {
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(
            key,
            CacheEntry {
                key,
                result,
                created_at: now,
                expires_at,
            },
        );
        if self.entries.len() > self.max_entries {
            let swept = self.sweep_expired_at(now);
            tracing::debug!(swept, entries = self.entries.len(), "cache over capacity; swept expired");
        }
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn sweep_expired(&mut self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Remove every entry expired as of `now`; returns how many were removed.
    pub fn sweep_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - self.entries.len();
        self.evictions += removed as u64;
        removed
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: std::time::Duration = std::time::Duration::from_secs(30 * 60);

    fn key() -> CacheKey {
        CacheKey::new(Phase::Concept, Phase::Requirements, ProjectType::WebApplication)
    }

    #[test]
    fn ttl_boundary() {
        let mut cache = TransformationCache::new(TTL, 10);
        let t0 = Utc::now();
        cache.set_at(key(), "result", t0);
        let ttl = Duration::from_std(TTL).unwrap();

        assert_eq!(cache.get_at(&key(), t0 + ttl - Duration::milliseconds(1)), Some("result"));
        assert_eq!(cache.get_at(&key(), t0 + ttl), Some("result"));
        assert_eq!(cache.get_at(&key(), t0 + ttl + Duration::milliseconds(1)), None);
        // evicted on the expired lookup
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn key_includes_project_type() {
        let mut cache = TransformationCache::new(TTL, 10);
        cache.set(key(), 1);
        let api = CacheKey::new(Phase::Concept, Phase::Requirements, ProjectType::ApiService);
        assert_eq!(cache.get(&api), None);
        assert_eq!(cache.get(&key()), Some(1));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn overflow_sweeps_only_expired_entries() {
        let mut cache = TransformationCache::new(std::time::Duration::from_secs(60), 2);
        let t0 = Utc::now();
        cache.set_at(key(), 1, t0);
        cache.set_at(
            CacheKey::new(Phase::Design, Phase::Architecture, ProjectType::WebApplication),
            2,
            t0 + Duration::seconds(50),
        );
        // Third insert, 61s later: the first entry is expired and swept.
        let t2 = t0 + Duration::seconds(61);
        cache.set_at(
            CacheKey::new(Phase::Requirements, Phase::Design, ProjectType::WebApplication),
            3,
            t2,
        );
        assert_eq!(cache.len(), 2);
        assert!(cache.entry(&key()).is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn overflow_without_expired_entries_keeps_everything() {
        let mut cache = TransformationCache::new(TTL, 1);
        cache.set(key(), 1);
        cache.set(
            CacheKey::new(Phase::Design, Phase::Architecture, ProjectType::WebApplication),
            2,
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_and_clear() {
        let mut cache = TransformationCache::new(TTL, 10);
        cache.set(key(), 1);
        assert!(cache.invalidate(&key()));
        assert!(!cache.invalidate(&key()));
        cache.set(key(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn entry_records_expiry() {
        let mut cache = TransformationCache::new(TTL, 10);
        let t0 = Utc::now();
        cache.set_at(key(), 1, t0);
        let entry = cache.entry(&key()).unwrap();
        assert_eq!(entry.created_at, t0);
        assert_eq!(entry.expires_at, t0 + Duration::minutes(30));
        assert_eq!(entry.key.to_string(), "concept_to_requirements:web_application");
    }
}
