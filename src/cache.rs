use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::model::outcome::RenderOutcome;

/// Bounded LRU of completed render outcomes with a per-entry TTL.
///
/// Keys are caller-opaque fingerprints. Concurrent renders against the same
/// key may both miss and both store; the last writer wins. Single-flight
/// deduplication is deliberately not provided.
pub(crate) struct RenderCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    lru: VecDeque<String>,
}

struct CacheEntry {
    outcome: RenderOutcome,
    created_at: Instant,
}

impl RenderCache {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                lru: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Return a live entry's outcome flagged `from_cache`, refreshing its
    /// recency. Expired entries are dropped on observation.
    pub(crate) fn get(&self, key: &str) -> Option<RenderOutcome> {
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.created_at.elapsed() > self.ttl,
            None => {
                tracing::debug!(key, "render cache miss");
                return None;
            }
        };
        if expired {
            inner.remove(key);
            tracing::debug!(key, "render cache entry expired");
            return None;
        }

        inner.touch(key);
        let entry = inner.entries.get(key)?;
        let mut outcome = entry.outcome.clone();
        outcome.from_cache = true;
        tracing::debug!(key, "render cache hit");
        Some(outcome)
    }

    /// Insert or overwrite an outcome, evicting least-recently-used entries
    /// beyond capacity.
    pub(crate) fn store(&self, key: &str, outcome: RenderOutcome) {
        let mut inner = self.lock();
        inner.entries.insert(
            key.to_owned(),
            CacheEntry {
                outcome,
                created_at: Instant::now(),
            },
        );
        inner.touch(key);

        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.lru.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            tracing::debug!(key = %oldest, "render cache evicted lru entry");
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key.to_owned());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::Container;
    use crate::model::outcome::{EncodedClip, RenderMetrics};

    fn outcome(tag: u8) -> RenderOutcome {
        RenderOutcome {
            from_cache: false,
            metrics: RenderMetrics::default(),
            result: EncodedClip {
                video: vec![tag; 8],
                container: Container::Mp4,
                mime_type: Container::Mp4.mime_type(),
                duration_ms: 100,
                frame_rate: 30,
                poster_frame: None,
            },
        }
    }

    #[test]
    fn hit_is_flagged_and_byte_identical() {
        let cache = RenderCache::new(4, Duration::from_secs(60));
        cache.store("k", outcome(7));
        let hit = cache.get("k").unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.result.video, vec![7u8; 8]);
    }

    #[test]
    fn miss_on_absent_key() {
        let cache = RenderCache::new(4, Duration::from_secs(60));
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = RenderCache::new(2, Duration::from_secs(60));
        cache.store("a", outcome(1));
        cache.store("b", outcome(2));
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.store("c", outcome(3));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = RenderCache::new(4, Duration::from_millis(20));
        cache.store("k", outcome(5));
        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0, "expired entry is dropped on observation");
    }

    #[test]
    fn store_overwrites_existing_key() {
        let cache = RenderCache::new(4, Duration::from_secs(60));
        cache.store("k", outcome(1));
        cache.store("k", outcome(2));
        assert_eq!(cache.get("k").unwrap().result.video, vec![2u8; 8]);
        assert_eq!(cache.len(), 1);
    }
}
