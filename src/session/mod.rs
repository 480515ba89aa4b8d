use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const CAPACITY: usize = 512;
const TTL: Duration = Duration::from_secs(30 * 60);

struct Entry {
    url: String,
    inserted_at: Instant,
}

/// Correlates a shown set of quality options with the URL they came from,
/// keyed by (channel, content id).
///
/// Bounded two ways: least-recently-used eviction at `CAPACITY` entries, and
/// a per-entry TTL checked on read. Reads are non-consuming, so a user can
/// pick several qualities from one set of options.
pub struct SessionStore {
    inner: Mutex<LruCache<(u64, String), Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_limits(CAPACITY, TTL)
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn put(&self, channel_id: u64, content_id: &str, url: String) {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(
            (channel_id, content_id.to_string()),
            Entry {
                url,
                inserted_at: Instant::now(),
            },
        );
    }

    /// The stored URL, if the entry exists and has not expired. Absence means
    /// the selection is stale and the user has to resend the link.
    pub fn get(&self, channel_id: u64, content_id: &str) -> Option<String> {
        let key = (channel_id, content_id.to_string());
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.url.clone()),
            Some(_) => {
                cache.pop(&key);
                None
            }
            None => None,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let store = SessionStore::new();
        store.put(1, "42", "https://twitter.com/u/status/42".to_string());
        assert_eq!(
            store.get(1, "42").as_deref(),
            Some("https://twitter.com/u/status/42")
        );
        // non-consuming
        assert!(store.get(1, "42").is_some());
    }

    #[test]
    fn test_absent_entry() {
        let store = SessionStore::new();
        assert_eq!(store.get(1, "42"), None);
        store.put(1, "42", "u".to_string());
        assert_eq!(store.get(2, "42"), None);
        assert_eq!(store.get(1, "43"), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let store = SessionStore::with_limits(8, Duration::ZERO);
        store.put(1, "42", "u".to_string());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(store.get(1, "42"), None);
    }

    #[test]
    fn test_capacity_eviction() {
        let store = SessionStore::with_limits(2, Duration::from_secs(60));
        store.put(1, "a", "ua".to_string());
        store.put(1, "b", "ub".to_string());
        store.put(1, "c", "uc".to_string());
        assert_eq!(store.get(1, "a"), None);
        assert!(store.get(1, "b").is_some());
        assert!(store.get(1, "c").is_some());
    }
}
