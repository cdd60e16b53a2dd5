//! Short-lived read cache for pulled file content.
//!
//! Keyed by the canonical path string, each entry holds the last pulled
//! content and content hash together with an expiry instant. Entries past
//! their TTL are never served; a write to a path invalidates that path's
//! entry immediately. Expiry is purely time based, so an out-of-band
//! change to the remote file can be served stale until the TTL lapses.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    content: Option<String>,
    sha: Option<String>,
    expires_at: Instant,
}

/// Process-lifetime TTL cache shared by all pulls of one client.
#[derive(Debug, Default)]
pub struct Cache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh content and sha for a key, or `None` when absent or expired.
    /// Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<(Option<String>, Option<String>)> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                Some((entry.content.clone(), entry.sha.clone()))
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store pulled content for a key with the given time-to-live.
    pub fn put(&self, key: &str, content: Option<String>, sha: Option<String>, ttl: Duration) {
        let entry = CacheEntry {
            content,
            sha,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
    }

    /// Drop a key's entry, called after every successful push.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_fresh_entries() {
        let cache = Cache::new();
        cache.put(
            "k",
            Some("content".to_string()),
            Some("sha1".to_string()),
            Duration::from_secs(60),
        );
        let (content, sha) = cache.get("k").unwrap();
        assert_eq!(content.as_deref(), Some("content"));
        assert_eq!(sha.as_deref(), Some("sha1"));
    }

    #[test]
    fn never_serves_expired_entries() {
        let cache = Cache::new();
        cache.put("k", Some("content".to_string()), None, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn invalidate_drops_entry_immediately() {
        let cache = Cache::new();
        cache.put("k", None, Some("sha1".to_string()), Duration::from_secs(60));
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn keys_are_independent() {
        let cache = Cache::new();
        cache.put("a", Some("1".to_string()), None, Duration::from_secs(60));
        cache.put("b", Some("2".to_string()), None, Duration::from_secs(60));
        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
    }
}
