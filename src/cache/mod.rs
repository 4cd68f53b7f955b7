//! In-memory TTL cache for API responses.
//!
//! The cache is never the source of truth: losing it costs a recomputation,
//! never correctness. Entries are read non-destructively until they expire;
//! a periodic sweep deletes expired entries so memory stays bounded even
//! without read traffic.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// How long cached responses stay fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// How often the background sweep evicts expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cache key for the mood list response.
pub const KEY_MOODS_LIST: &str = "moods:list";

const PLAYLIST_KEY_PREFIX: &str = "playlist:";

/// Cache key for a mood's playlist. The instrumental filter gets its own
/// slot so the two variants never shadow each other.
pub fn playlist_key(mood: &str, instrumental_only: bool) -> String {
    if instrumental_only {
        format!("{}{}:instrumental", PLAYLIST_KEY_PREFIX, mood)
    } else {
        format!("{}{}", PLAYLIST_KEY_PREFIX, mood)
    }
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Counter snapshot for the metrics endpoint.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses_absent: u64,
    pub misses_expired: u64,
    pub keys: usize,
}

/// Key/value store with per-entry absolute expiry.
pub struct ResponseCache {
    ttl: Duration,
    items: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses_absent: AtomicU64,
    misses_expired: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        ResponseCache {
            ttl,
            items: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses_absent: AtomicU64::new(0),
            misses_expired: AtomicU64::new(0),
        }
    }

    /// Fetch a value. Absence and expiry both miss, counted separately.
    pub fn get(&self, key: &str) -> Option<Value> {
        let items = self.items.read().unwrap();
        match items.get(key) {
            None => {
                self.misses_absent.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) if Instant::now() >= entry.expires_at => {
                self.misses_expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
        }
    }

    /// Store a value under the default TTL, replacing any previous entry.
    pub fn set(&self, key: &str, value: Value) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.items.write().unwrap().insert(key.to_string(), entry);
    }

    /// Drop the mood list and every cached playlist, leaving unrelated keys
    /// untouched.
    pub fn invalidate_moods(&self) {
        let mut items = self.items.write().unwrap();
        items.remove(KEY_MOODS_LIST);
        items.retain(|key, _| !key.starts_with(PLAYLIST_KEY_PREFIX));
    }

    /// Delete expired entries, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut items = self.items.write().unwrap();
        let before = items.len();
        items.retain(|_, entry| now < entry.expires_at);
        before - items.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses_absent: self.misses_absent.load(Ordering::Relaxed),
            misses_expired: self.misses_expired.load(Ordering::Relaxed),
            keys: self.items.read().unwrap().len(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        ResponseCache::new(DEFAULT_TTL)
    }
}
