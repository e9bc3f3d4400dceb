//! Tenant-namespaced cache layer (C5, §4.5).
//!
//! Keys are namespaced through [`CacheKey`] alone — nothing outside this
//! module constructs a raw key string (§9 design note). Failures degrade
//! gracefully: `get` returns a miss, `set` returns `false`, neither ever
//! propagates an error to the caller. Grounded on the teacher's
//! `CacheMetrics`/hit-rate accounting and the rate limiter's `Instant`-keyed
//! expiry bookkeeping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CUSTOMER_PROFILE_TTL: Duration = Duration::from_secs(3600);
pub const CHURN_PREDICTION_TTL: Duration = Duration::from_secs(1800);
pub const QUERY_RESULT_TTL: Duration = Duration::from_secs(600);
pub const ARCHETYPE_TTL: Duration = Duration::from_secs(3600);

/// A tenant-namespaced or global cache key. The only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `tenant:{tenant_id}:{prefix}:{suffix}` when `tenant_id` is present,
    /// else `global:{prefix}:{suffix}` (§4.5).
    pub fn new(tenant_id: Option<Uuid>, prefix: &str, suffix: &str) -> Self {
        let key = match tenant_id {
            Some(id) => format!("tenant:{id}:{prefix}:{suffix}"),
            None => format!("global:{prefix}:{suffix}"),
        };
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A glob-style prefix matching every key under a tenant, for
    /// `delete_pattern` calls like `invalidate_all_customers`.
    pub fn tenant_prefix(tenant_id: Uuid) -> String {
        format!("tenant:{tenant_id}:")
    }
}

/// Hit/miss counters for the cache layer (§4.5 observability).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// An in-process, best-effort KV cache with TTL and pattern deletion.
///
/// A production deployment points this at Redis via `REDIS_URL` (§6); this
/// type is the in-memory stand-in used by tests and by single-node
/// deployments, and is the shape every backend must expose.
pub struct Cache {
    entries: Mutex<HashMap<String, Entry>>,
    metrics: Mutex<CacheMetrics>,
    connected: Mutex<bool>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            metrics: Mutex::new(CacheMetrics::default()),
            connected: Mutex::new(false),
        }
    }

    pub fn connect(&self) {
        *self.connected.lock().expect("cache mutex poisoned") = true;
    }

    pub fn disconnect(&self) {
        *self.connected.lock().expect("cache mutex poisoned") = false;
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock().expect("cache mutex poisoned")
    }

    /// Get a raw value. A miss (including a backend error, which this
    /// in-memory implementation cannot produce) is indistinguishable to the
    /// caller from an absent key, per §4.5.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let mut metrics = self.metrics.lock().expect("cache mutex poisoned");
        let now = Instant::now();
        match entries.get(key.as_str()) {
            Some(entry) if entry.expires_at > now => {
                metrics.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key.as_str());
                metrics.misses += 1;
                None
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    pub fn get_json<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> Option<T> {
        self.get(key).and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// Set a raw value with a TTL. Returns `false` (never an error) if the
    /// write could not be performed.
    pub fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let mut metrics = self.metrics.lock().expect("cache mutex poisoned");
        entries.insert(
            key.as_str().to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        metrics.sets += 1;
        true
    }

    pub fn set_json<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) -> bool {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, bytes, ttl),
            Err(_) => {
                self.metrics.lock().expect("cache mutex poisoned").errors += 1;
                false
            }
        }
    }

    pub fn delete(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .remove(key.as_str())
            .is_some()
    }

    /// Delete every key whose string form starts with `prefix`, e.g. the
    /// tenant prefix from [`CacheKey::tenant_prefix`] for
    /// `invalidate_all_customers`.
    pub fn delete_pattern(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let to_remove: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for k in &to_remove {
            entries.remove(k);
        }
        to_remove.len()
    }

    pub fn exists(&self, key: &CacheKey) -> bool {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        entries
            .get(key.as_str())
            .is_some_and(|e| e.expires_at > Instant::now())
    }

    pub fn clear_all(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().expect("cache mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespacing_tenant_vs_global() {
        let tenant_id = Uuid::new_v4();
        let tenant_key = CacheKey::new(Some(tenant_id), "customer", "cust-1");
        assert!(tenant_key.as_str().starts_with(&format!("tenant:{tenant_id}:")));

        let global_key = CacheKey::new(None, "config", "flags");
        assert!(global_key.as_str().starts_with("global:"));
    }

    #[test]
    fn test_get_set_round_trip() {
        let cache = Cache::new();
        let key = CacheKey::new(None, "x", "y");
        assert!(cache.get(&key).is_none());
        cache.set(&key, b"hello".to_vec(), Duration::from_secs(60));
        assert_eq!(cache.get(&key), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = Cache::new();
        let key = CacheKey::new(None, "x", "y");
        cache.set(&key, b"hello".to_vec(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_delete_pattern_scoped_to_tenant() {
        let cache = Cache::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let key_a = CacheKey::new(Some(tenant_a), "customer", "1");
        let key_b = CacheKey::new(Some(tenant_b), "customer", "1");
        cache.set(&key_a, b"a".to_vec(), Duration::from_secs(60));
        cache.set(&key_b, b"b".to_vec(), Duration::from_secs(60));

        let removed = cache.delete_pattern(&CacheKey::tenant_prefix(tenant_a));
        assert_eq!(removed, 1);
        assert!(cache.get(&key_a).is_none());
        assert!(cache.get(&key_b).is_some());
    }

    #[test]
    fn test_hit_miss_counters() {
        let cache = Cache::new();
        let key = CacheKey::new(None, "x", "y");
        cache.get(&key);
        cache.set(&key, b"v".to_vec(), Duration::from_secs(60));
        cache.get(&key);
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.sets, 1);
    }
}
