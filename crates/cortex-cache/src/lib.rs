//! Cortex Cache — sharded TTL map with LRU eviction, prefix
//! invalidation, and hit/miss statistics.
//!
//! Keys are opaque strings whose first `:`-separated segment is the
//! tenant id; [`Cache::scoped`] builds keys that way so one tenant's
//! lookups can never observe another's entries. Writers take
//! fine-grained per-shard locks; prefix invalidation and eviction take
//! every shard lock so readers see either the old set or the new one.

mod sweeper;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

pub use sweeper::spawn_sweeper;

const SHARD_COUNT: usize = 16;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub max_bytes: u64,
    /// Cadence of the background expired-entry sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_bytes: 64 * 1024 * 1024,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
    size: u64,
    last_used: Instant,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub entries: u64,
    pub bytes: u64,
    pub max_entries: u64,
    pub max_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub hit_rate: f64,
}

pub struct Cache {
    shards: Vec<Mutex<HashMap<String, Entry>>>,
    config: CacheConfig,
    /// Per-key locks serialising concurrent compute-on-miss, so a cold
    /// key is computed once while the rest of the stampede waits and
    /// then hits.
    flights: Mutex<HashMap<String, std::sync::Arc<tokio::sync::Mutex<()>>>>,
    entries: AtomicU64,
    bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            config,
            flights: Mutex::new(HashMap::new()),
            entries: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashMap<String, Entry>> {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in key.as_bytes() {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x100_0000_01b3);
        }
        &self.shards[(hash as usize) % SHARD_COUNT]
    }

    /// Look up a key. Expired entries are removed lazily and count as
    /// misses.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let mut shard = self.shard_for(key).lock().expect("cache shard poisoned");
        let expired = match shard.get_mut(key) {
            Some(entry) => {
                if entry.expires_at > now {
                    entry.last_used = now;
                    let value = entry.value.clone();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                true
            }
            None => false,
        };

        if expired
            && let Some(removed) = shard.remove(key)
        {
            self.entries.fetch_sub(1, Ordering::Relaxed);
            self.bytes.fetch_sub(removed.size, Ordering::Relaxed);
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a value with a TTL, evicting expired-or-oldest entries
    /// when the configured bounds are exceeded.
    pub fn put(&self, key: impl Into<String>, value: serde_json::Value, ttl: Duration) {
        let key = key.into();
        let size = estimate_size(&key, &value);
        let now = Instant::now();
        let entry = Entry {
            value,
            expires_at: now + ttl,
            size,
            last_used: now,
        };

        {
            let mut shard = self.shard_for(&key).lock().expect("cache shard poisoned");
            if let Some(old) = shard.insert(key, entry) {
                self.bytes.fetch_sub(old.size, Ordering::Relaxed);
            } else {
                self.entries.fetch_add(1, Ordering::Relaxed);
            }
            self.bytes.fetch_add(size, Ordering::Relaxed);
            self.sets.fetch_add(1, Ordering::Relaxed);
        }

        if self.entries.load(Ordering::Relaxed) > self.config.max_entries
            || self.bytes.load(Ordering::Relaxed) > self.config.max_bytes
        {
            self.enforce_capacity();
        }
    }

    /// Remove every entry whose key starts with `prefix`, atomically
    /// with respect to concurrent readers. Returns how many entries
    /// were removed.
    pub fn invalidate(&self, prefix: &str) -> u64 {
        let mut guards: Vec<_> = self
            .shards
            .iter()
            .map(|s| s.lock().expect("cache shard poisoned"))
            .collect();

        let mut removed = 0u64;
        let mut freed = 0u64;
        for shard in guards.iter_mut() {
            shard.retain(|key, entry| {
                if key.starts_with(prefix) {
                    removed += 1;
                    freed += entry.size;
                    false
                } else {
                    true
                }
            });
        }
        drop(guards);

        self.entries.fetch_sub(removed, Ordering::Relaxed);
        self.bytes.fetch_sub(freed, Ordering::Relaxed);
        self.deletes.fetch_add(removed, Ordering::Relaxed);
        removed
    }

    /// Drop expired entries. Called by the background sweeper; readers
    /// also expire lazily on `get`.
    pub fn remove_expired(&self) -> u64 {
        let now = Instant::now();
        let mut removed = 0u64;
        let mut freed = 0u64;

        for shard in &self.shards {
            let mut shard = shard.lock().expect("cache shard poisoned");
            shard.retain(|_, entry| {
                if entry.expires_at <= now {
                    removed += 1;
                    freed += entry.size;
                    false
                } else {
                    true
                }
            });
        }

        self.entries.fetch_sub(removed, Ordering::Relaxed);
        self.bytes.fetch_sub(freed, Ordering::Relaxed);
        self.deletes.fetch_add(removed, Ordering::Relaxed);
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: self.entries.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            max_entries: self.config.max_entries,
            max_bytes: self.config.max_bytes,
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Look up `key`, computing and caching the value on a miss. The
    /// computation is single-flight per key: concurrent callers of a
    /// cold key wait for the first computation instead of repeating it.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        let flight = {
            let mut flights = self.flights.lock().expect("flight map poisoned");
            flights
                .entry(key.to_string())
                .or_insert_with(|| std::sync::Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = flight.lock().await;
            match self.get(key) {
                Some(value) => Ok(value),
                None => match compute().await {
                    Ok(value) => {
                        self.put(key.to_string(), value.clone(), ttl);
                        Ok(value)
                    }
                    Err(e) => Err(e),
                },
            }
        };

        // Drop the flight entry once no other caller holds it.
        let mut flights = self.flights.lock().expect("flight map poisoned");
        if std::sync::Arc::strong_count(&flight) <= 2 {
            flights.remove(key);
        }

        result
    }

    /// A handle whose keys are prefixed with the tenant id, enforcing
    /// tenant isolation by construction.
    pub fn scoped(self: &std::sync::Arc<Self>, tenant_id: Uuid) -> TenantCache {
        TenantCache {
            cache: self.clone(),
            prefix: format!("{tenant_id}:"),
        }
    }

    /// Evict expired entries first, then the globally least-recently
    /// used, until within bounds. Takes every shard lock.
    fn enforce_capacity(&self) {
        self.remove_expired();

        while self.entries.load(Ordering::Relaxed) > self.config.max_entries
            || self.bytes.load(Ordering::Relaxed) > self.config.max_bytes
        {
            let mut guards: Vec<_> = self
                .shards
                .iter()
                .map(|s| s.lock().expect("cache shard poisoned"))
                .collect();

            let mut victim: Option<(usize, String, Instant)> = None;
            for (idx, shard) in guards.iter().enumerate() {
                for (key, entry) in shard.iter() {
                    let older = match &victim {
                        Some((_, _, last_used)) => entry.last_used < *last_used,
                        None => true,
                    };
                    if older {
                        victim = Some((idx, key.clone(), entry.last_used));
                    }
                }
            }

            match victim {
                Some((idx, key, _)) => {
                    if let Some(removed) = guards[idx].remove(&key) {
                        self.entries.fetch_sub(1, Ordering::Relaxed);
                        self.bytes.fetch_sub(removed.size, Ordering::Relaxed);
                        self.deletes.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }
    }
}

/// Tenant-scoped cache view. Every key it produces starts with the
/// tenant id segment.
#[derive(Clone)]
pub struct TenantCache {
    cache: std::sync::Arc<Cache>,
    prefix: String,
}

impl TenantCache {
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.cache.get(&format!("{}{key}", self.prefix))
    }

    pub fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.cache.put(format!("{}{key}", self.prefix), value, ttl);
    }

    /// Single-flight lookup-or-compute within the tenant's namespace.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        self.cache
            .get_or_compute(&format!("{}{key}", self.prefix), ttl, compute)
            .await
    }

    /// Invalidate this tenant's entries under `key_prefix` (all of the
    /// tenant's entries when empty). Returns how many were removed.
    pub fn invalidate(&self, key_prefix: &str) -> u64 {
        self.cache
            .invalidate(&format!("{}{key_prefix}", self.prefix))
    }
}

fn estimate_size(key: &str, value: &serde_json::Value) -> u64 {
    let value_len = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);
    (key.len() + value_len) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn small_cache(max_entries: u64) -> Cache {
        Cache::new(CacheConfig {
            max_entries,
            max_bytes: 1024 * 1024,
            sweep_interval: Duration::from_secs(60),
        })
    }

    #[test]
    fn put_then_get_within_ttl() {
        let cache = small_cache(16);
        cache.put("t1:a", json!({"x": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("t1:a"), Some(json!({"x": 1})));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = small_cache(16);
        cache.put("t1:a", json!(1), Duration::from_millis(0));
        assert_eq!(cache.get("t1:a"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn prefix_invalidation_removes_all_matches() {
        let cache = small_cache(16);
        cache.put("t1:a", json!(1), Duration::from_secs(60));
        cache.put("t1:b", json!(2), Duration::from_secs(60));
        cache.put("t2:a", json!(3), Duration::from_secs(60));

        let removed = cache.invalidate("t1:");
        assert_eq!(removed, 2);
        assert_eq!(cache.get("t1:a"), None);
        assert_eq!(cache.get("t1:b"), None);
        assert_eq!(cache.get("t2:a"), Some(json!(3)));
    }

    #[test]
    fn lru_eviction_when_full() {
        let cache = small_cache(3);
        cache.put("t1:a", json!(1), Duration::from_secs(60));
        cache.put("t1:b", json!(2), Duration::from_secs(60));
        cache.put("t1:c", json!(3), Duration::from_secs(60));

        // Touch a and c so b is the least recently used.
        cache.get("t1:a");
        cache.get("t1:c");
        cache.put("t1:d", json!(4), Duration::from_secs(60));

        assert!(cache.stats().entries <= 3);
        assert_eq!(cache.get("t1:b"), None);
        assert_eq!(cache.get("t1:a"), Some(json!(1)));
    }

    #[test]
    fn stats_track_hit_rate() {
        let cache = small_cache(16);
        cache.put("t1:a", json!(1), Duration::from_secs(60));
        cache.get("t1:a");
        cache.get("t1:a");
        cache.get("t1:missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scoped_handles_isolate_tenants() {
        let cache = Arc::new(small_cache(16));
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let a = cache.scoped(tenant_a);
        let b = cache.scoped(tenant_b);

        a.put("report", json!("a-data"), Duration::from_secs(60));
        assert_eq!(a.get("report"), Some(json!("a-data")));
        assert_eq!(b.get("report"), None);

        // Every key the scoped handle produced starts with the tenant id.
        assert_eq!(
            cache.get(&format!("{tenant_a}:report")),
            Some(json!("a-data"))
        );
    }

    #[tokio::test]
    async fn cold_key_stampede_computes_once() {
        use std::sync::atomic::AtomicU32;

        let cache = Arc::new(small_cache(64));
        let tenant = cache.scoped(Uuid::new_v4());
        let computes = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let tenant = tenant.clone();
            let computes = computes.clone();
            handles.push(tokio::spawn(async move {
                tenant
                    .get_or_compute("expensive", Duration::from_secs(60), || async {
                        computes.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok::<_, std::convert::Infallible>(json!("computed"))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!("computed"));
        }

        assert_eq!(computes.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 99);
        assert!(stats.hit_rate > 0.98);
    }

    #[test]
    fn scoped_invalidation_stays_in_tenant() {
        let cache = Arc::new(small_cache(16));
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        let a = cache.scoped(tenant_a);
        let b = cache.scoped(tenant_b);
        a.put("x", json!(1), Duration::from_secs(60));
        b.put("x", json!(2), Duration::from_secs(60));

        assert_eq!(a.invalidate(""), 1);
        assert_eq!(a.get("x"), None);
        assert_eq!(b.get("x"), Some(json!(2)));
    }
}
