use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

/// Admission mode controlling what enters a bounded cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheAdmissionPolicy {
    /// Never retain entries; every lookup rebuilds.
    Disabled,
    /// Retain up to `capacity` entries, evicting the least recently used.
    #[default]
    Lru,
    /// Retain everything; `capacity` is ignored.
    AlwaysInsert,
}

/// Control-plane configuration for plan and table caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCacheConfig {
    pub capacity: usize,
    pub admission_policy: CacheAdmissionPolicy,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            admission_policy: CacheAdmissionPolicy::Lru,
        }
    }
}

impl PlanCacheConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_admission_policy(mut self, admission_policy: CacheAdmissionPolicy) -> Self {
        self.admission_policy = admission_policy;
        self
    }
}

/// Counters reported by [`BoundedCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

struct CacheSlot<V: ?Sized> {
    value: Arc<V>,
    last_used: AtomicU64,
}

/// Read-mostly memo keyed by size parameters.
///
/// Values are immutable once inserted and handed out as `Arc`, so readers
/// never block each other. A poisoned lock degrades to uncached rebuilds.
pub struct BoundedCache<K, V: ?Sized> {
    config: PlanCacheConfig,
    entries: RwLock<HashMap<K, CacheSlot<V>>>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: ?Sized,
{
    #[must_use]
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PlanCacheConfig {
        &self.config
    }

    /// Cached value for `key`, if present. Counts as a hit when found.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<Arc<V>> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let found = self.entries.read().ok().and_then(|entries| {
            entries.get(key).map(|slot| {
                slot.last_used.store(tick, Ordering::Relaxed);
                Arc::clone(&slot.value)
            })
        });
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Return the cached value for `key`, building and admitting it on a miss.
    ///
    /// The boolean is `true` on a cache hit.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        build: impl FnOnce() -> Result<Arc<V>, E>,
    ) -> Result<(Arc<V>, bool), E> {
        if let Some(value) = self.lookup(&key) {
            return Ok((value, true));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = build()?;
        self.admit(key, Arc::clone(&value));
        Ok((value, false))
    }

    fn admit(&self, key: K, value: Arc<V>) {
        if self.config.admission_policy == CacheAdmissionPolicy::Disabled {
            return;
        }
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if self.config.admission_policy == CacheAdmissionPolicy::Lru {
            if self.config.capacity == 0 {
                return;
            }
            while entries.len() >= self.config.capacity && !entries.contains_key(&key) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        entries.entry(key).or_insert(CacheSlot {
            value,
            last_used: AtomicU64::new(tick),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .is_ok_and(|entries| entries.contains_key(key))
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.config.capacity,
        }
    }
}

impl<K, V: ?Sized> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("config", &self.config)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Stable cache key for FFT plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanKey {
    pub len: usize,
    pub inverse: bool,
}

impl PlanKey {
    #[must_use]
    pub const fn new(len: usize, inverse: bool) -> Self {
        Self { len, inverse }
    }
}

/// rustfft plans shared across transforms of the same length and direction.
pub struct FftPlanCache {
    planner: Mutex<FftPlanner<f64>>,
    plans: BoundedCache<PlanKey, dyn Fft<f64>>,
}

impl FftPlanCache {
    #[must_use]
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
            plans: BoundedCache::new(config),
        }
    }

    /// Plan for `key`, with a flag telling whether it came from the cache.
    pub fn plan(&self, key: PlanKey) -> (Arc<dyn Fft<f64>>, bool) {
        let built = self
            .plans
            .get_or_try_insert_with(key, || Ok::<_, std::convert::Infallible>(self.build(key)));
        match built {
            Ok(found) => found,
            Err(never) => match never {},
        }
    }

    fn build(&self, key: PlanKey) -> Arc<dyn Fft<f64>> {
        let plan_with = |planner: &mut FftPlanner<f64>| {
            if key.inverse {
                planner.plan_fft_inverse(key.len)
            } else {
                planner.plan_fft_forward(key.len)
            }
        };
        match self.planner.lock() {
            Ok(mut planner) => plan_with(&mut planner),
            Err(_) => plan_with(&mut FftPlanner::new()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.plans.stats()
    }

    pub fn clear(&self) {
        self.plans.clear();
    }
}

impl Default for FftPlanCache {
    fn default() -> Self {
        Self::new(PlanCacheConfig::default())
    }
}

impl std::fmt::Debug for FftPlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlanCache")
            .field("plans", &self.plans)
            .finish_non_exhaustive()
    }
}
