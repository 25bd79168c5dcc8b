//! Memoized option lists keyed by `(filter, field)`.
//!
//! Bounded LRU with an optional TTL.  Concurrent misses on one key are
//! serialized through a per-key async gate so the catalog is asked at most
//! once; waiters re-check the cache when they get the gate.  A generation
//! counter, bumped on every invalidation, keeps a compute that began before
//! an invalidation from storing its result afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use shelf_domain::config::BrowseConfig;
use shelf_domain::error::Result;
use shelf_domain::step::{Filter, StepKind};
use shelf_domain::trace::TraceEvent;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionKey {
    pub filter: Filter,
    pub field: StepKind,
}

impl OptionKey {
    pub fn new(filter: Filter, field: StepKind) -> Self {
        Self { filter, field }
    }
}

struct Slot {
    options: Vec<String>,
    stored_at: Instant,
}

struct Inner {
    /// Least recently used first.
    entries: IndexMap<OptionKey, Slot>,
    generation: u64,
}

pub struct OptionCache {
    capacity: usize,
    ttl: Option<Duration>,
    inner: Mutex<Inner>,
    gates: Mutex<HashMap<OptionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl OptionCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(Inner {
                entries: IndexMap::new(),
                generation: 0,
            }),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &BrowseConfig) -> Self {
        Self::new(
            config.cache_capacity,
            config.cache_ttl_secs.map(Duration::from_secs),
        )
    }

    /// Return the cached options for `key`, running `compute` on a miss.
    ///
    /// Errors from `compute` are passed through and never cached.
    pub async fn get_or_compute<F, Fut>(&self, key: &OptionKey, compute: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        if let Some(hit) = self.lookup(key) {
            return Ok(hit);
        }

        let gate = self.gate(key);
        let result = {
            let _held = gate.lock().await;
            match self.lookup(key) {
                Some(hit) => Ok(hit),
                None => {
                    let generation = self.inner.lock().generation;
                    let computed = compute().await;
                    if let Ok(options) = &computed {
                        self.store(key, options.clone(), generation);
                    }
                    computed
                }
            }
        };
        self.release_gate(key, gate);
        result
    }

    /// Drop one entry, or every entry when `key` is `None`.  Returns how many
    /// entries were removed.
    pub fn invalidate(&self, key: Option<&OptionKey>) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            match key {
                Some(k) => usize::from(inner.entries.shift_remove(k).is_some()),
                None => {
                    let n = inner.entries.len();
                    inner.entries.clear();
                    n
                }
            }
        };

        TraceEvent::CacheInvalidated {
            scope: match key {
                Some(k) => format!("{}@{}", k.field, k.filter.len()),
                None => "all".into(),
            },
            entries: removed,
        }
        .emit();
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &OptionKey) -> Option<Vec<String>> {
        let mut inner = self.inner.lock();
        let expired = {
            let slot = inner.entries.get(key)?;
            self.ttl.is_some_and(|ttl| slot.stored_at.elapsed() >= ttl)
        };
        // Remove either way: expired entries go, live ones move to the back.
        let slot = inner.entries.shift_remove(key)?;
        if expired {
            return None;
        }
        let options = slot.options.clone();
        inner.entries.insert(key.clone(), slot);
        Some(options)
    }

    fn store(&self, key: &OptionKey, options: Vec<String>, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(field = %key.field, "stale option compute discarded");
            return;
        }
        inner.entries.shift_remove(key);
        inner.entries.insert(
            key.clone(),
            Slot {
                options,
                stored_at: Instant::now(),
            },
        );
        while inner.entries.len() > self.capacity {
            inner.entries.shift_remove_index(0);
        }
    }

    fn gate(&self, key: &OptionKey) -> Arc<tokio::sync::Mutex<()>> {
        self.gates
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_gate(&self, key: &OptionKey, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut gates = self.gates.lock();
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(&gate) <= 2 {
            gates.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(field: StepKind) -> OptionKey {
        OptionKey::new(Filter::new().with(StepKind::Level, "1"), field)
    }

    fn counted(calls: &AtomicUsize, value: &str) -> Result<Vec<String>> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![value.to_string()])
    }

    #[tokio::test]
    async fn repeated_gets_compute_once() {
        let cache = OptionCache::new(8, None);
        let calls = AtomicUsize::new(0);
        for _ in 0..5 {
            let got = cache
                .get_or_compute(&key(StepKind::Term), || async { counted(&calls, "1") })
                .await
                .unwrap();
            assert_eq!(got, vec!["1"]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = OptionCache::new(8, None);
        let err = cache
            .get_or_compute(&key(StepKind::Term), || async {
                Err(shelf_domain::Error::Catalog("down".into()))
            })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        let calls = AtomicUsize::new(0);
        cache
            .get_or_compute(&key(StepKind::Term), || async { counted(&calls, "2") })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn least_recently_used_is_evicted() {
        let cache = OptionCache::new(2, None);
        let calls = AtomicUsize::new(0);
        let a = key(StepKind::Term);
        let b = key(StepKind::Category);
        let c = key(StepKind::Course);

        cache.get_or_compute(&a, || async { counted(&calls, "a") }).await.unwrap();
        cache.get_or_compute(&b, || async { counted(&calls, "b") }).await.unwrap();
        // Touch `a` so `b` becomes the oldest.
        cache.get_or_compute(&a, || async { counted(&calls, "a") }).await.unwrap();
        cache.get_or_compute(&c, || async { counted(&calls, "c") }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 2);

        cache.get_or_compute(&a, || async { counted(&calls, "a") }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cache.get_or_compute(&b, || async { counted(&calls, "b") }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_recomputed() {
        let cache = OptionCache::new(8, Some(Duration::from_secs(60)));
        let calls = AtomicUsize::new(0);
        let k = key(StepKind::Term);

        cache.get_or_compute(&k, || async { counted(&calls, "x") }).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.get_or_compute(&k, || async { counted(&calls, "x") }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.get_or_compute(&k, || async { counted(&calls, "x") }).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_one_or_all() {
        let cache = OptionCache::new(8, None);
        let calls = AtomicUsize::new(0);
        let a = key(StepKind::Term);
        let b = key(StepKind::Course);
        cache.get_or_compute(&a, || async { counted(&calls, "a") }).await.unwrap();
        cache.get_or_compute(&b, || async { counted(&calls, "b") }).await.unwrap();

        assert_eq!(cache.invalidate(Some(&a)), 1);
        assert_eq!(cache.invalidate(Some(&a)), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate(None), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn compute_racing_an_invalidation_is_not_stored() {
        let cache = OptionCache::new(8, None);
        let k = key(StepKind::Term);
        let got = cache
            .get_or_compute(&k, || async {
                cache.invalidate(None);
                Ok(vec!["stale".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(got, vec!["stale"]);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_compute() {
        let cache = Arc::new(OptionCache::new(8, None));
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(StepKind::Course);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let k = k.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&k, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok(vec!["Algebra".to_string()])
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), vec!["Algebra"]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
