//! Application cache abstraction.
//!
//! An [`AppCache`] is a string-keyed, type-erased store with read-through population.
//! [`ObjectCache`] is the in-memory implementation used for the global and isolated
//! caches; [`NoAppCache`] is the pass-through used when a scope disables caching.

use std::any::Any;
use std::pin::pin;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use tokio::sync::Notify;
use tracing::{debug, trace};

use super::lock::{condvar_wait, mutex_lock};
use crate::repository::RepoResult;

const SOURCE: &str = "cache::app_cache";

pub(crate) const METRIC_HIT: &str = "pubcache_app_cache_hit_total";
pub(crate) const METRIC_MISS: &str = "pubcache_app_cache_miss_total";
pub(crate) const METRIC_FACTORY: &str = "pubcache_app_cache_factory_total";
pub(crate) const METRIC_FACTORY_MS: &str = "pubcache_factory_ms";

/// A cached value. Typed access goes through [`AppCacheExt`].
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Lifetime of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    #[default]
    Never,
    /// Expires a fixed duration after insertion.
    Absolute(Duration),
    /// Expires after a period without reads; every hit renews the window.
    Sliding(Duration),
}

impl Expiration {
    fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            Expiration::Never => None,
            Expiration::Absolute(ttl) | Expiration::Sliding(ttl) => now.checked_add(ttl),
        }
    }
}

/// String-keyed application cache.
///
/// A factory returning `Ok(None)` means "nothing to cache": the absence is returned to
/// the caller and no entry is stored. Factory errors propagate and leave the cache
/// untouched.
#[async_trait]
pub trait AppCache: Send + Sync {
    /// Name used as the `cache` label on metrics.
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Returns the cached value or runs `factory` and stores what it produced.
    ///
    /// Concurrent callers for the same key run the factory once; the rest observe
    /// the stored value.
    fn get_or_add(
        &self,
        key: &str,
        expiration: Expiration,
        factory: &mut (dyn FnMut() -> RepoResult<Option<CacheValue>> + Send),
    ) -> RepoResult<Option<CacheValue>>;

    /// Asynchronous read-through. `factory` is only polled on a miss.
    ///
    /// A value is stored only once `factory` completes; dropping the returned future
    /// mid-flight stores nothing.
    async fn get_or_add_async(
        &self,
        key: &str,
        expiration: Expiration,
        factory: BoxFuture<'_, RepoResult<Option<CacheValue>>>,
    ) -> RepoResult<Option<CacheValue>>;

    fn insert(&self, key: &str, value: CacheValue, expiration: Expiration);

    fn remove(&self, key: &str);

    /// Returns every live value whose key starts with `prefix`.
    fn search_by_key_prefix(&self, prefix: &str) -> Vec<CacheValue>;

    fn clear_by_key_prefix(&self, prefix: &str);

    fn clear_by_predicate(&self, predicate: &dyn Fn(&str) -> bool);

    fn clear(&self);
}

/// Typed helpers on top of [`AppCache`].
pub trait AppCacheExt: AppCache {
    fn get_typed<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        self.get(key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Returns the shared value without cloning the payload.
    fn get_shared<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get(key).and_then(|value| value.downcast::<T>().ok())
    }

    fn insert_typed<T>(&self, key: &str, value: T, expiration: Expiration)
    where
        T: Any + Send + Sync,
    {
        self.insert(key, Arc::new(value), expiration);
    }

    fn get_or_add_typed<T, F>(
        &self,
        key: &str,
        expiration: Expiration,
        factory: F,
    ) -> RepoResult<Option<T>>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> RepoResult<Option<T>> + Send,
    {
        let mut factory = Some(factory);
        let mut erased = move || match factory.take() {
            Some(run) => run().map(|value| value.map(|v| Arc::new(v) as CacheValue)),
            None => Ok(None),
        };
        let value = self.get_or_add(key, expiration, &mut erased)?;
        Ok(value.and_then(|value| value.downcast_ref::<T>().cloned()))
    }

    fn get_or_add_typed_async<'a, T, Fut>(
        &'a self,
        key: &'a str,
        expiration: Expiration,
        factory: Fut,
    ) -> BoxFuture<'a, RepoResult<Option<T>>>
    where
        T: Any + Clone + Send + Sync,
        Fut: std::future::Future<Output = RepoResult<Option<T>>> + Send + 'a,
    {
        Box::pin(async move {
            let erased = Box::pin(async move {
                factory
                    .await
                    .map(|value| value.map(|v| Arc::new(v) as CacheValue))
            });
            let value = self.get_or_add_async(key, expiration, erased).await?;
            Ok(value.and_then(|value| value.downcast_ref::<T>().cloned()))
        })
    }
}

impl<C: AppCache + ?Sized> AppCacheExt for C {}

// ============================================================================
// ObjectCache
// ============================================================================

struct Slot {
    value: CacheValue,
    expiration: Expiration,
    deadline: Option<Instant>,
}

impl Slot {
    fn new(value: CacheValue, expiration: Expiration, now: Instant) -> Self {
        Self {
            value,
            expiration,
            deadline: expiration.deadline(now),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    fn touch(&mut self, now: Instant) {
        if let Expiration::Sliding(_) = self.expiration {
            self.deadline = self.expiration.deadline(now);
        }
    }
}

#[derive(Default)]
struct FlightState {
    running: bool,
    /// Bumped whenever the key is written or invalidated.
    epoch: u64,
}

/// Per-key gate shared by the blocking and async read-through paths.
#[derive(Default)]
struct Flight {
    state: Mutex<FlightState>,
    released: Condvar,
    released_async: Notify,
}

impl Flight {
    fn try_claim(&self) -> Option<FlightGuard<'_>> {
        let mut state = mutex_lock(&self.state, SOURCE, "flight.claim");
        if state.running {
            return None;
        }
        state.running = true;
        Some(FlightGuard { flight: self })
    }

    fn claim_blocking(&self) -> FlightGuard<'_> {
        let mut state = mutex_lock(&self.state, SOURCE, "flight.claim");
        while state.running {
            state = condvar_wait(&self.released, state, SOURCE, "flight.claim");
        }
        state.running = true;
        FlightGuard { flight: self }
    }

    async fn claim(&self) -> FlightGuard<'_> {
        loop {
            let mut released = pin!(self.released_async.notified());
            released.as_mut().enable();
            if let Some(guard) = self.try_claim() {
                return guard;
            }
            released.await;
        }
    }

    fn epoch(&self) -> u64 {
        mutex_lock(&self.state, SOURCE, "flight.epoch").epoch
    }

    fn invalidate(&self) {
        mutex_lock(&self.state, SOURCE, "flight.invalidate").epoch += 1;
    }
}

/// Releases the gate on every exit path, including a dropped future.
struct FlightGuard<'a> {
    flight: &'a Flight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        mutex_lock(&self.flight.state, SOURCE, "flight.release").running = false;
        self.flight.released.notify_all();
        self.flight.released_async.notify_waiters();
    }
}

/// In-memory [`AppCache`] backed by a concurrent map.
///
/// Expired entries are dropped lazily when they are next read or searched.
/// Writes and removals invalidate in-flight factories for the keys they touch. Such
/// a factory still returns its value but does not store it, so a read racing a write
/// never overwrites or resurrects what the write left behind. Work on other keys is
/// unaffected.
pub struct ObjectCache {
    name: String,
    entries: DashMap<String, Slot>,
    flights: DashMap<String, Weak<Flight>>,
}

impl ObjectCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            flights: DashMap::new(),
        }
    }

    /// Number of stored entries, including expired ones not yet collected.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Returns the live keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn lookup(&self, key: &str) -> Option<CacheValue> {
        let now = Instant::now();
        if let Some(mut slot) = self.entries.get_mut(key) {
            if !slot.is_expired(now) {
                slot.touch(now);
                return Some(slot.value.clone());
            }
        } else {
            return None;
        }
        self.entries.remove_if(key, |_, slot| slot.is_expired(now));
        trace!(cache = %self.name, key, "Dropped expired cache entry");
        None
    }

    fn record_hit(&self) {
        counter!(METRIC_HIT, "cache" => self.name.clone()).increment(1);
    }

    fn record_miss(&self) {
        counter!(METRIC_MISS, "cache" => self.name.clone()).increment(1);
    }

    fn flight(&self, key: &str) -> Arc<Flight> {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if let Some(flight) = occupied.get().upgrade() {
                    return flight;
                }
                let flight = Arc::new(Flight::default());
                occupied.insert(Arc::downgrade(&flight));
                flight
            }
            Entry::Vacant(vacant) => {
                let flight = Arc::new(Flight::default());
                vacant.insert(Arc::downgrade(&flight));
                flight
            }
        }
    }

    fn release_flight(&self, key: &str, flight: Arc<Flight>) {
        drop(flight);
        self.flights
            .remove_if(key, |_, weak| weak.strong_count() == 0);
    }

    /// Must run before the entries themselves change.
    fn invalidate_flight(&self, key: &str) {
        let flight = self.flights.get(key).and_then(|weak| weak.upgrade());
        if let Some(flight) = flight {
            flight.invalidate();
        }
    }

    fn invalidate_flights(&self, matches: impl Fn(&str) -> bool) {
        for entry in self.flights.iter() {
            if matches(entry.key().as_str()) {
                if let Some(flight) = entry.value().upgrade() {
                    flight.invalidate();
                }
            }
        }
    }

    fn store_produced(
        &self,
        key: &str,
        expiration: Expiration,
        flight: &Flight,
        epoch: u64,
        started: Instant,
        produced: RepoResult<Option<CacheValue>>,
    ) -> RepoResult<Option<CacheValue>> {
        counter!(METRIC_FACTORY, "cache" => self.name.clone()).increment(1);
        histogram!(METRIC_FACTORY_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let value = produced?;
        if let Some(value) = value.as_ref() {
            let state = mutex_lock(&flight.state, SOURCE, "store");
            if state.epoch == epoch {
                self.entries.insert(
                    key.to_string(),
                    Slot::new(value.clone(), expiration, Instant::now()),
                );
            } else {
                debug!(
                    cache = %self.name,
                    key,
                    "Discarded factory result invalidated while in flight"
                );
            }
        }
        Ok(value)
    }
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl AppCache for ObjectCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        let value = self.lookup(key);
        if value.is_some() {
            self.record_hit();
        } else {
            self.record_miss();
        }
        value
    }

    fn get_or_add(
        &self,
        key: &str,
        expiration: Expiration,
        factory: &mut (dyn FnMut() -> RepoResult<Option<CacheValue>> + Send),
    ) -> RepoResult<Option<CacheValue>> {
        if let Some(value) = self.lookup(key) {
            self.record_hit();
            return Ok(Some(value));
        }

        let flight = self.flight(key);
        let result = {
            let _guard = flight.claim_blocking();
            if let Some(value) = self.lookup(key) {
                self.record_hit();
                Ok(Some(value))
            } else {
                self.record_miss();
                let epoch = flight.epoch();
                let started = Instant::now();
                let produced = factory();
                self.store_produced(key, expiration, &flight, epoch, started, produced)
            }
        };
        self.release_flight(key, flight);
        result
    }

    async fn get_or_add_async(
        &self,
        key: &str,
        expiration: Expiration,
        factory: BoxFuture<'_, RepoResult<Option<CacheValue>>>,
    ) -> RepoResult<Option<CacheValue>> {
        if let Some(value) = self.lookup(key) {
            self.record_hit();
            return Ok(Some(value));
        }

        let flight = self.flight(key);
        let result = {
            let _guard = flight.claim().await;
            if let Some(value) = self.lookup(key) {
                self.record_hit();
                Ok(Some(value))
            } else {
                self.record_miss();
                let epoch = flight.epoch();
                let started = Instant::now();
                let produced = factory.await;
                self.store_produced(key, expiration, &flight, epoch, started, produced)
            }
        };
        self.release_flight(key, flight);
        result
    }

    fn insert(&self, key: &str, value: CacheValue, expiration: Expiration) {
        self.invalidate_flight(key);
        self.entries
            .insert(key.to_string(), Slot::new(value, expiration, Instant::now()));
    }

    fn remove(&self, key: &str) {
        self.invalidate_flight(key);
        self.entries.remove(key);
    }

    fn search_by_key_prefix(&self, prefix: &str) -> Vec<CacheValue> {
        let now = Instant::now();
        let mut found = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if entry.key().starts_with(prefix) && !entry.is_expired(now) {
                entry.touch(now);
                found.push(entry.value.clone());
            }
        }
        found
    }

    fn clear_by_key_prefix(&self, prefix: &str) {
        self.invalidate_flights(|key| key.starts_with(prefix));
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    fn clear_by_predicate(&self, predicate: &dyn Fn(&str) -> bool) {
        self.invalidate_flights(predicate);
        self.entries.retain(|key, _| !predicate(key));
    }

    fn clear(&self) {
        self.invalidate_flights(|_| true);
        self.entries.clear();
        debug!(cache = %self.name, "Cleared cache");
    }
}

// ============================================================================
// NoAppCache
// ============================================================================

/// Pass-through cache: every read-through runs its factory and nothing is stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAppCache;

static SHARED_NO_APP_CACHE: Lazy<Arc<NoAppCache>> = Lazy::new(|| Arc::new(NoAppCache));

impl NoAppCache {
    pub fn shared() -> Arc<NoAppCache> {
        Arc::clone(&SHARED_NO_APP_CACHE)
    }
}

#[async_trait]
impl AppCache for NoAppCache {
    fn name(&self) -> &str {
        "none"
    }

    fn get(&self, _key: &str) -> Option<CacheValue> {
        None
    }

    fn get_or_add(
        &self,
        _key: &str,
        _expiration: Expiration,
        factory: &mut (dyn FnMut() -> RepoResult<Option<CacheValue>> + Send),
    ) -> RepoResult<Option<CacheValue>> {
        factory()
    }

    async fn get_or_add_async(
        &self,
        _key: &str,
        _expiration: Expiration,
        factory: BoxFuture<'_, RepoResult<Option<CacheValue>>>,
    ) -> RepoResult<Option<CacheValue>> {
        factory.await
    }

    fn insert(&self, _key: &str, _value: CacheValue, _expiration: Expiration) {}

    fn remove(&self, _key: &str) {}

    fn search_by_key_prefix(&self, _prefix: &str) -> Vec<CacheValue> {
        Vec::new()
    }

    fn clear_by_key_prefix(&self, _prefix: &str) {}

    fn clear_by_predicate(&self, _predicate: &dyn Fn(&str) -> bool) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::repository::RepoError;

    fn cache() -> ObjectCache {
        ObjectCache::new("test")
    }

    #[test]
    fn read_through_stores_factory_value_once() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = cache
                .get_or_add_typed("k", Expiration::Never, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(42_u32))
                })
                .expect("factory succeeds");
            assert_eq!(value, Some(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_factory_result_is_not_stored() {
        let cache = cache();
        let value = cache
            .get_or_add_typed::<u32, _>("k", Expiration::Never, || Ok(None))
            .expect("factory succeeds");
        assert_eq!(value, None);
        assert!(cache.is_empty());
    }

    #[test]
    fn factory_errors_leave_no_entry() {
        let cache = cache();
        let value = cache.get_or_add_typed::<u32, _>("k", Expiration::Never, || {
            Err(RepoError::Timeout)
        });
        assert_eq!(value, Err(RepoError::Timeout));
        assert!(!cache.contains_key("k"));
    }

    #[test]
    fn absolute_expiration_drops_entry() {
        let cache = cache();
        cache.insert_typed("k", 1_u8, Expiration::Absolute(Duration::from_millis(20)));
        assert_eq!(cache.get_typed::<u8>("k"), Some(1));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get_typed::<u8>("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn sliding_expiration_renews_on_read() {
        let cache = cache();
        cache.insert_typed("k", 1_u8, Expiration::Sliding(Duration::from_millis(80)));
        for _ in 0..4 {
            thread::sleep(Duration::from_millis(30));
            assert_eq!(cache.get_typed::<u8>("k"), Some(1));
        }
        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get_typed::<u8>("k"), None);
    }

    #[test]
    fn prefix_operations_only_touch_matching_keys() {
        let cache = cache();
        cache.insert_typed("uRepo_Thing_1", 1_i32, Expiration::Never);
        cache.insert_typed("uRepo_Thing_2", 2_i32, Expiration::Never);
        cache.insert_typed("uRepo_Other_1", 3_i32, Expiration::Never);

        let mut found: Vec<i32> = cache
            .search_by_key_prefix("uRepo_Thing_")
            .into_iter()
            .filter_map(|value| value.downcast_ref::<i32>().copied())
            .collect();
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);

        cache.clear_by_key_prefix("uRepo_Thing_");
        assert_eq!(cache.keys(), vec!["uRepo_Other_1".to_string()]);

        cache.clear_by_predicate(&|key| key.ends_with("_1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_misses_run_factory_once() {
        let cache = Arc::new(cache());
        let calls = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_add_typed("shared", Expiration::Never, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(Some("value".to_string()))
                        })
                        .expect("factory succeeds")
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some("value".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.flights.is_empty());
    }

    #[test]
    fn concurrent_misses_ignore_writes_to_other_keys() {
        let cache = Arc::new(cache());
        let calls = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut i = 0_u32;
                while !done.load(Ordering::SeqCst) {
                    cache.insert_typed(&format!("other{i}"), i, Expiration::Never);
                    cache.remove(&format!("other{}", i.saturating_sub(1)));
                    i += 1;
                    thread::sleep(Duration::from_millis(2));
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_add_typed("shared", Expiration::Never, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(Some(7_u64))
                        })
                        .expect("factory succeeds")
                })
            })
            .collect();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), Some(7));
        }
        done.store(true, Ordering::SeqCst);
        writer.join().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_typed::<u64>("shared"), Some(7));
    }

    #[test]
    fn invalidating_other_keys_keeps_in_flight_result() {
        let cache = cache();
        cache.insert_typed("x:1", 1_u8, Expiration::Never);
        let value = cache
            .get_or_add_typed("k", Expiration::Never, || {
                cache.remove("other");
                cache.clear_by_key_prefix("x:");
                cache.insert_typed("y", 2_u8, Expiration::Never);
                Ok(Some(3_u8))
            })
            .expect("factory succeeds");
        assert_eq!(value, Some(3));
        assert_eq!(cache.get_typed::<u8>("k"), Some(3));
        assert!(!cache.contains_key("x:1"));
    }

    #[test]
    fn clear_during_factory_discards_result() {
        let cache = cache();
        let value = cache
            .get_or_add_typed("k", Expiration::Never, || {
                cache.clear();
                Ok(Some(4_u8))
            })
            .expect("factory succeeds");
        assert_eq!(value, Some(4));
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_and_async_callers_share_one_factory_run() {
        let cache = Arc::new(cache());
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicBool::new(false));

        let blocking = {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                cache
                    .get_or_add_typed("shared", Expiration::Never, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        started.store(true, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(Some(11_u32))
                    })
                    .expect("factory succeeds")
            })
        };

        while !started.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let async_calls = Arc::clone(&calls);
        let value = cache
            .get_or_add_typed_async("shared", Expiration::Never, async move {
                async_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(12_u32))
            })
            .await
            .expect("read succeeds");

        assert_eq!(value, Some(11));
        assert_eq!(blocking.join().unwrap(), Some(11));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.flights.is_empty());
    }

    #[tokio::test]
    async fn dropped_async_read_releases_the_gate() {
        let cache = cache();
        let pending = cache.get_or_add_typed_async("k", Expiration::Never, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(1_u8))
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(10), pending)
                .await
                .is_err()
        );

        let value = cache
            .get_or_add_typed("k", Expiration::Never, || Ok(Some(2_u8)))
            .expect("factory succeeds");
        assert_eq!(value, Some(2));
    }

    #[test]
    fn removal_during_factory_discards_result() {
        let cache = cache();
        let value = cache
            .get_or_add_typed("k", Expiration::Never, || {
                cache.remove("k");
                Ok(Some(9_u16))
            })
            .expect("factory succeeds");
        assert_eq!(value, Some(9));
        assert!(!cache.contains_key("k"));
    }

    #[tokio::test]
    async fn async_read_through_stores_value() {
        let cache = cache();
        let value = cache
            .get_or_add_typed_async("k", Expiration::Never, async { Ok(Some(5_i64)) })
            .await
            .expect("factory succeeds");
        assert_eq!(value, Some(5));
        assert_eq!(cache.get_typed::<i64>("k"), Some(5));
    }

    #[tokio::test]
    async fn dropped_async_read_through_stores_nothing() {
        let cache = cache();
        let pending = cache.get_or_add_typed_async("k", Expiration::Never, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(1_u8))
        });
        let outcome = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(outcome.is_err());
        assert!(!cache.contains_key("k"));
    }

    #[test]
    fn no_app_cache_always_runs_factory() {
        let cache = NoAppCache::shared();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let value = cache
                .get_or_add_typed("k", Expiration::Never, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(1_u8))
                })
                .expect("factory succeeds");
            assert_eq!(value, Some(1));
        }
        cache.insert_typed("k", 2_u8, Expiration::Never);
        assert_eq!(cache.get_typed::<u8>("k"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
