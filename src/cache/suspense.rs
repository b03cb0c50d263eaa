//! Suspense cache: lookup-or-compute with request coalescing.
//!
//! A lookup either answers from an existing entry or inserts a pending entry
//! and starts the resolver. Settlement replaces the entry's state in place and
//! may arm a lifespan timer. Settlement and expiry both target the entry by
//! identity, so neither can touch a newer entry created under an equal key
//! after a `clear`.
//!
//! Expired entries are also dropped whenever the entries are locked for a
//! read, so an entry is never observed at or past its deadline even if the
//! timer has not run yet.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::channel::oneshot;
use futures::FutureExt;
use parking_lot::{Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::time::Instant;

use super::entry::{CacheEntry, EntrySnapshot, EntryState, EntryStatus};
use super::handle::{PendingHandle, Settlement, Suspense};
use super::key::default_equal;
use super::keyed::KeyedList;
use super::options::SuspendOptions;
use super::schedule::Scheduler;
use super::stats::{CacheStats, Counters};
use crate::types::config::CacheConfig;
use crate::types::errors::ResolveError;
use crate::SuspenseResult;

type Entries<T, V, E> = KeyedList<CacheEntry<T, V, E>>;

struct Inner<T, V, E> {
    name: String,
    default_lifespan: Option<Duration>,
    entries: Mutex<Entries<T, V, E>>,
    next_id: AtomicU64,
    counters: Counters,
    scheduler: Scheduler,
}

/// In-memory cache of async resolver results.
///
/// Keys are sequences of `T`; values and errors are shared as `Arc<V>` and
/// `Arc<E>`. Cloning the cache yields another handle to the same entries.
///
/// Key comparators run while the cache is locked and must not call back into
/// it.
pub struct SuspenseCache<T, V, E> {
    inner: Arc<Inner<T, V, E>>,
}

impl<T, V, E> Clone for SuspenseCache<T, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, V, E> SuspenseCache<T, V, E>
where
    T: PartialEq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a cache on the current tokio runtime.
    pub fn new(config: &CacheConfig) -> SuspenseResult<Self> {
        Ok(Self::with_scheduler(config, Scheduler::current()?))
    }

    /// Creates a cache whose resolvers and timers run on `handle`.
    pub fn with_handle(config: &CacheConfig, handle: Handle) -> Self {
        Self::with_scheduler(config, Scheduler::new(handle))
    }

    fn with_scheduler(config: &CacheConfig, scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: config.name.clone(),
                default_lifespan: config.default_lifespan(),
                entries: Mutex::new(KeyedList::new()),
                next_id: AtomicU64::new(1),
                counters: Counters::default(),
                scheduler,
            }),
        }
    }

    /// Name used in log events.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Looks up `key`, starting `resolver` if no equal key is cached.
    ///
    /// Never blocks. The call that starts a computation always reports
    /// [`Suspense::Pending`]; later calls with an equal key share the same
    /// handle until the computation settles, then report the cached value or
    /// error. The resolver is called at most once per entry.
    pub fn suspend<R, Fut>(
        &self,
        resolver: R,
        key: Vec<T>,
        options: SuspendOptions<T>,
    ) -> Suspense<V, E>
    where
        R: FnOnce(Vec<T>) -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (id, lifespan, settled, outcome) = {
            let mut entries = self.inner.live_entries();

            if let Some(entry) = entries.get(&key) {
                let outcome = entry.state.outcome();
                self.inner.counters.record_hit(outcome.status());
                tracing::trace!(
                    cache = %self.inner.name,
                    entry = entry.id,
                    status = %outcome.status(),
                    "Cache lookup hit"
                );
                return outcome;
            }

            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let (settled, handle) = PendingHandle::channel(id);
            let lifespan = options.lifespan.or(self.inner.default_lifespan);
            let equal = options.equal.unwrap_or_else(default_equal);

            let entry = CacheEntry::pending(id, key.clone(), equal, lifespan, handle);
            let outcome = entry.state.outcome();
            entries.add(entry);
            self.inner.counters.record_miss();

            (id, lifespan, settled, outcome)
        };

        tracing::debug!(cache = %self.inner.name, entry = id, "Starting resolver");

        // The resolver runs unlocked so it may use the cache itself.
        let computation = match std::panic::catch_unwind(AssertUnwindSafe(|| resolver(key))) {
            Ok(computation) => computation,
            Err(panic) => {
                self.inner.remove_entry(id);
                std::panic::resume_unwind(panic);
            }
        };

        let guard = Settling {
            inner: Arc::downgrade(&self.inner),
            id,
            settled: Some(settled),
        };
        self.inner
            .scheduler
            .spawn(run_computation(guard, lifespan, computation));

        outcome
    }

    /// Starts `resolver` for `key` if needed without waiting for it.
    ///
    /// A pending or cached value is `Ok(())`; a cached error is returned.
    pub fn preload<R, Fut>(
        &self,
        resolver: R,
        key: Vec<T>,
        options: SuspendOptions<T>,
    ) -> Result<(), Arc<E>>
    where
        R: FnOnce(Vec<T>) -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match self.suspend(resolver, key, options) {
            Suspense::Failed(error) => Err(error),
            Suspense::Ready(_) | Suspense::Pending(_) => Ok(()),
        }
    }

    /// Suspends until `key` resolves, retrying after every pending handle.
    ///
    /// If the entry is cleared while waiting, the next round starts a fresh
    /// computation with `resolver`.
    pub async fn resolve<R, Fut>(
        &self,
        resolver: &R,
        key: Vec<T>,
        options: SuspendOptions<T>,
    ) -> Result<Arc<V>, ResolveError<E>>
    where
        R: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        loop {
            match self.suspend(resolver, key.clone(), options.clone()) {
                Suspense::Ready(value) => return Ok(value),
                Suspense::Failed(error) => return Err(ResolveError::Rejected(error)),
                Suspense::Pending(handle) => {
                    if handle.await == Settlement::Abandoned {
                        return Err(ResolveError::Abandoned);
                    }
                }
            }
        }
    }

    /// Returns the cached value for `key`, if fulfilled.
    ///
    /// Never starts a computation and never reports pending or failed entries.
    pub fn peek(&self, key: &[T]) -> Option<Arc<V>> {
        let entries = self.inner.live_entries();
        match entries.get(key).map(|entry| &entry.state) {
            Some(EntryState::Fulfilled(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Returns the state of the entry for `key`.
    pub fn status(&self, key: &[T]) -> Option<EntryStatus> {
        self.inner
            .live_entries()
            .get(key)
            .map(|entry| entry.state.status())
    }

    /// Removes the entry for `key`, returning whether one existed.
    ///
    /// A pending computation keeps running but its result is discarded.
    pub fn clear(&self, key: &[T]) -> bool {
        let removed = self.inner.live_entries().remove(key);
        match removed {
            Some(entry) => {
                tracing::debug!(
                    cache = %self.inner.name,
                    entry = entry.id,
                    status = %entry.state.status(),
                    "Cache entry cleared"
                );
                true
            }
            None => false,
        }
    }

    /// Removes every entry, returning how many were removed.
    pub fn clear_all(&self) -> usize {
        let count = self.inner.live_entries().remove_all();
        tracing::debug!(cache = %self.inner.name, count, "Cache cleared");
        count
    }

    pub fn len(&self) -> usize {
        self.inner.live_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.live_entries().is_empty()
    }

    /// Returns a view of every entry in insertion order.
    pub fn snapshot(&self) -> Vec<EntrySnapshot<T>> {
        self.inner
            .live_entries()
            .iter()
            .map(CacheEntry::snapshot)
            .collect()
    }

    /// Returns lookup counters and current occupancy.
    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.live_entries();
        self.inner
            .counters
            .stats(entries.iter().map(|entry| entry.state.status()))
    }
}

impl<T, V, E> Inner<T, V, E> {
    /// Locks the entries after dropping any whose lifespan has run out.
    fn live_entries(&self) -> MutexGuard<'_, Entries<T, V, E>> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expired = entries.retain(|entry| !entry.is_expired(now));
        if expired > 0 {
            tracing::debug!(cache = %self.name, count = expired, "Cache entries expired");
        }
        entries
    }

    /// Replaces the state of entry `id` in place.
    ///
    /// Returns `false` when the entry is gone, in which case the result is
    /// dropped.
    fn settle(&self, id: u64, state: EntryState<V, E>) -> bool {
        let mut entries = self.entries.lock();
        match entries.find_mut(|entry| entry.id == id) {
            Some(entry) => {
                let settled = entry.settle(state);
                tracing::debug!(
                    cache = %self.name,
                    entry = id,
                    status = %entry.state.status(),
                    "Cache entry settled"
                );
                settled
            }
            None => {
                tracing::debug!(
                    cache = %self.name,
                    entry = id,
                    "Discarding result of cleared entry"
                );
                false
            }
        }
    }

    fn remove_entry(&self, id: u64) -> bool {
        self.entries
            .lock()
            .remove_where(|entry| entry.id == id)
            .is_some()
    }
}

/// Reports the settlement of one entry to its waiters.
///
/// Dropped without [`Settling::finish`] (the task was cancelled, or its
/// runtime shut down before the resolver completed), it removes the entry so
/// the next lookup recomputes, then wakes waiters with
/// [`Settlement::Abandoned`].
struct Settling<T, V, E> {
    inner: Weak<Inner<T, V, E>>,
    id: u64,
    settled: Option<oneshot::Sender<Settlement>>,
}

impl<T, V, E> Settling<T, V, E> {
    fn finish(mut self, settlement: Settlement) {
        if let Some(settled) = self.settled.take() {
            // Waiters may have given up already.
            let _ = settled.send(settlement);
        }
    }
}

impl<T, V, E> Drop for Settling<T, V, E> {
    fn drop(&mut self) {
        let Some(settled) = self.settled.take() else {
            return;
        };
        if let Some(inner) = self.inner.upgrade() {
            if inner.remove_entry(self.id) {
                tracing::warn!(
                    cache = %inner.name,
                    entry = self.id,
                    "Computation dropped before settling"
                );
            }
        }
        let _ = settled.send(Settlement::Abandoned);
    }
}

/// Drives one resolver future and records its result.
async fn run_computation<T, V, E, Fut>(
    guard: Settling<T, V, E>,
    lifespan: Option<Duration>,
    computation: Fut,
) where
    T: Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>>,
{
    let result = AssertUnwindSafe(computation).catch_unwind().await;

    let settlement = match &result {
        Ok(Ok(_)) => Settlement::Fulfilled,
        Ok(Err(_)) => Settlement::Rejected,
        Err(_) => Settlement::Abandoned,
    };

    let id = guard.id;
    if let Some(inner) = guard.inner.upgrade() {
        match result {
            Ok(Ok(value)) => {
                if inner.settle(id, EntryState::Fulfilled(Arc::new(value))) {
                    if let Some(lifespan) = lifespan {
                        arm_expiry(&inner, id, lifespan);
                    }
                }
            }
            Ok(Err(error)) => {
                inner.settle(id, EntryState::Rejected(Arc::new(error)));
            }
            Err(_) => {
                tracing::error!(cache = %inner.name, entry = id, "Resolver panicked");
                inner.remove_entry(id);
            }
        }
    }

    guard.finish(settlement);
}

fn arm_expiry<T, V, E>(inner: &Arc<Inner<T, V, E>>, id: u64, lifespan: Duration)
where
    T: Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let cache = Arc::downgrade(inner);
    inner.scheduler.schedule(lifespan, move || {
        if let Some(inner) = cache.upgrade() {
            if inner.remove_entry(id) {
                tracing::debug!(cache = %inner.name, entry = id, "Cache entry expired");
            }
        }
    });
}
