//! Keyed resource cache that remembers failures as a fallback resource.
//!
//! A miss runs the loader once. Success caches the new resource; failure
//! caches the shared fallback under the same key and hands the original error
//! to the caller that triggered the load. Later lookups of that key succeed
//! with the fallback and never touch the disk again. Backend failures and
//! aborted loads are not file problems: they are returned without caching
//! anything.
//!
//! The map lock is not held while loading. A miss first parks an in-flight
//! slot under the key, so concurrent misses for the same key wait for that
//! one load instead of starting their own.

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use corelib::{AssetError, AssetResult};
use parking_lot::{Condvar, Mutex};

/// Loader invoked on a cache miss.
pub type LoadFn<K, R> = Box<dyn Fn(&K) -> AssetResult<R> + Send + Sync>;

enum Slot<R> {
    Ready(Arc<R>),
    Loading(Arc<InFlight<R>>),
}

/// Outcome of one load, shared with every caller that joined it.
struct InFlight<R> {
    outcome: Mutex<Option<AssetResult<Arc<R>>>>,
    done: Condvar,
}

impl<R> InFlight<R> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn finish(&self, outcome: AssetResult<Arc<R>>) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> AssetResult<Arc<R>> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(outcome) = outcome.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut outcome);
        }
    }
}

pub struct AssetCache<K, R> {
    label: &'static str,
    entries: Mutex<HashMap<K, Slot<R>>>,
    loader: LoadFn<K, R>,
    fallback: Arc<R>,
}

impl<K, R> AssetCache<K, R>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    /// `label` names the cache in log messages.
    pub fn new<F>(label: &'static str, fallback: Arc<R>, loader: F) -> Self
    where
        F: Fn(&K) -> AssetResult<R> + Send + Sync + 'static,
    {
        Self {
            label,
            entries: Mutex::new(HashMap::new()),
            loader: Box::new(loader),
            fallback,
        }
    }

    /// Resource substituted for keys whose load failed.
    #[inline]
    pub fn fallback(&self) -> &Arc<R> {
        &self.fallback
    }

    /// Look up `key`, loading it on a miss.
    ///
    /// Only the caller whose load failed sees the error; the fallback is
    /// committed under `key` at the same time. Errors that are not
    /// [recoverable](AssetError::is_recoverable) commit nothing, so the next
    /// lookup loads again.
    pub fn get(&self, key: &K) -> AssetResult<Arc<R>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(Slot::Ready(resource)) => return Ok(Arc::clone(resource)),
            Some(Slot::Loading(flight)) => {
                let flight = Arc::clone(flight);
                drop(entries);
                log::debug!("{}: waiting for in-flight load of \"{}\"", self.label, key);
                return flight.wait();
            }
            None => {}
        }
        let flight = Arc::new(InFlight::new());
        entries.insert(key.clone(), Slot::Loading(Arc::clone(&flight)));
        drop(entries);

        let pending = PendingLoad {
            cache: self,
            key,
            flight,
            completed: false,
        };
        let outcome = (self.loader)(key).map(Arc::new);
        pending.complete(outcome)
    }

    /// Drop the cache's share of `key`. Returns whether a cached resource
    /// was removed; cancelling the commit of an in-flight load does not count.
    /// Handles already given out stay valid.
    pub fn unload(&self, key: &K) -> bool {
        let removed = matches!(self.entries.lock().remove(key), Some(Slot::Ready(_)));
        if removed {
            log::debug!("{}: unloaded \"{}\"", self.label, key);
        }
        removed
    }

    /// Drop every entry. Handles already given out stay valid.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        log::debug!("{}: clearing {} entries", self.label, entries.len());
        entries.clear();
    }

    /// Whether a resource (loaded or fallback) is cached under `key`.
    pub fn contains(&self, key: &K) -> bool {
        matches!(self.entries.lock().get(key), Some(Slot::Ready(_)))
    }

    /// Number of cached resources, not counting loads still in flight.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The in-flight slot owned by the caller running a load.
///
/// Dropping it without [`PendingLoad::complete`] (the loader panicked)
/// releases the slot and wakes waiters with [`AssetError::Aborted`].
struct PendingLoad<'a, K, R>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    cache: &'a AssetCache<K, R>,
    key: &'a K,
    flight: Arc<InFlight<R>>,
    completed: bool,
}

impl<K, R> PendingLoad<'_, K, R>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    /// Whether the map still points at this load (no unload/clear meanwhile).
    fn still_current(&self, entries: &HashMap<K, Slot<R>>) -> bool {
        matches!(entries.get(self.key), Some(Slot::Loading(current)) if Arc::ptr_eq(current, &self.flight))
    }

    fn complete(mut self, outcome: AssetResult<Arc<R>>) -> AssetResult<Arc<R>> {
        let cache = self.cache;
        let committed = match &outcome {
            Ok(resource) => Some(Arc::clone(resource)),
            Err(err) if err.is_recoverable() => {
                log::error!(
                    "{}: {}; using fallback for \"{}\" from now on",
                    cache.label,
                    err,
                    self.key
                );
                Some(Arc::clone(&cache.fallback))
            }
            Err(err) => {
                log::error!("{}: {}; not caching \"{}\"", cache.label, err, self.key);
                None
            }
        };

        {
            let mut entries = cache.entries.lock();
            if !self.still_current(&entries) {
                log::debug!(
                    "{}: \"{}\" was unloaded while loading; not caching the result",
                    cache.label,
                    self.key
                );
            } else if let Some(resource) = committed {
                entries.insert(self.key.clone(), Slot::Ready(resource));
            } else {
                entries.remove(self.key);
            }
        }
        self.completed = true;
        self.flight.finish(outcome.clone());
        outcome
    }
}

impl<K, R> Drop for PendingLoad<'_, K, R>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        {
            let mut entries = self.cache.entries.lock();
            if self.still_current(&entries) {
                entries.remove(self.key);
            }
        }
        log::error!("{}: load of \"{}\" aborted", self.cache.label, self.key);
        self.flight.finish(Err(AssetError::Aborted {
            key: self.key.to_string(),
        }));
    }
}
