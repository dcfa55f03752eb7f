//! Per-key memoizing fetch cache and the anchor store built on it.
//!
//! A cache miss installs a [`Pending`] under its key *before* the fetch
//! starts, so every caller asking for the same key while the request is in
//! flight joins it instead of issuing another one. A failed fetch removes its
//! key again: errors are delivered to the joined callers but never cached.

mod pending;

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use pending::Pending;
use rustc_hash::FxHashMap;

use crate::anchor::{AnchorSnapshot, ModelArtifact};
use crate::error::PolyphonyError;
use crate::gateway::AnchorGateway;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where fetches and mutations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// On a named background thread; results are picked up later.
    #[default]
    Background,
    /// On the calling thread, before the call returns.
    Inline,
}

impl Dispatch {
    /// Run `job` according to this dispatch mode.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the background thread fails to spawn; the
    /// job has not run in that case.
    pub fn run<F>(self, name: &str, job: F) -> Result<(), std::io::Error>
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Inline => {
                job();
                Ok(())
            }
            Self::Background => std::thread::Builder::new()
                .name(name.to_owned())
                .spawn(job)
                .map(drop),
        }
    }
}

// ---------------------------------------------------------------------------
// FetchCache
// ---------------------------------------------------------------------------

/// Memoizing cache from `K` to a shared, possibly in-flight `V`.
pub struct FetchCache<K, V> {
    entries: Arc<Mutex<FxHashMap<K, Pending<V>>>>,
    dispatch: Dispatch,
    label: &'static str,
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Send + Sync + 'static,
{
    /// Empty cache. `label` names worker threads and log lines.
    #[must_use]
    pub fn new(label: &'static str, dispatch: Dispatch) -> Self {
        Self {
            entries: Arc::new(Mutex::new(FxHashMap::default())),
            dispatch,
            label,
        }
    }

    /// Return the cached outcome for `key`, or start exactly one fetch for
    /// it.
    pub fn get_or_fetch<F>(&self, key: K, fetch: F) -> Pending<V>
    where
        F: FnOnce() -> Result<V, PolyphonyError> + Send + 'static,
    {
        let pending = {
            let mut entries = lock(&self.entries);
            if let Some(existing) = entries.get(&key) {
                log::debug!("{} cache hit for {key:?}", self.label);
                return existing.clone();
            }
            let pending = Pending::new();
            drop(entries.insert(key.clone(), pending.clone()));
            pending
        };
        log::debug!("{} cache miss for {key:?}, fetching", self.label);

        let job = {
            let entries = Arc::clone(&self.entries);
            let pending = pending.clone();
            let key = key.clone();
            let label = self.label;
            move || {
                let outcome = fetch();
                if let Err(e) = &outcome {
                    log::warn!("{label} fetch for {key:?} failed: {e}");
                    forget(&entries, &key, &pending);
                }
                pending.complete(outcome);
            }
        };

        let name = format!("{}-fetch", self.label);
        if let Err(e) = self.dispatch.run(&name, job) {
            forget(&self.entries, &key, &pending);
            pending.complete(Err(e.into()));
        }
        pending
    }

    /// Cached handle for `key`, without fetching.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Pending<V>> {
        lock(&self.entries).get(key).cloned()
    }

    /// Whether `key` has a cached or in-flight entry.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Number of cached or in-flight entries.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry for which `keep` returns `false`. In-flight requests
    /// still complete for callers already holding their handle.
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        lock(&self.entries).retain(|k, _| keep(k));
    }
}

/// Remove `key` only if it still maps to `pending`.
fn forget<K: Eq + Hash, V>(
    entries: &Mutex<FxHashMap<K, Pending<V>>>,
    key: &K,
    pending: &Pending<V>,
) {
    let mut entries = lock(entries);
    if entries.get(key).is_some_and(|p| p.same_request(pending)) {
        drop(entries.remove(key));
    }
}

// ---------------------------------------------------------------------------
// AnchorStore
// ---------------------------------------------------------------------------

/// Anchor snapshots and model artifacts, memoized by iteration.
///
/// Historical iterations are kept: a new iteration simply creates a new key,
/// so older snapshots stay addressable for replay and debugging.
pub struct AnchorStore {
    gateway: Arc<dyn AnchorGateway>,
    anchors: FetchCache<u64, AnchorSnapshot>,
    models: FetchCache<u64, ModelArtifact>,
}

impl AnchorStore {
    /// Store fetching through `gateway`.
    pub fn new(gateway: Arc<dyn AnchorGateway>, dispatch: Dispatch) -> Self {
        Self {
            gateway,
            anchors: FetchCache::new("anchors", dispatch),
            models: FetchCache::new("model", dispatch),
        }
    }

    /// Snapshot for `iteration`, fetched at most once while cached.
    pub fn get(&self, iteration: u64) -> Pending<AnchorSnapshot> {
        let gateway = Arc::clone(&self.gateway);
        self.anchors.get_or_fetch(iteration, move || {
            gateway.fetch_all(iteration).map_err(PolyphonyError::from)
        })
    }

    /// Resolved snapshot for `iteration`, if it has already landed.
    #[must_use]
    pub fn ready(&self, iteration: u64) -> Option<Arc<AnchorSnapshot>> {
        self.anchors
            .get(&iteration)
            .and_then(|p| p.try_get())
            .and_then(Result::ok)
    }

    /// Model artifact for `iteration`; a miss triggers retraining towards
    /// that iteration.
    pub fn model(&self, iteration: u64) -> Pending<ModelArtifact> {
        let gateway = Arc::clone(&self.gateway);
        self.models.get_or_fetch(iteration, move || {
            gateway
                .request_model_update(iteration)
                .map_err(PolyphonyError::from)
        })
    }

    /// Number of snapshot iterations cached or in flight.
    #[must_use]
    pub fn cached_iterations(&self) -> usize {
        self.anchors.len()
    }

    /// The gateway this store fetches through.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn AnchorGateway> {
        &self.gateway
    }
}
