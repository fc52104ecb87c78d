// Fetch/refresh coordinator.
// Serves cached values immediately and revalidates them in background tasks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

use super::clock::Clock;
use super::keys::ResourceKey;
use super::lock::mutex_lock;
use super::store::CacheStore;
use super::views::ViewRegistry;

const SOURCE: &str = "cache::coordinator";

/// Remote source of cached values.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Fetch the current remote value for a key.
    async fn fetch(&self, key: &ResourceKey) -> Result<Self::Value>;
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// An existing cache entry, possibly stale.
    Cache,
    /// A value supplied by the caller, now seeded into the store.
    Seed,
    /// A blocking fetch made by this call.
    Remote,
}

/// Result of resolving a key.
#[derive(Debug)]
pub struct Resolved<V> {
    pub value: V,
    pub source: ServedFrom,
    /// Whether this call scheduled a background refresh.
    pub refresh_triggered: bool,
    /// Handle to the scheduled refresh. Dropping it does not cancel the refresh.
    pub refresh: Option<RefreshHandle>,
}

/// A background refresh that runs to completion on its own.
#[derive(Debug)]
pub struct RefreshHandle(JoinHandle<bool>);

impl RefreshHandle {
    /// Wait for the refresh. Returns true if its result was stored.
    pub async fn finished(self) -> bool {
        self.0.await.unwrap_or(false)
    }
}

struct Shared<F: Fetcher> {
    store: Arc<CacheStore<F::Value>>,
    fetcher: Arc<F>,
    views: Arc<ViewRegistry>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashSet<ResourceKey>>,
}

/// Removes a key from the in-flight set when the refresh ends, even by panic.
struct InFlightGuard<F: Fetcher> {
    shared: Arc<Shared<F>>,
    key: ResourceKey,
}

impl<F: Fetcher> Drop for InFlightGuard<F> {
    fn drop(&mut self) {
        mutex_lock(&self.shared.in_flight, SOURCE, "in_flight.remove").remove(&self.key);
    }
}

/// Decides per read whether to serve cached data, serve and refresh, or fetch.
///
/// At most one background refresh per key runs at a time; reads that arrive
/// while one is running serve the pre-refresh value and schedule nothing.
pub struct Coordinator<F: Fetcher> {
    shared: Arc<Shared<F>>,
}

impl<F: Fetcher> Clone for Coordinator<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: Fetcher> Coordinator<F> {
    pub fn new(
        store: Arc<CacheStore<F::Value>>,
        fetcher: Arc<F>,
        views: Arc<ViewRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                fetcher,
                views,
                clock,
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore<F::Value>> {
        &self.shared.store
    }

    pub fn views(&self) -> &Arc<ViewRegistry> {
        &self.shared.views
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    /// Resolve a key to a value.
    ///
    /// Staleness never blocks: an existing entry is returned at once and, when
    /// stale or `force_refetch` is set, refreshed in the background. Without an
    /// entry, `initial` seeds the store; otherwise the call waits for a fetch.
    /// Only that blocking fetch can fail.
    pub async fn resolve(
        &self,
        key: &ResourceKey,
        initial: Option<F::Value>,
        force_refetch: bool,
    ) -> std::result::Result<Resolved<F::Value>, SyncError> {
        let shared = &self.shared;

        if shared.views.is_forced(key) {
            debug!(%key, "Fetching invalidated resource");
            let value = self.fetch_blocking(key).await?;
            shared.views.clear_forced(key);
            return Ok(Resolved {
                value,
                source: ServedFrom::Remote,
                refresh_triggered: false,
                refresh: None,
            });
        }

        let now = shared.clock.now();

        if let Some(entry) = shared.store.get(key, now) {
            let stale = shared.store.policies().is_stale(&entry, now);
            let refresh = if stale || force_refetch {
                Self::spawn_refresh(shared, key.clone())
            } else {
                None
            };
            debug!(
                %key,
                stale,
                force_refetch,
                refresh_triggered = refresh.is_some(),
                "Serving cached resource"
            );
            return Ok(Resolved {
                value: entry.value,
                source: ServedFrom::Cache,
                refresh_triggered: refresh.is_some(),
                refresh,
            });
        }

        if let Some(value) = initial {
            shared.store.put(key.clone(), value.clone(), now);
            let refresh = if force_refetch {
                Self::spawn_refresh(shared, key.clone())
            } else {
                None
            };
            debug!(%key, "Seeded cache with caller-supplied value");
            return Ok(Resolved {
                value,
                source: ServedFrom::Seed,
                refresh_triggered: refresh.is_some(),
                refresh,
            });
        }

        let value = self.fetch_blocking(key).await?;
        Ok(Resolved {
            value,
            source: ServedFrom::Remote,
            refresh_triggered: false,
            refresh: None,
        })
    }

    /// Refresh a key in the background regardless of its freshness.
    ///
    /// Returns None when a refresh for the key is already running.
    pub fn revalidate(&self, key: &ResourceKey) -> Option<RefreshHandle> {
        Self::spawn_refresh(&self.shared, key.clone())
    }

    /// Read the cached value without fetching or scheduling anything.
    pub fn peek(&self, key: &ResourceKey) -> Option<F::Value> {
        self.shared
            .store
            .get(key, self.shared.clock.now())
            .map(|entry| entry.value)
    }

    /// Check whether a background refresh for the key is running.
    pub fn is_refreshing(&self, key: &ResourceKey) -> bool {
        mutex_lock(&self.shared.in_flight, SOURCE, "is_refreshing").contains(key)
    }

    async fn fetch_blocking(
        &self,
        key: &ResourceKey,
    ) -> std::result::Result<F::Value, SyncError> {
        let shared = &self.shared;
        let generation = shared.store.generation(key);

        match shared.fetcher.fetch(key).await {
            Ok(value) => {
                let stored = shared.store.put_if_generation(
                    key.clone(),
                    value.clone(),
                    shared.clock.now(),
                    generation,
                );
                debug!(%key, stored, "Fetched resource");
                Ok(value)
            }
            Err(source) => {
                warn!(%key, error = %source, "Initial fetch failed");
                Err(SyncError::InitialFetch {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    fn spawn_refresh(shared: &Arc<Shared<F>>, key: ResourceKey) -> Option<RefreshHandle> {
        if !mutex_lock(&shared.in_flight, SOURCE, "in_flight.insert").insert(key.clone()) {
            debug!(%key, "Refresh already in flight");
            return None;
        }

        // Read before fetching so an invalidation during the fetch wins.
        let generation = shared.store.generation(&key);
        let guard = InFlightGuard {
            shared: Arc::clone(shared),
            key,
        };

        Some(RefreshHandle(tokio::spawn(async move {
            let stored = Self::run_refresh(&guard.shared, &guard.key, generation).await;
            drop(guard);
            stored
        })))
    }

    async fn run_refresh(shared: &Shared<F>, key: &ResourceKey, generation: u64) -> bool {
        match shared.fetcher.fetch(key).await {
            Ok(value) => {
                let stored = shared.store.put_if_generation(
                    key.clone(),
                    value,
                    shared.clock.now(),
                    generation,
                );
                if stored {
                    debug!(%key, "Background refresh stored");
                } else {
                    debug!(%key, "Background refresh dropped: key invalidated meanwhile");
                }
                stored
            }
            Err(err) => {
                warn!(%key, error = %err, "Background refresh failed; keeping cached value");
                false
            }
        }
    }
}
