// In-memory cache store.
// Holds entries keyed by resource key, with fetch timestamps and eviction accounting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::Clock;
use super::keys::ResourceKey;
use super::lock::mutex_lock;
use super::policy::{FreshnessPolicy, PolicyTable};

const SOURCE: &str = "cache::store";

/// A cached value with its metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Most recently fetched payload.
    pub value: V,
    /// When the payload was fetched.
    pub fetched_at: DateTime<Utc>,
    /// When the entry was last read or written.
    pub last_accessed: DateTime<Utc>,
    /// Policy for the key's resource type.
    pub policy: FreshnessPolicy,
    /// When the payload turns stale, if ever.
    pub expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, now: DateTime<Utc>, policy: FreshnessPolicy) -> Self {
        Self {
            value,
            fetched_at: now,
            last_accessed: now,
            expires_at: policy.stale_after.end_from(now),
            policy,
        }
    }

    fn is_evictable(&self, now: DateTime<Utc>) -> bool {
        self.policy.is_evictable_at(self.last_accessed, now)
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<ResourceKey, CacheEntry<V>>,
    // Bumped on every removal so writes started before it can be dropped.
    generations: HashMap<ResourceKey, u64>,
}

/// Shared cache of fetched resources.
///
/// All mutation goes through one mutex, so a reader sees either the old
/// entry or the new one, never a partial update.
#[derive(Debug)]
pub struct CacheStore<V> {
    policies: PolicyTable,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> CacheStore<V> {
    /// Create an empty store using the given policies.
    pub fn new(policies: PolicyTable) -> Self {
        Self {
            policies,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                generations: HashMap::new(),
            }),
        }
    }

    /// Policies this store applies to new entries.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Look up an entry, recording the access.
    ///
    /// An entry unused beyond its eviction window is dropped here and reported absent.
    pub fn get(&self, key: &ResourceKey, now: DateTime<Utc>) -> Option<CacheEntry<V>> {
        let mut inner = mutex_lock(&self.inner, SOURCE, "get");
        let evict = inner.entries.get(key)?.is_evictable(now);
        if evict {
            inner.entries.remove(key);
            debug!(%key, "Evicted idle cache entry on access");
            return None;
        }
        let entry = inner.entries.get_mut(key)?;
        entry.last_accessed = now;
        Some(entry.clone())
    }

    /// Store a freshly fetched value, replacing any existing entry.
    pub fn put(&self, key: ResourceKey, value: V, now: DateTime<Utc>) {
        let policy = self.policies.get(key.resource_type());
        let mut inner = mutex_lock(&self.inner, SOURCE, "put");
        inner.entries.insert(key, CacheEntry::new(value, now, policy));
    }

    /// Store a value only if the key has not been removed since `generation` was read.
    ///
    /// Returns false when the write was dropped.
    pub fn put_if_generation(
        &self,
        key: ResourceKey,
        value: V,
        now: DateTime<Utc>,
        generation: u64,
    ) -> bool {
        let policy = self.policies.get(key.resource_type());
        let mut inner = mutex_lock(&self.inner, SOURCE, "put_if_generation");
        let current = inner.generations.get(&key).copied().unwrap_or(0);
        if current != generation {
            return false;
        }
        inner.entries.insert(key, CacheEntry::new(value, now, policy));
        true
    }

    /// Current removal generation of a key.
    pub fn generation(&self, key: &ResourceKey) -> u64 {
        mutex_lock(&self.inner, SOURCE, "generation")
            .generations
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Remove an entry. Returns true if one existed.
    pub fn remove(&self, key: &ResourceKey) -> bool {
        let mut inner = mutex_lock(&self.inner, SOURCE, "remove");
        *inner.generations.entry(key.clone()).or_insert(0) += 1;
        inner.entries.remove(key).is_some()
    }

    /// Remove every entry unused beyond its eviction window. Returns the count removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut inner = mutex_lock(&self.inner, SOURCE, "sweep");
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_evictable(now));
        before - inner.entries.len()
    }

    /// Check for an entry without recording an access.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        mutex_lock(&self.inner, SOURCE, "contains")
            .entries
            .contains_key(key)
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        mutex_lock(&self.inner, SOURCE, "len").entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "clear");
        let keys: Vec<ResourceKey> = inner.entries.keys().cloned().collect();
        for key in keys {
            *inner.generations.entry(key).or_insert(0) += 1;
        }
        inner.entries.clear();
    }
}

/// Run `sweep` on a fixed interval until the returned task is aborted.
pub fn spawn_sweeper<V>(
    store: Arc<CacheStore<V>>,
    interval: Duration,
    clock: Arc<dyn Clock>,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep(clock.now());
            if removed > 0 {
                info!(removed, remaining = store.len(), "Swept idle cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::keys::ResourceType;
    use crate::cache::policy::Lifetime;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn comments(n: u64) -> ResourceKey {
        ResourceKey::discussion_comments("octo", "hello", n)
    }

    #[test]
    fn test_put_and_get() {
        let store = CacheStore::new(PolicyTable::new());
        assert!(store.get(&comments(1), at(0)).is_none());

        store.put(comments(1), vec!["first".to_string()], at(0));

        let entry = store.get(&comments(1), at(10)).unwrap();
        assert_eq!(entry.value, vec!["first".to_string()]);
        assert_eq!(entry.fetched_at, at(0));
        assert_eq!(entry.last_accessed, at(10));
        assert_eq!(entry.expires_at, Some(at(300)));
    }

    #[test]
    fn test_get_does_not_touch_fetched_at() {
        let store = CacheStore::new(PolicyTable::new());
        store.put(comments(1), 1u32, at(0));
        store.get(&comments(1), at(100));
        let entry = store.get(&comments(1), at(200)).unwrap();
        assert_eq!(entry.fetched_at, at(0));
        assert_eq!(entry.value, 1);
    }

    #[test]
    fn test_put_overwrites() {
        let store = CacheStore::new(PolicyTable::new());
        store.put(comments(1), "old", at(0));
        store.put(comments(1), "new", at(50));

        let entry = store.get(&comments(1), at(60)).unwrap();
        assert_eq!(entry.value, "new");
        assert_eq!(entry.fetched_at, at(50));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = CacheStore::new(PolicyTable::new());
        store.put(comments(1), "a", at(0));

        assert!(store.remove(&comments(1)));
        assert!(!store.remove(&comments(1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_uses_last_access() {
        let store = CacheStore::new(PolicyTable::new());
        store.put(comments(1), "a", at(0));
        store.put(comments(2), "b", at(0));
        store.put(ResourceKey::readme("octo", "hello"), "readme", at(0));

        // Keep comments(2) warm.
        store.get(&comments(2), at(500));

        let removed = store.sweep(at(700));
        assert_eq!(removed, 1);
        assert!(!store.contains(&comments(1)));
        assert!(store.contains(&comments(2)));
        // Readme never evicts.
        assert!(store.contains(&ResourceKey::readme("octo", "hello")));
    }

    #[test]
    fn test_lazy_eviction_on_get() {
        let store = CacheStore::new(PolicyTable::new());
        store.put(comments(1), "a", at(0));

        assert!(store.get(&comments(1), at(601)).is_none());
        assert!(!store.contains(&comments(1)));
    }

    #[test]
    fn test_put_if_generation_drops_after_remove() {
        let store = CacheStore::new(PolicyTable::new());
        store.put(comments(1), "old", at(0));

        let generation = store.generation(&comments(1));
        store.remove(&comments(1));

        assert!(!store.put_if_generation(comments(1), "late", at(5), generation));
        assert!(!store.contains(&comments(1)));

        let generation = store.generation(&comments(1));
        assert!(store.put_if_generation(comments(1), "fresh", at(6), generation));
        assert_eq!(store.get(&comments(1), at(7)).unwrap().value, "fresh");
    }

    #[test]
    fn test_entry_policy_from_table() {
        let policies = PolicyTable::new().with(
            ResourceType::DiscussionComments,
            FreshnessPolicy::new(Lifetime::Forever, Lifetime::Forever, false),
        );
        let store = CacheStore::new(policies);
        store.put(comments(1), "a", at(0));

        let entry = store.get(&comments(1), at(1_000_000)).unwrap();
        assert!(!store.policies().is_stale(&entry, at(1_000_000)));
        assert_eq!(entry.expires_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let store = Arc::new(CacheStore::new(PolicyTable::new()));
        store.put(comments(1), "a", at(0));

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(30), clock.clone());

        clock.advance(Duration::from_secs(700));
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(store.is_empty());
        handle.abort();
    }
}
