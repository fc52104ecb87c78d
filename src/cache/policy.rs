// Freshness policies.
// Per-resource-type rules for staleness, eviction, and refetch-on-activate.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::keys::ResourceType;
use super::store::CacheEntry;

/// Default freshness window for mutable data (comments, file contents): 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default eviction window for unused entries: 10 minutes.
pub const DEFAULT_EVICT: Duration = Duration::from_secs(10 * 60);

/// A finite duration or forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Finite(Duration),
    Forever,
}

impl Lifetime {
    /// Whether `elapsed` has run past this lifetime.
    ///
    /// A finite zero lifetime has always elapsed.
    pub fn exceeded_by(&self, elapsed: Duration) -> bool {
        match self {
            Lifetime::Forever => false,
            Lifetime::Finite(limit) => limit.is_zero() || elapsed > *limit,
        }
    }

    /// The instant this lifetime ends when started at `start`.
    pub fn end_from(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Lifetime::Forever => None,
            Lifetime::Finite(limit) => chrono::Duration::from_std(*limit)
                .ok()
                .and_then(|limit| start.checked_add_signed(limit)),
        }
    }

    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) => Lifetime::Finite(Duration::from_secs(secs)),
            None => Lifetime::Forever,
        }
    }
}

/// Time elapsed between two instants, clamped at zero.
pub(crate) fn elapsed_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    later
        .signed_duration_since(earlier)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Freshness rule for one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// How long a fetched value counts as fresh.
    pub stale_after: Lifetime,
    /// How long an unused entry may stay in the store.
    pub evict_after: Lifetime,
    /// Refetch whenever the consuming view activates, even if fresh.
    pub refetch_on_activate: bool,
}

impl FreshnessPolicy {
    pub const fn new(
        stale_after: Lifetime,
        evict_after: Lifetime,
        refetch_on_activate: bool,
    ) -> Self {
        Self {
            stale_after,
            evict_after,
            refetch_on_activate,
        }
    }

    /// Content considered immutable once fetched, refreshed only on activation.
    pub const fn immutable() -> Self {
        Self::new(Lifetime::Forever, Lifetime::Forever, true)
    }

    /// Check whether a value fetched at `fetched_at` is stale at `now`.
    pub fn is_stale_at(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.stale_after.exceeded_by(elapsed_between(fetched_at, now))
    }

    /// Check whether an entry last used at `last_accessed` may be evicted at `now`.
    pub fn is_evictable_at(&self, last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.evict_after {
            Lifetime::Forever => false,
            Lifetime::Finite(limit) => elapsed_between(last_accessed, now) > limit,
        }
    }

    /// Built-in policy for a resource type.
    pub fn default_for(resource_type: ResourceType) -> Self {
        let minute = Duration::from_secs(60);
        match resource_type {
            ResourceType::DiscussionComments => Self::new(
                Lifetime::Finite(DEFAULT_TTL),
                Lifetime::Finite(DEFAULT_EVICT),
                false,
            ),
            ResourceType::Readme => Self::immutable(),
            ResourceType::RepoPageData | ResourceType::RepoTree => Self::new(
                Lifetime::Finite(minute),
                Lifetime::Finite(DEFAULT_EVICT),
                true,
            ),
            ResourceType::FileContent | ResourceType::CommitHistory => Self::new(
                Lifetime::Finite(DEFAULT_TTL),
                Lifetime::Finite(DEFAULT_EVICT),
                false,
            ),
            ResourceType::PullRequests => Self::new(
                Lifetime::Finite(minute),
                Lifetime::Finite(DEFAULT_TTL),
                false,
            ),
        }
    }
}

/// Freshness policies for every resource type.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<ResourceType, FreshnessPolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            policies: ResourceType::ALL
                .into_iter()
                .map(|ty| (ty, FreshnessPolicy::default_for(ty)))
                .collect(),
        }
    }
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the policy for one resource type.
    pub fn with(mut self, resource_type: ResourceType, policy: FreshnessPolicy) -> Self {
        self.set(resource_type, policy);
        self
    }

    pub fn set(&mut self, resource_type: ResourceType, policy: FreshnessPolicy) {
        self.policies.insert(resource_type, policy);
    }

    /// Policy for a resource type.
    pub fn get(&self, resource_type: ResourceType) -> FreshnessPolicy {
        self.policies
            .get(&resource_type)
            .copied()
            .unwrap_or_else(|| FreshnessPolicy::default_for(resource_type))
    }

    /// Check whether an entry is stale at `now` under its own policy.
    pub fn is_stale<V>(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        entry.policy.is_stale_at(entry.fetched_at, now)
    }

    /// Whether a view activation must refetch this type regardless of age.
    ///
    /// Applies to the initial activation and to every re-activation alike.
    pub fn should_force_refetch(
        &self,
        resource_type: ResourceType,
        _is_initial_activation: bool,
    ) -> bool {
        self.get(resource_type).refetch_on_activate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::ResourceKey;
    use crate::cache::store::CacheStore;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_stale_after_window() {
        let policy = FreshnessPolicy::default_for(ResourceType::DiscussionComments);
        let fetched = at(0);

        assert!(!policy.is_stale_at(fetched, at(60)));
        assert!(!policy.is_stale_at(fetched, at(300)));
        assert!(policy.is_stale_at(fetched, at(301)));
    }

    #[test]
    fn test_immutable_never_stale() {
        let policy = FreshnessPolicy::default_for(ResourceType::Readme);

        assert!(!policy.is_stale_at(at(0), at(10 * 365 * 24 * 3600)));
        assert!(!policy.is_evictable_at(at(0), at(10 * 365 * 24 * 3600)));
        assert!(policy.refetch_on_activate);
    }

    #[test]
    fn test_zero_ttl_always_stale() {
        let policy = FreshnessPolicy::new(
            Lifetime::Finite(Duration::ZERO),
            Lifetime::Forever,
            false,
        );
        assert!(policy.is_stale_at(at(0), at(0)));
    }

    #[test]
    fn test_eviction_window() {
        let policy = FreshnessPolicy::default_for(ResourceType::DiscussionComments);
        assert!(!policy.is_evictable_at(at(0), at(600)));
        assert!(policy.is_evictable_at(at(0), at(601)));
    }

    #[test]
    fn test_clock_skew_is_not_stale() {
        let policy = FreshnessPolicy::default_for(ResourceType::FileContent);
        assert!(!policy.is_stale_at(at(100), at(0)));
    }

    #[test]
    fn test_force_refetch_follows_policy() {
        let table = PolicyTable::new();
        assert!(table.should_force_refetch(ResourceType::Readme, true));
        assert!(table.should_force_refetch(ResourceType::RepoTree, false));
        assert!(!table.should_force_refetch(ResourceType::DiscussionComments, true));
    }

    #[test]
    fn test_table_override() {
        let table =
            PolicyTable::new().with(ResourceType::FileContent, FreshnessPolicy::immutable());
        assert_eq!(table.get(ResourceType::FileContent), FreshnessPolicy::immutable());
    }

    #[test]
    fn test_entry_staleness() {
        let store = CacheStore::new(PolicyTable::new());
        let comments = ResourceKey::discussion_comments("octo", "hello", 1);
        let readme = ResourceKey::readme("octo", "hello");
        store.put(comments.clone(), "c", at(0));
        store.put(readme.clone(), "r", at(0));

        let table = store.policies();
        let entry = store.get(&comments, at(300)).unwrap();
        assert!(!table.is_stale(&entry, at(300)));
        assert!(table.is_stale(&entry, at(301)));

        let entry = store.get(&readme, at(400)).unwrap();
        assert!(!table.is_stale(&entry, at(10 * 365 * 24 * 3600)));
    }

    #[test]
    fn test_lifetime_end() {
        let end = Lifetime::Finite(Duration::from_secs(30)).end_from(at(0));
        assert_eq!(end, Some(at(30)));
        assert_eq!(Lifetime::Forever.end_from(at(0)), None);
    }
}
