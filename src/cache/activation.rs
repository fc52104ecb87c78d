// Proactive revalidation on view activation.
// Refreshes the resources that seed a view's first render, once per activation.

use std::sync::Mutex;

use futures::future::join_all;
use tracing::debug;

use super::coordinator::{Coordinator, Fetcher, RefreshHandle};
use super::keys::{RepoScope, ResourceKey};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::activation";

/// Activation guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    #[default]
    Idle,
    Activated,
}

/// Refreshes started by one activation.
///
/// Dropping the batch leaves the refreshes running.
#[derive(Debug)]
pub struct RevalidationBatch {
    keys: Vec<ResourceKey>,
    handles: Vec<RefreshHandle>,
}

impl RevalidationBatch {
    /// Keys this activation asked to revalidate.
    pub fn keys(&self) -> &[ResourceKey] {
        &self.keys
    }

    /// Number of refreshes this activation started.
    pub fn started(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every refresh. Returns how many stored a new value.
    pub async fn join(self) -> usize {
        join_all(self.handles.into_iter().map(RefreshHandle::finished))
            .await
            .into_iter()
            .filter(|stored| *stored)
            .count()
    }
}

#[derive(Debug, Default)]
struct Guard {
    state: ActivationState,
    activations: u64,
    keys: Vec<ResourceKey>,
}

/// Fires the seed-resource refreshes for one view.
///
/// `Idle -> Activated` on the first activation signal; further signals are
/// ignored until `deactivate` returns the guard to `Idle`.
pub struct ProactiveRevalidator<F: Fetcher> {
    coordinator: Coordinator<F>,
    guard: Mutex<Guard>,
}

impl<F: Fetcher> ProactiveRevalidator<F> {
    pub fn new(coordinator: Coordinator<F>) -> Self {
        Self {
            coordinator,
            guard: Mutex::new(Guard::default()),
        }
    }

    pub fn state(&self) -> ActivationState {
        mutex_lock(&self.guard, SOURCE, "state").state
    }

    /// Keys refreshed on activation: page data and the default branch tree,
    /// limited to types whose policy asks for it.
    pub fn revalidation_set(&self, scope: &RepoScope, is_initial: bool) -> Vec<ResourceKey> {
        let policies = self.coordinator.store().policies();
        [
            ResourceKey::repo_page_data(&scope.owner, &scope.repo),
            ResourceKey::repo_tree(&scope.owner, &scope.repo, &scope.default_branch),
        ]
        .into_iter()
        .filter(|key| policies.should_force_refetch(key.resource_type(), is_initial))
        .collect()
    }

    /// Handle an activation signal.
    ///
    /// Returns None when the view is already activated. Refreshes run
    /// concurrently; their failures are logged by the coordinator and never
    /// retried within this activation.
    pub fn activate(&self, scope: &RepoScope) -> Option<RevalidationBatch> {
        let keys = {
            let mut guard = mutex_lock(&self.guard, SOURCE, "activate");
            if guard.state == ActivationState::Activated {
                debug!(
                    owner = %scope.owner,
                    repo = %scope.repo,
                    "Activation ignored: already active"
                );
                return None;
            }
            let keys = self.revalidation_set(scope, guard.activations == 0);
            guard.state = ActivationState::Activated;
            guard.activations += 1;
            guard.keys = keys.clone();
            keys
        };

        self.coordinator.views().attach(&keys);

        let handles: Vec<RefreshHandle> = keys
            .iter()
            .filter_map(|key| self.coordinator.revalidate(key))
            .collect();

        debug!(
            owner = %scope.owner,
            repo = %scope.repo,
            requested = keys.len(),
            started = handles.len(),
            "Proactive revalidation fired"
        );

        Some(RevalidationBatch { keys, handles })
    }

    /// Handle a deactivation signal. Returns false if the view was idle.
    pub fn deactivate(&self) -> bool {
        let keys = {
            let mut guard = mutex_lock(&self.guard, SOURCE, "deactivate");
            if guard.state == ActivationState::Idle {
                return false;
            }
            guard.state = ActivationState::Idle;
            std::mem::take(&mut guard.keys)
        };
        self.coordinator.views().detach(&keys);
        true
    }

    /// Record that the view renders `key`.
    ///
    /// Returns true when this is the key's first read in the current
    /// activation and its policy asks for a refetch on activation. Keys
    /// outside the seed set are attached to the view until it deactivates.
    pub fn mount(&self, key: &ResourceKey) -> bool {
        let is_initial = {
            let mut guard = mutex_lock(&self.guard, SOURCE, "mount");
            if guard.state == ActivationState::Idle || guard.keys.contains(key) {
                return false;
            }
            guard.keys.push(key.clone());
            guard.activations == 1
        };

        self.coordinator.views().attach([key]);
        let force = self
            .coordinator
            .store()
            .policies()
            .should_force_refetch(key.resource_type(), is_initial);
        debug!(%key, force, "Mounted resource");
        force
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::keys::ResourceType;
    use crate::cache::policy::{FreshnessPolicy, Lifetime, PolicyTable};
    use crate::cache::store::CacheStore;
    use crate::cache::testing::{FakeFetcher, at};
    use crate::cache::views::ViewRegistry;

    fn scope() -> RepoScope {
        RepoScope::new("octo", "hello", "main")
    }

    fn setup(
        policies: PolicyTable,
    ) -> (ProactiveRevalidator<FakeFetcher<u32>>, Arc<FakeFetcher<u32>>) {
        let fetcher = Arc::new(FakeFetcher::new());
        let coordinator = Coordinator::new(
            Arc::new(CacheStore::new(policies)),
            fetcher.clone(),
            Arc::new(ViewRegistry::new()),
            Arc::new(ManualClock::new(at(0))),
        );
        (ProactiveRevalidator::new(coordinator), fetcher)
    }

    #[tokio::test]
    async fn test_activation_refreshes_seed_set() {
        let (trigger, fetcher) = setup(PolicyTable::new());
        let page = ResourceKey::repo_page_data("octo", "hello");
        let tree = ResourceKey::repo_tree("octo", "hello", "main");
        fetcher.respond(&page, 1);
        fetcher.respond(&tree, 2);

        let batch = trigger.activate(&scope()).unwrap();
        assert_eq!(batch.keys(), &[page.clone(), tree.clone()]);
        assert_eq!(batch.join().await, 2);

        assert_eq!(trigger.coordinator.peek(&page), Some(1));
        assert_eq!(trigger.coordinator.peek(&tree), Some(2));
    }

    #[tokio::test]
    async fn test_double_activation_fires_once() {
        let (trigger, fetcher) = setup(PolicyTable::new());

        let batch = trigger.activate(&scope()).unwrap();
        assert!(trigger.activate(&scope()).is_none());
        batch.join().await;

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(trigger.state(), ActivationState::Activated);
    }

    #[tokio::test]
    async fn test_reactivation_after_deactivate() {
        let (trigger, fetcher) = setup(PolicyTable::new());

        trigger.activate(&scope()).unwrap().join().await;
        assert!(trigger.deactivate());
        assert_eq!(trigger.state(), ActivationState::Idle);
        assert!(!trigger.deactivate());

        trigger.activate(&scope()).unwrap().join().await;
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_failures_are_discarded() {
        let (trigger, fetcher) = setup(PolicyTable::new());
        let page = ResourceKey::repo_page_data("octo", "hello");
        fetcher.fail(&page);

        let batch = trigger.activate(&scope()).unwrap();
        assert_eq!(batch.join().await, 0);
        assert!(trigger.coordinator.peek(&page).is_none());
        // No retry within the activation.
        assert_eq!(fetcher.calls_for(&page), 1);
    }

    #[tokio::test]
    async fn test_policy_filters_set() {
        let policies = PolicyTable::new().with(
            ResourceType::RepoTree,
            FreshnessPolicy::new(Lifetime::Forever, Lifetime::Forever, false),
        );
        let (trigger, _) = setup(policies);

        let batch = trigger.activate(&scope()).unwrap();
        assert_eq!(batch.keys(), &[ResourceKey::repo_page_data("octo", "hello")]);
    }

    #[tokio::test]
    async fn test_activation_attaches_views() {
        let (trigger, _) = setup(PolicyTable::new());
        let tree = ResourceKey::repo_tree("octo", "hello", "main");

        trigger.activate(&scope()).unwrap().join().await;
        assert!(trigger.coordinator.views().is_rendered(&tree));

        trigger.deactivate();
        assert!(!trigger.coordinator.views().is_rendered(&tree));
    }

    #[tokio::test]
    async fn test_mount_forces_once_per_activation() {
        let (trigger, _) = setup(PolicyTable::new());
        let readme = ResourceKey::readme("octo", "hello");
        let comments = ResourceKey::discussion_comments("octo", "hello", 7);

        assert!(!trigger.mount(&readme));

        trigger.activate(&scope()).unwrap();
        assert!(trigger.mount(&readme));
        assert!(!trigger.mount(&readme));
        assert!(!trigger.mount(&comments));
        assert!(trigger.coordinator.views().is_rendered(&readme));

        trigger.deactivate();
        assert!(!trigger.coordinator.views().is_rendered(&readme));

        trigger.activate(&scope()).unwrap();
        assert!(trigger.mount(&readme));
    }

    #[tokio::test]
    async fn test_mount_skips_seed_set() {
        let (trigger, _) = setup(PolicyTable::new());
        trigger.activate(&scope()).unwrap();
        // Already revalidated by the activation itself.
        assert!(!trigger.mount(&ResourceKey::repo_tree("octo", "hello", "main")));
    }
}
