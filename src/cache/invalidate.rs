// Mutation invalidation.
// Removes cache entries a successful write has made incorrect.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use super::keys::{RepoScope, ResourceKey};
use super::store::CacheStore;
use super::views::ViewRegistry;

/// Outcome of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Keys whose entries were removed.
    pub removed: Vec<ResourceKey>,
    /// Keys that had no entry.
    pub noop: Vec<ResourceKey>,
    /// Keys flagged so their active view fetches on next read.
    pub forced: Vec<ResourceKey>,
}

impl InvalidationReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.forced.is_empty()
    }
}

/// Removes entries affected by a write.
pub struct MutationInvalidator<V> {
    store: Arc<CacheStore<V>>,
    views: Arc<ViewRegistry>,
}

impl<V: Clone> MutationInvalidator<V> {
    pub fn new(store: Arc<CacheStore<V>>, views: Arc<ViewRegistry>) -> Self {
        Self { store, views }
    }

    /// Remove every affected entry, regardless of its freshness.
    ///
    /// Keys rendered by an active view are also flagged so the view's next
    /// read fetches instead of serving a reseeded value. Missing entries are
    /// counted as no-ops.
    pub fn invalidate(&self, affected: &HashSet<ResourceKey>) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        for key in affected {
            if self.store.remove(key) {
                report.removed.push(key.clone());
            } else {
                debug!(%key, "Invalidation no-op: no cached entry");
                report.noop.push(key.clone());
            }

            if self.views.is_rendered(key) {
                self.views.mark_forced(key.clone());
                report.forced.push(key.clone());
            }
        }

        info!(
            removed = report.removed.len(),
            noop = report.noop.len(),
            forced = report.forced.len(),
            "Invalidated cache after mutation"
        );
        report
    }
}

/// Keys whose cached values a commit to `path` on `reference` makes stale.
pub fn affected_keys_for_commit(
    scope: &RepoScope,
    path: &str,
    reference: &str,
) -> HashSet<ResourceKey> {
    let owner = scope.owner.as_str();
    let repo = scope.repo.as_str();
    let path = path.trim_start_matches('/');

    let mut keys = HashSet::from([
        ResourceKey::file_content(owner, repo, path, reference),
        ResourceKey::repo_tree(owner, repo, &scope.default_branch),
        ResourceKey::repo_tree(owner, repo, reference),
        ResourceKey::commit_history(owner, repo, reference, 1),
        ResourceKey::repo_page_data(owner, repo),
    ]);

    if reference == scope.default_branch && is_top_level_readme(path) {
        keys.insert(ResourceKey::readme(owner, repo));
    }

    keys
}

fn is_top_level_readme(path: &str) -> bool {
    !path.contains('/') && path.to_ascii_lowercase().starts_with("readme")
}
