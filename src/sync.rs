// Repository sync facade.
// Wires the cache layer and per-view activation triggers around one remote source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::lock::mutex_lock;
use crate::cache::{
    CacheStore, Clock, Coordinator, InvalidationReport, MutationInvalidator, PolicyTable,
    ProactiveRevalidator, RepoScope, Resolved, ResourceKey, RevalidationBatch, SystemClock,
    ViewRegistry, affected_keys_for_commit, spawn_sweeper,
};
use crate::config::SyncConfig;
use crate::error::{self, SyncError};
use crate::github::{
    CommitOutcome, CommitRequest, CommitSummary, DiscussionComment, FileContent, GitHubClient,
    GitHubSource, RemoteSource, Tree,
};
use crate::resource::{PullRequestListing, RepoPageData, Resource};

const SOURCE: &str = "sync";

type SyncResult<T> = std::result::Result<T, SyncError>;
type Triggers<S> = HashMap<String, Arc<ProactiveRevalidator<S>>>;

/// A committed write and the cache entries it invalidated.
#[derive(Debug)]
pub struct Committed {
    pub outcome: CommitOutcome,
    pub invalidated: InvalidationReport,
}

/// Cached, revalidating access to one remote source.
pub struct RepoSync<S: RemoteSource> {
    source: Arc<S>,
    store: Arc<CacheStore<Resource>>,
    views: Arc<ViewRegistry>,
    coordinator: Coordinator<S>,
    invalidator: MutationInvalidator<Resource>,
    triggers: Mutex<Triggers<S>>,
    sweep_interval: Duration,
}

impl RepoSync<GitHubSource> {
    /// Build a GitHub-backed instance from configuration.
    ///
    /// The token is read from `config.token_env`.
    pub fn connect(config: &SyncConfig) -> error::Result<Self> {
        let client = GitHubClient::from_env(&config.token_env, &config.api_base)?;
        let source = GitHubSource::new(Arc::new(client), config.per_page);
        Ok(Self::new(
            Arc::new(source),
            config.policy_table(),
            Arc::new(SystemClock),
        )
        .with_sweep_interval(config.sweep_interval()))
    }
}

impl<S: RemoteSource> RepoSync<S> {
    pub fn new(source: Arc<S>, policies: PolicyTable, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(CacheStore::new(policies));
        let views = Arc::new(ViewRegistry::new());
        let coordinator = Coordinator::new(
            Arc::clone(&store),
            Arc::clone(&source),
            Arc::clone(&views),
            clock,
        );
        let invalidator = MutationInvalidator::new(Arc::clone(&store), Arc::clone(&views));

        Self {
            source,
            store,
            views,
            coordinator,
            invalidator,
            triggers: Mutex::new(HashMap::new()),
            sweep_interval: SyncConfig::default().sweep_interval(),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn store(&self) -> &Arc<CacheStore<Resource>> {
        &self.store
    }

    pub fn views(&self) -> &Arc<ViewRegistry> {
        &self.views
    }

    pub fn coordinator(&self) -> &Coordinator<S> {
        &self.coordinator
    }

    /// Start the periodic idle-entry sweep.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            Arc::clone(&self.store),
            self.sweep_interval,
            Arc::clone(self.coordinator.clock()),
        )
    }

    /// Resolve a key outside any view. See [`Coordinator::resolve`].
    pub async fn read(
        &self,
        key: &ResourceKey,
        initial: Option<Resource>,
    ) -> SyncResult<Resolved<Resource>> {
        self.coordinator.resolve(key, initial, false).await
    }

    /// Resolve a key rendered by a view.
    ///
    /// The view's first read of a key after each activation refetches it
    /// in the background when its policy sets `refetch_on_activate`.
    pub async fn read_in_view(
        &self,
        view_id: &str,
        key: &ResourceKey,
        initial: Option<Resource>,
    ) -> SyncResult<Resolved<Resource>> {
        let trigger = self.lock_triggers("read_in_view").get(view_id).cloned();
        let force_refetch = trigger.is_some_and(|trigger| trigger.mount(key));
        self.coordinator.resolve(key, initial, force_refetch).await
    }

    pub async fn readme(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
    ) -> SyncResult<Resolved<String>> {
        let key = ResourceKey::readme(owner, repo);
        let resolved = self.read_in_view(view_id, &key, None).await?;
        narrow(&key, resolved, Resource::into_readme)
    }

    pub async fn tree(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> SyncResult<Resolved<Tree>> {
        let key = ResourceKey::repo_tree(owner, repo, branch);
        let resolved = self.read_in_view(view_id, &key, None).await?;
        narrow(&key, resolved, Resource::into_tree)
    }

    pub async fn file_content(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> SyncResult<Resolved<FileContent>> {
        let key = ResourceKey::file_content(owner, repo, path, reference);
        let resolved = self.read_in_view(view_id, &key, None).await?;
        narrow(&key, resolved, Resource::into_file)
    }

    pub async fn discussion_comments(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> SyncResult<Resolved<Vec<DiscussionComment>>> {
        let key = ResourceKey::discussion_comments(owner, repo, number);
        let resolved = self.read_in_view(view_id, &key, None).await?;
        narrow(&key, resolved, Resource::into_discussion_comments)
    }

    pub async fn pull_requests(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> SyncResult<Resolved<PullRequestListing>> {
        let key = ResourceKey::pull_requests(owner, repo, page);
        let resolved = self.read_in_view(view_id, &key, None).await?;
        narrow(&key, resolved, Resource::into_pull_requests)
    }

    pub async fn commits(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
        reference: &str,
        page: u32,
    ) -> SyncResult<Resolved<Vec<CommitSummary>>> {
        let key = ResourceKey::commit_history(owner, repo, reference, page);
        let resolved = self.read_in_view(view_id, &key, None).await?;
        narrow(&key, resolved, Resource::into_commits)
    }

    /// Landing view data, seeded from `initial` when nothing is cached.
    pub async fn page_data(
        &self,
        view_id: &str,
        owner: &str,
        repo: &str,
        initial: Option<RepoPageData>,
    ) -> SyncResult<Resolved<RepoPageData>> {
        let key = ResourceKey::repo_page_data(owner, repo);
        let initial = initial.map(|data| Resource::PageData(Box::new(data)));
        let resolved = self.read_in_view(view_id, &key, initial).await?;
        narrow(&key, resolved, Resource::into_page_data)
    }

    /// Deliver an activation signal for a view.
    ///
    /// Returns None when the view is already active.
    pub fn activate_view(&self, view_id: &str, scope: &RepoScope) -> Option<RevalidationBatch> {
        let trigger = {
            let mut triggers = self.lock_triggers("activate_view");
            let trigger = triggers.entry(view_id.to_string()).or_insert_with(|| {
                Arc::new(ProactiveRevalidator::new(self.coordinator.clone()))
            });
            Arc::clone(trigger)
        };
        trigger.activate(scope)
    }

    /// Deliver a deactivation signal. Returns false if the view was not active.
    pub fn deactivate_view(&self, view_id: &str) -> bool {
        let trigger = self.lock_triggers("deactivate_view").get(view_id).cloned();
        trigger.is_some_and(|trigger| trigger.deactivate())
    }

    /// Commit a file write, then invalidate every entry it affects.
    ///
    /// Invalidation completes before this returns, so the next read of an
    /// affected key fetches. A rejected write invalidates nothing.
    pub async fn commit_file(&self, request: &CommitRequest) -> SyncResult<Committed> {
        if request.path.trim().trim_matches('/').is_empty() {
            return Err(SyncError::InvalidRequest("file path is empty".to_string()));
        }
        if request.message.trim().is_empty() {
            return Err(SyncError::InvalidRequest(
                "commit message is empty".to_string(),
            ));
        }

        let outcome = self.source.commit(request).await.map_err(|source| {
            warn!(path = %request.path, error = %source, "Commit rejected");
            SyncError::Mutation { source }
        })?;

        let affected =
            affected_keys_for_commit(&request.scope, &request.path, request.target_branch());
        let invalidated = self.invalidator.invalidate(&affected);

        info!(
            owner = %request.scope.owner,
            repo = %request.scope.repo,
            path = %request.path,
            commit = %outcome.commit.sha,
            "Committed file"
        );

        Ok(Committed {
            outcome,
            invalidated,
        })
    }

    fn lock_triggers(&self, op: &'static str) -> MutexGuard<'_, Triggers<S>> {
        mutex_lock(&self.triggers, SOURCE, op)
    }
}

/// Unwrap the payload of a resolved resource, keeping its provenance.
fn narrow<T>(
    key: &ResourceKey,
    resolved: Resolved<Resource>,
    into: fn(Resource) -> Option<T>,
) -> SyncResult<Resolved<T>> {
    let Resolved {
        value,
        source,
        refresh_triggered,
        refresh,
    } = resolved;
    let kind = value.kind();
    match into(value) {
        Some(value) => Ok(Resolved {
            value,
            source,
            refresh_triggered,
            refresh,
        }),
        None => Err(SyncError::UnexpectedResource {
            key: key.clone(),
            kind,
        }),
    }
}
