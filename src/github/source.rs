// Remote source backed by the GitHub REST API.
// Maps resource keys onto endpoint calls and commits file writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tracing::{debug, warn};

use crate::cache::{Fetcher, ResourceKey};
use crate::enrich::{enrich_listing, stats_keys};
use crate::error::Result;
use crate::resource::{PullRequestListing, RepoPageData, Resource};
use crate::state::PaginatedList;

use super::client::GitHubClient;
use super::types::{CommitOutcome, CommitRequest, PullRequest, PullRequestState, PullRequestStats};

/// Concurrent detail requests when enriching a pull request page.
const STATS_CONCURRENCY: usize = 8;

/// A remote that can both serve resources and accept writes.
#[async_trait]
pub trait RemoteSource: Fetcher<Value = Resource> {
    /// Commit a file write. Nothing is invalidated here.
    async fn commit(&self, request: &CommitRequest) -> Result<CommitOutcome>;
}

/// Resource source over a shared GitHub client.
pub struct GitHubSource {
    client: Arc<GitHubClient>,
    per_page: u32,
}

impl GitHubSource {
    pub fn new(client: Arc<GitHubClient>, per_page: u32) -> Self {
        Self {
            client,
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn client(&self) -> &Arc<GitHubClient> {
        &self.client
    }

    async fn page_data(&self, owner: &str, repo: &str) -> Result<RepoPageData> {
        let repository = self.client.get_repo(owner, repo).await?;
        let recent_commits = self
            .client
            .get_commits(owner, repo, &repository.default_branch, 1, self.per_page)
            .await?;
        Ok(RepoPageData {
            repository,
            recent_commits,
        })
    }

    /// One page of open and closed pull requests with their counts, then
    /// enriched with per-item stats from the detail endpoint.
    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<PullRequestListing> {
        let client = &self.client;
        let (open, closed, open_total, closed_total) = futures::try_join!(
            client.get_pull_requests(owner, repo, PullRequestState::Open, page, self.per_page),
            client.get_pull_requests(owner, repo, PullRequestState::Closed, page, self.per_page),
            client.count_pull_requests(owner, repo, PullRequestState::Open),
            client.count_pull_requests(owner, repo, PullRequestState::Closed),
        )?;

        let preceding = page.saturating_sub(1) as usize * self.per_page as usize;
        let listing = PullRequestListing {
            open: PaginatedList::page(open, open_total, page, preceding),
            closed: PaginatedList::page(closed, closed_total, page, preceding),
        };

        let details: Vec<(u64, Result<PullRequest>)> = stream::iter(stats_keys(&listing))
            .map(|number| async move {
                (number, client.get_pull_request(owner, repo, number).await)
            })
            .buffer_unordered(STATS_CONCURRENCY)
            .collect()
            .await;

        let stats = collect_stats(details);
        debug!(
            owner,
            repo,
            page,
            open = listing.open.len(),
            closed = listing.closed.len(),
            enriched = stats.len(),
            "Fetched pull requests"
        );
        Ok(enrich_listing(&listing, &stats))
    }
}

/// Keep the stats of every detail that loaded; a failed detail leaves its
/// list entry unenriched.
fn collect_stats(details: Vec<(u64, Result<PullRequest>)>) -> HashMap<u64, PullRequestStats> {
    details
        .into_iter()
        .filter_map(|(number, detail)| match detail {
            Ok(pull) => PullRequestStats::from_detail(&pull).map(|stats| (number, stats)),
            Err(err) => {
                warn!(number, error = %err, "Pull request stats unavailable");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Fetcher for GitHubSource {
    type Value = Resource;

    async fn fetch(&self, key: &ResourceKey) -> Result<Resource> {
        let client = &self.client;
        let resource = match key {
            ResourceKey::DiscussionComments {
                owner,
                repo,
                number,
            } => Resource::DiscussionComments(
                client
                    .get_issue_comments(owner, repo, *number, 1, self.per_page)
                    .await?,
            ),
            ResourceKey::Readme { owner, repo } => {
                Resource::Readme(client.get_readme(owner, repo).await?)
            }
            ResourceKey::RepoTree {
                owner,
                repo,
                branch,
            } => Resource::Tree(client.get_tree(owner, repo, branch).await?),
            ResourceKey::RepoPageData { owner, repo } => {
                Resource::PageData(Box::new(self.page_data(owner, repo).await?))
            }
            ResourceKey::FileContent {
                owner,
                repo,
                path,
                reference,
            } => Resource::File(client.get_file_content(owner, repo, path, reference).await?),
            ResourceKey::PullRequests { owner, repo, page } => {
                Resource::PullRequests(self.pull_requests(owner, repo, *page).await?)
            }
            ResourceKey::CommitHistory {
                owner,
                repo,
                reference,
                page,
            } => Resource::Commits(
                client
                    .get_commits(owner, repo, reference, *page, self.per_page)
                    .await?,
            ),
        };
        Ok(resource)
    }
}

#[async_trait]
impl RemoteSource for GitHubSource {
    async fn commit(&self, request: &CommitRequest) -> Result<CommitOutcome> {
        self.client.put_file_contents(request).await
    }
}
