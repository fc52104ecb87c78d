// GitHub API response types.
// Defines structs for deserializing GitHub REST API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::RepoScope;

/// Owner type discriminator (user or organization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OwnerType {
    #[default]
    User,
    Organization,
    Bot,
    #[serde(other)]
    Unknown,
}

/// GitHub user or organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: u64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub owner_type: OwnerType,
    pub avatar_url: Option<String>,
}

/// GitHub repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    pub private: bool,
    pub description: Option<String>,
    pub default_branch: String,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Git tree object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEntryKind {
    Blob,
    Tree,
    Commit,
    #[serde(other)]
    Unknown,
}

/// One entry of a recursive git tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
    pub sha: String,
    pub size: Option<u64>,
}

/// Directory tree of a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub sha: String,
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// Raw response of the contents endpoint for a file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentResponse {
    pub path: String,
    pub sha: String,
    pub size: u64,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Decoded file at a ref.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    /// Blob SHA, required when committing an update to this file.
    pub sha: String,
    pub size: u64,
    pub text: String,
}

/// A comment on an issue or pull request thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionComment {
    pub id: u64,
    pub user: Option<Owner>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

/// Git reference (branch/commit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

/// Pull request state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Closed,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestState::Open => "open",
            PullRequestState::Closed => "closed",
        }
    }
}

/// Pull request as returned by list and detail endpoints.
///
/// The aggregate fields are only present on the detail endpoint; list
/// entries get them through enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: PullRequestState,
    pub user: Option<Owner>,
    #[serde(default)]
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub html_url: String,
    pub head: GitRef,
    pub base: GitRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_comments: Option<u64>,
}

/// Aggregate statistics of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestStats {
    pub changed_files: u64,
    pub additions: u64,
    pub deletions: u64,
    pub commits: u64,
    pub review_comments: u64,
}

impl PullRequestStats {
    /// Extract stats from a pull request detail response.
    pub fn from_detail(pull: &PullRequest) -> Option<Self> {
        Some(Self {
            changed_files: pull.changed_files?,
            additions: pull.additions?,
            deletions: pull.deletions?,
            commits: pull.commits?,
            review_comments: pull.review_comments.unwrap_or(0),
        })
    }
}

/// Commit author/committer signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

/// Git commit data inside a commit listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<Signature>,
}

/// Entry of a commit history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub commit: CommitDetail,
    pub author: Option<Owner>,
    pub html_url: String,
}

/// Content reference returned by a successful contents write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedContent {
    pub path: String,
    pub sha: String,
}

/// Commit reference returned by a successful contents write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    pub message: String,
    pub html_url: Option<String>,
}

/// Result of committing a file through the contents API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub content: Option<CommittedContent>,
    pub commit: CommitRef,
}

/// A file write to commit through the contents API.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRequest {
    pub scope: RepoScope,
    pub path: String,
    /// Target branch; the default branch when absent.
    pub branch: Option<String>,
    pub message: String,
    /// New file text.
    pub content: String,
    /// Blob SHA of the file being replaced; absent when creating it.
    pub sha: Option<String>,
}

impl CommitRequest {
    /// Branch the commit lands on.
    pub fn target_branch(&self) -> &str {
        self.branch.as_deref().unwrap_or(&self.scope.default_branch)
    }
}

/// Search response used only for its count.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchCount {
    pub total_count: u64,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_json(extra: &str) -> String {
        format!(
            r#"{{
                "number": 12,
                "title": "Add sweeper",
                "state": "open",
                "user": {{"id": 1, "login": "octocat", "type": "User", "avatar_url": null}},
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-02T10:00:00Z",
                "merged_at": null,
                "html_url": "https://github.com/octo/hello/pull/12",
                "head": {{"ref": "feature", "sha": "abc"}},
                "base": {{"ref": "main", "sha": "def"}}{}
            }}"#,
            extra
        )
    }

    #[test]
    fn test_list_entry_has_no_stats() {
        let pull: PullRequest = serde_json::from_str(&pull_json("")).unwrap();
        assert_eq!(pull.number, 12);
        assert_eq!(pull.head.ref_name, "feature");
        assert!(pull.changed_files.is_none());
        assert!(PullRequestStats::from_detail(&pull).is_none());
    }

    #[test]
    fn test_detail_stats() {
        let json = pull_json(concat!(
            r#", "changed_files": 3, "additions": 40, "deletions": 2,"#,
            r#" "commits": 1, "review_comments": 5"#,
        ));
        let pull: PullRequest = serde_json::from_str(&json).unwrap();
        let stats = PullRequestStats::from_detail(&pull).unwrap();
        assert_eq!(stats.changed_files, 3);
        assert_eq!(stats.review_comments, 5);
    }

    #[test]
    fn test_unknown_tree_kind() {
        let entry: TreeEntry = serde_json::from_str(
            r#"{"path": "x", "mode": "100644", "type": "symlink", "sha": "1", "size": null}"#,
        )
        .unwrap();
        assert_eq!(entry.kind, TreeEntryKind::Unknown);
    }
}
