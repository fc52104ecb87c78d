// GitHub API endpoint functions.
// Provides typed methods for fetching and writing repository data through the REST API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::error::{Result, ShoalError};

use super::client::GitHubClient;
use super::types::{
    CommitOutcome, CommitRequest, CommitSummary, ContentResponse, DiscussionComment, FileContent,
    PullRequest, PullRequestState, Repository, SearchCount, Tree,
};

/// Request body for the contents write endpoint.
#[derive(Debug, Serialize)]
struct ContentsWrite<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Decode a base64 contents response into text.
pub(crate) fn decode_content(response: ContentResponse) -> Result<FileContent> {
    let text = match (response.encoding.as_deref(), response.content) {
        (Some("base64"), Some(content)) => {
            // GitHub wraps the payload at 60 columns.
            let compact: String = content.split_whitespace().collect();
            let bytes = STANDARD.decode(compact)?;
            String::from_utf8(bytes)
                .map_err(|_| ShoalError::Other(format!("{} is not UTF-8 text", response.path)))?
        }
        (Some("none"), _) | (_, None) => {
            return Err(ShoalError::Other(format!(
                "{} is too large for the contents API",
                response.path
            )));
        }
        (_, Some(content)) => content,
    };

    Ok(FileContent {
        path: response.path,
        sha: response.sha,
        size: response.size,
        text,
    })
}

/// Encode a path for use in a URL, keeping the separators.
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl GitHubClient {
    /// Get a specific repository.
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository> {
        let response = self.get(&format!("/repos/{}/{}", owner, repo)).await?;
        let repository: Repository = response.json().await?;
        Ok(repository)
    }

    /// Get the repository README as text.
    pub async fn get_readme(&self, owner: &str, repo: &str) -> Result<String> {
        let response = self.get(&format!("/repos/{}/{}/readme", owner, repo)).await?;
        let content: ContentResponse = response.json().await?;
        Ok(decode_content(content)?.text)
    }

    /// Get the recursive tree of a branch.
    pub async fn get_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<Tree> {
        let params = [("recursive", "1")];
        let response = self
            .get_with_params(
                &format!("/repos/{}/{}/git/trees/{}", owner, repo, encode_path(branch)),
                &params,
            )
            .await?;
        let tree: Tree = response.json().await?;
        Ok(tree)
    }

    /// Get a file at a ref.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<FileContent> {
        let params = [("ref", reference)];
        let response = self
            .get_with_params(
                &format!("/repos/{}/{}/contents/{}", owner, repo, encode_path(path)),
                &params,
            )
            .await?;
        let content: ContentResponse = response.json().await?;
        decode_content(content)
    }

    /// Get comments on an issue or pull request thread.
    pub async fn get_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<DiscussionComment>> {
        let params = [
            ("page", &page.to_string()),
            ("per_page", &per_page.to_string()),
        ];
        let response = self
            .get_with_params(
                &format!("/repos/{}/{}/issues/{}/comments", owner, repo, number),
                &params,
            )
            .await?;
        let comments: Vec<DiscussionComment> = response.json().await?;
        Ok(comments)
    }

    /// Get one page of pull requests in a state.
    pub async fn get_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: PullRequestState,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequest>> {
        let page = page.to_string();
        let per_page = per_page.to_string();
        let params = [
            ("state", state.as_str()),
            ("sort", "updated"),
            ("direction", "desc"),
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
        ];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/pulls", owner, repo), &params)
            .await?;
        let pulls: Vec<PullRequest> = response.json().await?;
        Ok(pulls)
    }

    /// Count pull requests in a state through the search API.
    pub async fn count_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: PullRequestState,
    ) -> Result<u64> {
        let query = format!("repo:{}/{} is:pr is:{}", owner, repo, state.as_str());
        let params = [("q", query.as_str()), ("per_page", "1")];
        let response = self.get_with_params("/search/issues", &params).await?;
        let count: SearchCount = response.json().await?;
        Ok(count.total_count)
    }

    /// Get a single pull request, including its aggregate stats.
    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest> {
        let response = self
            .get(&format!("/repos/{}/{}/pulls/{}", owner, repo, number))
            .await?;
        let pull: PullRequest = response.json().await?;
        Ok(pull)
    }

    /// Get commit history of a ref.
    pub async fn get_commits(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<CommitSummary>> {
        let page = page.to_string();
        let per_page = per_page.to_string();
        let params = [
            ("sha", reference),
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
        ];
        let response = self
            .get_with_params(&format!("/repos/{}/{}/commits", owner, repo), &params)
            .await?;
        let commits: Vec<CommitSummary> = response.json().await?;
        Ok(commits)
    }

    /// Create or update a file in a single commit.
    pub async fn put_file_contents(&self, request: &CommitRequest) -> Result<CommitOutcome> {
        let body = ContentsWrite {
            message: &request.message,
            content: STANDARD.encode(request.content.as_bytes()),
            branch: request.target_branch(),
            sha: request.sha.as_deref(),
        };
        let response = self
            .put_json(
                &format!(
                    "/repos/{}/{}/contents/{}",
                    request.scope.owner,
                    request.scope.repo,
                    encode_path(&request.path)
                ),
                &body,
            )
            .await?;
        let outcome: CommitOutcome = response.json().await?;
        Ok(outcome)
    }
}
