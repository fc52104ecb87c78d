// Cached resource payloads.
// One variant per resource type, as stored in the cache and returned to views.

use crate::github::{
    CommitSummary, DiscussionComment, FileContent, PullRequest, Repository, Tree,
};
use crate::state::PaginatedList;

/// Data that seeds the repository landing view.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoPageData {
    pub repository: Repository,
    pub recent_commits: Vec<CommitSummary>,
}

/// Open and closed pull requests, each page counted by its own query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PullRequestListing {
    pub open: PaginatedList<PullRequest>,
    pub closed: PaginatedList<PullRequest>,
}

/// A cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    DiscussionComments(Vec<DiscussionComment>),
    Readme(String),
    Tree(Tree),
    PageData(Box<RepoPageData>),
    File(FileContent),
    PullRequests(PullRequestListing),
    Commits(Vec<CommitSummary>),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::DiscussionComments(_) => "discussion_comments",
            Resource::Readme(_) => "readme",
            Resource::Tree(_) => "tree",
            Resource::PageData(_) => "page_data",
            Resource::File(_) => "file",
            Resource::PullRequests(_) => "pull_requests",
            Resource::Commits(_) => "commits",
        }
    }

    pub fn into_discussion_comments(self) -> Option<Vec<DiscussionComment>> {
        match self {
            Resource::DiscussionComments(comments) => Some(comments),
            _ => None,
        }
    }

    pub fn into_readme(self) -> Option<String> {
        match self {
            Resource::Readme(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_tree(self) -> Option<Tree> {
        match self {
            Resource::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn into_page_data(self) -> Option<RepoPageData> {
        match self {
            Resource::PageData(data) => Some(*data),
            _ => None,
        }
    }

    pub fn into_file(self) -> Option<FileContent> {
        match self {
            Resource::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn into_pull_requests(self) -> Option<PullRequestListing> {
        match self {
            Resource::PullRequests(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn into_commits(self) -> Option<Vec<CommitSummary>> {
        match self {
            Resource::Commits(commits) => Some(commits),
            _ => None,
        }
    }
}
