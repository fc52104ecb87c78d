// Resource key model.
// Canonical identity for cached repository data: a resource type plus its scope parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of remote resource, used to look up its freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    DiscussionComments,
    Readme,
    RepoTree,
    RepoPageData,
    FileContent,
    PullRequests,
    CommitHistory,
}

impl ResourceType {
    /// All resource types, in declaration order.
    pub const ALL: [ResourceType; 7] = [
        ResourceType::DiscussionComments,
        ResourceType::Readme,
        ResourceType::RepoTree,
        ResourceType::RepoPageData,
        ResourceType::FileContent,
        ResourceType::PullRequests,
        ResourceType::CommitHistory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::DiscussionComments => "discussion_comments",
            ResourceType::Readme => "readme",
            ResourceType::RepoTree => "repo_tree",
            ResourceType::RepoPageData => "repo_page_data",
            ResourceType::FileContent => "file_content",
            ResourceType::PullRequests => "pull_requests",
            ResourceType::CommitHistory => "commit_history",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one cached resource.
///
/// Two keys are equal iff their type and every scope parameter are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKey {
    /// Comment thread of an issue or pull request.
    DiscussionComments {
        owner: String,
        repo: String,
        number: u64,
    },
    /// Rendered long-form description of a repository.
    Readme { owner: String, repo: String },
    /// Recursive directory tree of a branch.
    RepoTree {
        owner: String,
        repo: String,
        branch: String,
    },
    /// Data used to seed the repository landing view.
    RepoPageData { owner: String, repo: String },
    /// A single file at a path and ref.
    FileContent {
        owner: String,
        repo: String,
        path: String,
        reference: String,
    },
    /// Open and closed pull requests, one page of each.
    PullRequests {
        owner: String,
        repo: String,
        page: u32,
    },
    /// Commit history of a ref.
    CommitHistory {
        owner: String,
        repo: String,
        reference: String,
        page: u32,
    },
}

impl ResourceKey {
    pub fn discussion_comments(owner: &str, repo: &str, number: u64) -> Self {
        ResourceKey::DiscussionComments {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        }
    }

    pub fn readme(owner: &str, repo: &str) -> Self {
        ResourceKey::Readme {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    pub fn repo_tree(owner: &str, repo: &str, branch: &str) -> Self {
        ResourceKey::RepoTree {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        }
    }

    pub fn repo_page_data(owner: &str, repo: &str) -> Self {
        ResourceKey::RepoPageData {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    pub fn file_content(owner: &str, repo: &str, path: &str, reference: &str) -> Self {
        ResourceKey::FileContent {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.trim_start_matches('/').to_string(),
            reference: reference.to_string(),
        }
    }

    pub fn pull_requests(owner: &str, repo: &str, page: u32) -> Self {
        ResourceKey::PullRequests {
            owner: owner.to_string(),
            repo: repo.to_string(),
            page,
        }
    }

    pub fn commit_history(owner: &str, repo: &str, reference: &str, page: u32) -> Self {
        ResourceKey::CommitHistory {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference: reference.to_string(),
            page,
        }
    }

    /// The resource type of this key.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceKey::DiscussionComments { .. } => ResourceType::DiscussionComments,
            ResourceKey::Readme { .. } => ResourceType::Readme,
            ResourceKey::RepoTree { .. } => ResourceType::RepoTree,
            ResourceKey::RepoPageData { .. } => ResourceType::RepoPageData,
            ResourceKey::FileContent { .. } => ResourceType::FileContent,
            ResourceKey::PullRequests { .. } => ResourceType::PullRequests,
            ResourceKey::CommitHistory { .. } => ResourceType::CommitHistory,
        }
    }

    /// Owner and repository this key is scoped to.
    pub fn repository(&self) -> (&str, &str) {
        match self {
            ResourceKey::DiscussionComments { owner, repo, .. }
            | ResourceKey::Readme { owner, repo }
            | ResourceKey::RepoTree { owner, repo, .. }
            | ResourceKey::RepoPageData { owner, repo }
            | ResourceKey::FileContent { owner, repo, .. }
            | ResourceKey::PullRequests { owner, repo, .. }
            | ResourceKey::CommitHistory { owner, repo, .. } => (owner, repo),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (owner, repo) = self.repository();
        write!(f, "{}:{}/{}", self.resource_type(), owner, repo)?;
        match self {
            ResourceKey::DiscussionComments { number, .. } => write!(f, "#{}", number),
            ResourceKey::RepoTree { branch, .. } => write!(f, "@{}", branch),
            ResourceKey::FileContent {
                path, reference, ..
            } => write!(f, "/{}@{}", path, reference),
            ResourceKey::PullRequests { page, .. } => write!(f, "?page={}", page),
            ResourceKey::CommitHistory {
                reference, page, ..
            } => write!(f, "@{}?page={}", reference, page),
            ResourceKey::Readme { .. } | ResourceKey::RepoPageData { .. } => Ok(()),
        }
    }
}

/// Owner, repository and default branch of a repository view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoScope {
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
}

impl RepoScope {
    pub fn new(owner: &str, repo: &str, default_branch: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            default_branch: default_branch.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_value_equality() {
        let a = ResourceKey::file_content("octo", "hello", "src/main.rs", "main");
        let b = ResourceKey::file_content("octo", "hello", "src/main.rs", "main");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_scope_params_distinguish_keys() {
        let main = ResourceKey::repo_tree("octo", "hello", "main");
        let dev = ResourceKey::repo_tree("octo", "hello", "dev");
        assert_ne!(main, dev);
        assert_ne!(
            ResourceKey::readme("octo", "hello"),
            ResourceKey::repo_page_data("octo", "hello")
        );
    }

    #[test]
    fn test_file_path_normalized() {
        assert_eq!(
            ResourceKey::file_content("octo", "hello", "/README.md", "main"),
            ResourceKey::file_content("octo", "hello", "README.md", "main")
        );
    }

    #[test]
    fn test_display() {
        let key = ResourceKey::discussion_comments("octo", "hello", 42);
        assert_eq!(key.to_string(), "discussion_comments:octo/hello#42");

        let key = ResourceKey::file_content("octo", "hello", "a/b.rs", "dev");
        assert_eq!(key.to_string(), "file_content:octo/hello/a/b.rs@dev");
    }

    #[test]
    fn test_resource_type_names_match_serde() {
        for ty in ResourceType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.name()));
        }
    }
}
