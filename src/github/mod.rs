// GitHub API module.
// Provides the client, typed endpoints, and the resource source used by the cache.

pub mod client;
pub mod endpoints;
pub mod source;
pub mod types;

pub use client::GitHubClient;
pub use source::{GitHubSource, RemoteSource};
pub use types::*;
