// shoal: cache and revalidation layer for remote repository data.
// Serves cached values at once, refreshes them in the background, and invalidates after writes.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod github;
pub mod resource;
pub mod state;
pub mod sync;

pub use cache::{RepoScope, Resolved, ResourceKey, ServedFrom};
pub use config::SyncConfig;
pub use error::{Result, ShoalError, SyncError};
pub use resource::Resource;
pub use sync::{Committed, RepoSync};
