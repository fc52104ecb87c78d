// Cache module for repository data.
// Keys, freshness policies, the shared store, and the coordination built on top of it.

pub mod activation;
pub mod clock;
pub mod coordinator;
pub mod invalidate;
pub mod keys;
pub(crate) mod lock;
pub mod policy;
pub mod store;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use activation::{ActivationState, ProactiveRevalidator, RevalidationBatch};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{Coordinator, Fetcher, RefreshHandle, Resolved, ServedFrom};
pub use invalidate::{InvalidationReport, MutationInvalidator, affected_keys_for_commit};
pub use keys::{RepoScope, ResourceKey, ResourceType};
pub use policy::{DEFAULT_EVICT, DEFAULT_TTL, FreshnessPolicy, Lifetime, PolicyTable};
pub use store::{CacheEntry, CacheStore, spawn_sweeper};
pub use views::ViewRegistry;
