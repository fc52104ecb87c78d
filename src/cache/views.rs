// Active view tracking.
// Records which keys are rendered by mounted views and which must be refetched on next read.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::keys::ResourceKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::views";

#[derive(Debug, Default)]
struct Inner {
    // Reference count per key; several views may render the same resource.
    rendered: HashMap<ResourceKey, usize>,
    forced: HashSet<ResourceKey>,
}

/// Registry of keys rendered by currently active views.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    inner: Mutex<Inner>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark keys as rendered by a newly active view.
    pub fn attach<'a>(&self, keys: impl IntoIterator<Item = &'a ResourceKey>) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "attach");
        for key in keys {
            *inner.rendered.entry(key.clone()).or_insert(0) += 1;
        }
    }

    /// Release keys when a view deactivates.
    pub fn detach<'a>(&self, keys: impl IntoIterator<Item = &'a ResourceKey>) {
        let mut inner = mutex_lock(&self.inner, SOURCE, "detach");
        for key in keys {
            if let Some(count) = inner.rendered.get_mut(key) {
                *count -= 1;
                if *count == 0 {
                    inner.rendered.remove(key);
                }
            }
        }
    }

    /// Check whether any active view renders this key.
    pub fn is_rendered(&self, key: &ResourceKey) -> bool {
        mutex_lock(&self.inner, SOURCE, "is_rendered")
            .rendered
            .contains_key(key)
    }

    /// Require the next read of `key` to fetch from the remote.
    pub fn mark_forced(&self, key: ResourceKey) {
        mutex_lock(&self.inner, SOURCE, "mark_forced")
            .forced
            .insert(key);
    }

    pub fn is_forced(&self, key: &ResourceKey) -> bool {
        mutex_lock(&self.inner, SOURCE, "is_forced")
            .forced
            .contains(key)
    }

    /// Clear a forced-fetch flag once a fresh value is stored.
    pub fn clear_forced(&self, key: &ResourceKey) {
        mutex_lock(&self.inner, SOURCE, "clear_forced")
            .forced
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_detach_refcounts() {
        let registry = ViewRegistry::new();
        let key = ResourceKey::repo_tree("octo", "hello", "main");

        registry.attach([&key]);
        registry.attach([&key]);
        assert!(registry.is_rendered(&key));

        registry.detach([&key]);
        assert!(registry.is_rendered(&key));

        registry.detach([&key]);
        assert!(!registry.is_rendered(&key));

        // Extra detach is harmless.
        registry.detach([&key]);
        assert!(!registry.is_rendered(&key));
    }

    #[test]
    fn test_forced_flag() {
        let registry = ViewRegistry::new();
        let key = ResourceKey::readme("octo", "hello");

        assert!(!registry.is_forced(&key));
        registry.mark_forced(key.clone());
        assert!(registry.is_forced(&key));
        registry.clear_forced(&key);
        assert!(!registry.is_forced(&key));
    }
}
