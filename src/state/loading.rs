// View load state.
// Maps resolve outcomes onto what a consuming view shows, and holds paginated lists.

use crate::cache::Resolved;
use crate::error::SyncError;

/// Loading state for async data.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadingState<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    Error(String),
}

impl<T> LoadingState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadingState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadingState::Loaded(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadingState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    /// Start a load. Loaded data stays visible while it is revalidated.
    pub fn begin(&mut self) {
        if !self.is_loaded() {
            *self = LoadingState::Loading;
        }
    }

    /// Apply the outcome of a resolve.
    ///
    /// An error replaces the state only when nothing was loaded; a view
    /// that already shows data keeps showing it.
    pub fn apply(&mut self, outcome: Result<Resolved<T>, SyncError>) {
        match outcome {
            Ok(resolved) => *self = LoadingState::Loaded(resolved.value),
            Err(err) => {
                if !self.is_loaded() {
                    *self = LoadingState::Error(err.to_string());
                }
            }
        }
    }
}

/// Paginated list data.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedList<T> {
    pub items: Vec<T>,
    /// Total matching items on the remote, from a separate count query.
    pub total_count: u64,
    pub current_page: u32,
    pub has_more: bool,
}

impl<T> Default for PaginatedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            current_page: 1,
            has_more: false,
        }
    }
}

impl<T> PaginatedList<T> {
    pub fn new(items: Vec<T>, total_count: u64) -> Self {
        Self::page(items, total_count, 1, 0)
    }

    /// A single page, given how many items came before it.
    pub fn page(items: Vec<T>, total_count: u64, current_page: u32, preceding: usize) -> Self {
        let has_more = preceding + items.len() < total_count as usize;
        Self {
            items,
            total_count,
            current_page,
            has_more,
        }
    }

    pub fn append(&mut self, mut items: Vec<T>, total_count: u64) {
        self.items.append(&mut items);
        self.total_count = total_count;
        self.current_page += 1;
        self.has_more = self.items.len() < total_count as usize;
    }

    /// Same page metadata with the items replaced.
    pub fn with_items<U>(&self, items: Vec<U>) -> PaginatedList<U> {
        PaginatedList {
            items,
            total_count: self.total_count,
            current_page: self.current_page,
            has_more: self.has_more,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ResourceKey, ServedFrom};
    use crate::error::ShoalError;

    fn ok(value: u32) -> Result<Resolved<u32>, SyncError> {
        Ok(Resolved {
            value,
            source: ServedFrom::Cache,
            refresh_triggered: false,
            refresh: None,
        })
    }

    fn failed() -> Result<Resolved<u32>, SyncError> {
        Err(SyncError::InitialFetch {
            key: ResourceKey::readme("octo", "hello"),
            source: ShoalError::Unauthorized,
        })
    }

    #[test]
    fn test_error_shown_without_prior_data() {
        let mut state = LoadingState::Idle;
        state.begin();
        assert!(state.is_loading());

        state.apply(failed());
        assert!(matches!(state, LoadingState::Error(_)));
    }

    #[test]
    fn test_loaded_view_keeps_value_on_error() {
        let mut state = LoadingState::Idle;
        state.apply(ok(3));

        state.begin();
        assert_eq!(state.data(), Some(&3));

        state.apply(failed());
        assert_eq!(state, LoadingState::Loaded(3));
    }

    #[test]
    fn test_paginated_list() {
        let mut list = PaginatedList::new(vec![1, 2], 5);
        assert!(list.has_more);

        list.append(vec![3, 4, 5], 5);
        assert_eq!(list.len(), 5);
        assert_eq!(list.current_page, 2);
        assert!(!list.has_more);
    }

    #[test]
    fn test_later_page_has_more() {
        let page = PaginatedList::page(vec![31, 32], 32, 2, 30);
        assert!(!page.has_more);

        let mapped = page.with_items(vec!["a"]);
        assert_eq!(mapped.total_count, 32);
        assert_eq!(mapped.current_page, 2);
    }
}
