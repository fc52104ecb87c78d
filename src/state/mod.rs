// State management module.
// Load state and paginated lists for views consuming cached resources.

pub mod loading;

pub use loading::{LoadingState, PaginatedList};
