// Stats enrichment.
// Merges separately computed per-item statistics into an ordered list without refetching it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde_json::{Map, Value};

use crate::github::{PullRequest, PullRequestStats};
use crate::resource::PullRequestListing;

/// An item that can be matched against a stats mapping.
pub trait StatsKeyed {
    type Key: Eq + Hash;

    fn stats_key(&self) -> Option<Self::Key>;
}

/// An item that can absorb a stats record.
pub trait MergeStats<S> {
    /// Shallow union of `self` and `stats`; stats win on collision.
    fn merge_stats(&self, stats: &S) -> Self;
}

/// Enrich each item that has an entry in `stats`.
///
/// Order and length are preserved; items without stats are returned unchanged.
pub fn enrich<T, S>(base: &[T], stats: &HashMap<T::Key, S>) -> Vec<T>
where
    T: StatsKeyed + MergeStats<S> + Clone,
{
    base.iter()
        .map(|item| {
            match item.stats_key().and_then(|key| stats.get(&key)) {
                Some(stats) => item.merge_stats(stats),
                None => item.clone(),
            }
        })
        .collect()
}

impl StatsKeyed for PullRequest {
    type Key = u64;

    fn stats_key(&self) -> Option<u64> {
        Some(self.number)
    }
}

impl MergeStats<PullRequestStats> for PullRequest {
    fn merge_stats(&self, stats: &PullRequestStats) -> Self {
        PullRequest {
            changed_files: Some(stats.changed_files),
            additions: Some(stats.additions),
            deletions: Some(stats.deletions),
            commits: Some(stats.commits),
            review_comments: Some(stats.review_comments),
            ..self.clone()
        }
    }
}

/// JSON objects are keyed by their `number` field.
impl StatsKeyed for Value {
    type Key = u64;

    fn stats_key(&self) -> Option<u64> {
        self.get("number").and_then(Value::as_u64)
    }
}

impl MergeStats<Map<String, Value>> for Value {
    fn merge_stats(&self, stats: &Map<String, Value>) -> Self {
        match self {
            Value::Object(fields) => {
                let mut merged = fields.clone();
                merged.extend(stats.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(merged)
            }
            other => other.clone(),
        }
    }
}

/// Numbers of every pull request in the listing, de-duplicated, open first.
pub fn stats_keys(listing: &PullRequestListing) -> Vec<u64> {
    let mut seen = HashSet::new();
    listing
        .open
        .items
        .iter()
        .chain(listing.closed.items.iter())
        .map(|pull| pull.number)
        .filter(|number| seen.insert(*number))
        .collect()
}

/// Enrich the open and closed pages separately, keeping their counts.
pub fn enrich_listing(
    listing: &PullRequestListing,
    stats: &HashMap<u64, PullRequestStats>,
) -> PullRequestListing {
    PullRequestListing {
        open: listing.open.with_items(enrich(&listing.open.items, stats)),
        closed: listing.closed.with_items(enrich(&listing.closed.items, stats)),
    }
}
