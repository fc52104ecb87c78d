// Test doubles for the cache layer.
// Scripted fetchers and clocks shared by the unit tests of every cache module.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::error::{Result, ShoalError};

use super::coordinator::Fetcher;
use super::keys::ResourceKey;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

/// Fetcher that replays scripted responses per key and records every call.
pub(crate) struct FakeFetcher<V> {
    responses: Mutex<HashMap<ResourceKey, VecDeque<Result<V>>>>,
    calls: Mutex<Vec<ResourceKey>>,
    gate: Option<Arc<Semaphore>>,
}

impl<V> FakeFetcher<V> {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every fetch waits for `release` before answering.
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub(crate) fn respond(&self, key: &ResourceKey, value: V) {
        self.push(key, Ok(value));
    }

    pub(crate) fn fail(&self, key: &ResourceKey) {
        self.push(key, Err(ShoalError::Other("remote unavailable".to_string())));
    }

    fn push(&self, key: &ResourceKey, result: Result<V>) {
        self.responses
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push_back(result);
    }

    pub(crate) fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_for(&self, key: &ResourceKey) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl<V> Fetcher for FakeFetcher<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    async fn fetch(&self, key: &ResourceKey) -> Result<V> {
        self.calls.lock().unwrap().push(key.clone());
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.responses
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ShoalError::NotFound(key.to_string())))
    }
}
