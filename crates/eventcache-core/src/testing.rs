//! Fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiError, RemoteApi};
use crate::cache::{StorageEstimate, StorageEstimator};
use crate::models::ContentRecord;
use crate::store::{ContentStore, IndexQuery, StoreError};

/// Always reports the same usage.
pub struct FixedEstimator(StorageEstimate);

impl FixedEstimator {
    pub fn new(usage: u64, quota: u64) -> Self {
        Self(StorageEstimate { usage, quota })
    }
}

#[async_trait]
impl StorageEstimator for FixedEstimator {
    async fn estimate(&self) -> Option<StorageEstimate> {
        Some(self.0)
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Unavailable("disk full".to_string())
}

#[async_trait]
impl ContentStore for FailingStore {
    async fn put(&self, _record: ContentRecord) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn get(&self, _id: &str) -> Result<Option<ContentRecord>, StoreError> {
        Err(unavailable())
    }

    async fn get_all_by_index(&self, _query: IndexQuery) -> Result<Vec<ContentRecord>, StoreError> {
        Err(unavailable())
    }

    async fn get_all(&self) -> Result<Vec<ContentRecord>, StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Err(unavailable())
    }
}

/// Remote API with canned responses.
///
/// `submit` outcomes are consumed in order; once the script runs out every
/// submission succeeds. `fetch` serves from a path map and 404s otherwise.
#[derive(Default)]
pub struct ScriptedApi {
    submit_outcomes: Mutex<VecDeque<bool>>,
    content: Mutex<HashMap<String, Value>>,
    submitted: Mutex<Vec<(String, Value)>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `count` failing submissions.
    pub fn fail_next(self, count: usize) -> Self {
        self.submit_outcomes
            .lock()
            .unwrap()
            .extend(std::iter::repeat(false).take(count));
        self
    }

    pub fn serve(self, path: &str, body: Value) -> Self {
        self.content.lock().unwrap().insert(path.to_string(), body);
        self
    }

    pub fn submitted(&self) -> Vec<(String, Value)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteApi for ScriptedApi {
    async fn fetch(&self, path: &str) -> Result<Value, ApiError> {
        self.fetched.lock().unwrap().push(path.to_string());
        self.content
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(path.to_string()))
    }

    async fn submit(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        let ok = self.submit_outcomes.lock().unwrap().pop_front().unwrap_or(true);
        if !ok {
            return Err(ApiError::ServerError("scripted failure".to_string()));
        }
        self.submitted
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        Ok(())
    }
}
