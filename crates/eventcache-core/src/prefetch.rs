//! Pulls the content the app cannot work without into the cache.
//!
//! On reconnect the schedule, speaker list and general content are fetched
//! in parallel and stored with fixed priorities and lifetimes. These three
//! content types are written by nothing else.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tracing::{info, warn};

use crate::api::RemoteApi;
use crate::cache::{ContentRepository, StoreOptions};
use crate::models::{ContentType, Priority};

/// One remote resource mirrored into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchTarget {
    pub content_type: ContentType,
    pub path: &'static str,
    pub priority: Priority,
    pub ttl_hours: i64,
}

pub static CRITICAL_DATA: [PrefetchTarget; 3] = [
    PrefetchTarget {
        content_type: ContentType::Schedule,
        path: "/api/schedule",
        priority: Priority::Critical,
        ttl_hours: 24,
    },
    PrefetchTarget {
        content_type: ContentType::Speakers,
        path: "/api/speakers",
        priority: Priority::High,
        ttl_hours: 24,
    },
    PrefetchTarget {
        content_type: ContentType::Content,
        path: "/api/content",
        priority: Priority::High,
        ttl_hours: 12,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub stored: Vec<ContentType>,
    pub failed: Vec<(ContentType, String)>,
}

pub struct CriticalDataPrefetcher {
    repo: Arc<ContentRepository>,
    api: Arc<dyn RemoteApi>,
}

impl CriticalDataPrefetcher {
    pub fn new(repo: Arc<ContentRepository>, api: Arc<dyn RemoteApi>) -> Self {
        Self { repo, api }
    }

    /// Fetch and store every critical resource. A failure on one target
    /// does not stop the others.
    pub async fn prefetch(&self) -> PrefetchReport {
        let fetches = CRITICAL_DATA.iter().map(|target| async move {
            (target, self.api.fetch(target.path).await)
        });
        let results = join_all(fetches).await;

        let mut report = PrefetchReport::default();
        for (target, result) in results {
            let outcome = match result {
                Ok(payload) => {
                    let options = StoreOptions::default()
                        .priority(target.priority)
                        .expires_in(Duration::hours(target.ttl_hours));
                    self.repo
                        .store_content(target.content_type.as_str(), target.content_type, &payload, options)
                        .await
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(()) => report.stored.push(target.content_type),
                Err(e) => {
                    warn!(content_type = %target.content_type, error = %e, "Prefetch failed");
                    report.failed.push((target.content_type, e));
                }
            }
        }

        info!(stored = report.stored.len(), failed = report.failed.len(), "Critical data prefetch complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_prefetch_stores_with_fixed_priorities() {
        let repo = Arc::new(ContentRepository::new(Arc::new(MemoryStore::new())));
        let api = Arc::new(
            ScriptedApi::new()
                .serve("/api/schedule", json!([{"slot": "9:00"}]))
                .serve("/api/speakers", json!([{"name": "Grace"}]))
                .serve("/api/content", json!({"banner": "Welcome"})),
        );

        let report = CriticalDataPrefetcher::new(repo.clone(), api).prefetch().await;
        assert_eq!(report.stored.len(), 3);

        let schedule = repo.get_record("schedule").await.unwrap().unwrap();
        assert_eq!(schedule.priority, Priority::Critical);
        assert_eq!(schedule.expires_at, Some(schedule.created_at + Duration::hours(24)));

        let content = repo.get_record("content").await.unwrap().unwrap();
        assert_eq!(content.priority, Priority::High);
        assert_eq!(content.expires_at, Some(content.created_at + Duration::hours(12)));

        assert_eq!(
            repo.get_content_by_type(ContentType::Speakers).await.unwrap(),
            vec![json!([{"name": "Grace"}])]
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_rest() {
        let repo = Arc::new(ContentRepository::new(Arc::new(MemoryStore::new())));
        let api = Arc::new(ScriptedApi::new().serve("/api/schedule", json!([])));

        let report = CriticalDataPrefetcher::new(repo.clone(), api.clone()).prefetch().await;

        assert_eq!(report.stored, vec![ContentType::Schedule]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(api.fetched().len(), 3);
        assert!(repo.get_content("schedule").await.unwrap().is_some());
    }
}
