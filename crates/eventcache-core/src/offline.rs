//! The assembled cache: repository, sync queue and prefetcher over one store.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{ApiClient, RemoteApi};
use crate::cache::{ContentRepository, QuotaMonitor, StoreUsageEstimator};
use crate::config::Config;
use crate::error::CacheError;
use crate::prefetch::CriticalDataPrefetcher;
use crate::store::{ContentStore, FileStore};
use crate::sync::{ConnectivitySignal, SchedulerSettings, SyncQueue, SyncScheduler};

/// Buffer size for the connectivity signal channel.
const SIGNAL_BUFFER_SIZE: usize = 16;

/// One instance per application, built at startup and shared by `Arc`.
pub struct OfflineCache {
    repo: Arc<ContentRepository>,
    queue: Arc<SyncQueue>,
    prefetcher: Arc<CriticalDataPrefetcher>,
    scheduler_settings: SchedulerSettings,
}

impl OfflineCache {
    /// Open the file store and HTTP client described by `config`.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let dir = config.store_dir()?;
        let store = FileStore::open(&dir)
            .await
            .with_context(|| format!("Failed to open store at {}", dir.display()))?;
        let api = ApiClient::new(config.api_base_url.clone())?;
        Ok(Self::from_parts(Arc::new(store), Arc::new(api), config).await?)
    }

    /// Assemble around an existing store and API. Rebuilds the sync queue's
    /// working set before returning.
    pub async fn from_parts(
        store: Arc<dyn ContentStore>,
        api: Arc<dyn RemoteApi>,
        config: &Config,
    ) -> Result<Self, CacheError> {
        config.validate().map_err(CacheError::InvalidConfig)?;
        let estimator = StoreUsageEstimator::new(store.clone(), config.quota_bytes);
        let quota = QuotaMonitor::new(Arc::new(estimator))
            .with_cleanup_threshold(config.cleanup_threshold_percent);
        let repo = Arc::new(
            ContentRepository::new(store)
                .with_quota_monitor(quota)
                .with_eviction_policy(config.eviction_policy())
                .with_settings(config.repository_settings()),
        );
        let queue = Arc::new(SyncQueue::new(repo.clone(), api.clone()).with_retry_limit(config.retry_limit));
        let prefetcher = Arc::new(CriticalDataPrefetcher::new(repo.clone(), api));

        let pending = queue.initialize().await?;
        info!(pending = pending, "Offline cache ready");

        Ok(Self {
            repo,
            queue,
            prefetcher,
            scheduler_settings: config.scheduler_settings(),
        })
    }

    pub fn repository(&self) -> &Arc<ContentRepository> {
        &self.repo
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub fn prefetcher(&self) -> &Arc<CriticalDataPrefetcher> {
        &self.prefetcher
    }

    /// Start the background scheduler. Send connectivity transitions on the
    /// returned sender; dropping it stops the scheduler.
    pub fn start_background(&self, online: bool) -> (mpsc::Sender<ConnectivitySignal>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER_SIZE);
        let handle = SyncScheduler::new(self.queue.clone(), self.repo.clone(), self.scheduler_settings)
            .with_prefetcher(self.prefetcher.clone())
            .starting_online(online)
            .spawn(rx);
        (tx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormType, SyncStatus};
    use crate::store::MemoryStore;
    use crate::testing::ScriptedApi;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = Config {
            sync_interval_secs: 0,
            ..Config::default()
        };
        let result = OfflineCache::from_parts(Arc::new(MemoryStore::new()), Arc::new(ScriptedApi::new()), &config).await;
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sync_on_reconnect() {
        let api = Arc::new(ScriptedApi::new().serve("/api/schedule", json!([{"slot": "9:00"}])));
        let cache = OfflineCache::from_parts(Arc::new(MemoryStore::new()), api.clone(), &Config::default())
            .await
            .unwrap();
        cache
            .repository()
            .store_form_submission(FormType::Volunteer, json!({"name": "Ada"}))
            .await
            .unwrap();

        let (signals, handle) = cache.start_background(false);
        signals.send(ConnectivitySignal::Restored).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(api.submitted(), vec![("/api/volunteer".to_string(), json!({"name": "Ada"}))]);
        assert_eq!(api.fetched().len(), 3);
        assert!(cache.repository().get_content("schedule").await.unwrap().is_some());
        assert!(cache.queue().working_set().is_empty());

        drop(signals);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_resumes_pending_submissions() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let id = {
            let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
            let api = Arc::new(ScriptedApi::new().fail_next(1));
            let cache = OfflineCache::from_parts(store, api, &config).await.unwrap();
            let id = cache
                .repository()
                .store_form_submission(FormType::Contact, json!({"m": "hi"}))
                .await
                .unwrap();
            assert_eq!(cache.queue().process_sync_queue().await.retrying, 1);
            id
        };

        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let api = Arc::new(ScriptedApi::new());
        let cache = OfflineCache::from_parts(store, api.clone(), &config).await.unwrap();
        assert!(cache.queue().working_set().contains(&id));

        assert_eq!(cache.queue().process_sync_queue().await.synced, 1);
        let record = cache.repository().get_record(&id).await.unwrap().unwrap();
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(record.retry_count, 1);
        assert_eq!(api.submitted().len(), 1);
    }
}
