use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::codec::{IdentityCodec, PayloadCodec};
use super::eviction::{EvictionPlan, EvictionPolicy};
use super::quota::{NoEstimate, QuotaMonitor, StorageQuota};
use super::stats::CacheStats;
use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use crate::models::{ContentRecord, ContentType, FormSubmission, FormType, Priority, SyncStatus};
use crate::store::{ContentStore, IndexQuery, StoreError};
use crate::sync::WorkingSet;

/// Content lives a day unless the caller says otherwise.
const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Form submissions are kept a week, delivered or not.
const FORM_RETENTION_DAYS: i64 = 7;

/// Length of the random tail on generated submission ids.
const SUBMISSION_ID_SUFFIX_LEN: usize = 9;

/// When a stored record stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// `now + default_expiry`
    #[default]
    Default,
    In(Duration),
    At(DateTime<Utc>),
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub priority: Priority,
    pub expiry: Expiry,
    pub sync_status: SyncStatus,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Medium,
            expiry: Expiry::Default,
            sync_status: SyncStatus::Synced,
        }
    }
}

impl StoreOptions {
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn expires_in(self, ttl: Duration) -> Self {
        self.expiry(Expiry::In(ttl))
    }

    pub fn sync_status(mut self, sync_status: SyncStatus) -> Self {
        self.sync_status = sync_status;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositorySettings {
    pub default_expiry: Duration,
    pub form_retention: Duration,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            default_expiry: Duration::hours(DEFAULT_EXPIRY_HOURS),
            form_retention: Duration::days(FORM_RETENTION_DAYS),
        }
    }
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub plan: EvictionPlan,
    /// Records actually deleted; can trail the plan if something else
    /// deleted a victim first.
    pub removed: usize,
}

/// Reads and writes cached content on top of a `ContentStore`.
///
/// Owns expiry (lazy on single reads, batched in `cleanup`), payload
/// encoding, and the quota check that precedes every write. Also keeps the
/// sync queue's working set in step with the pending submissions it writes.
pub struct ContentRepository {
    store: Arc<dyn ContentStore>,
    codec: Arc<dyn PayloadCodec>,
    clock: Arc<dyn Clock>,
    quota: QuotaMonitor,
    eviction: EvictionPolicy,
    settings: RepositorySettings,
    working_set: WorkingSet,
}

impl ContentRepository {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            codec: Arc::new(IdentityCodec),
            clock: Arc::new(SystemClock),
            quota: QuotaMonitor::new(Arc::new(NoEstimate)),
            eviction: EvictionPolicy::default(),
            settings: RepositorySettings::default(),
            working_set: WorkingSet::new(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_quota_monitor(mut self, quota: QuotaMonitor) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_eviction_policy(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_settings(mut self, settings: RepositorySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ===== Writes =====

    /// Store `payload` under `id`, replacing any existing record.
    ///
    /// If storage is more than 90% full a cleanup pass runs first; the write
    /// goes ahead either way.
    pub async fn store_content(
        &self,
        id: &str,
        content_type: ContentType,
        payload: &Value,
        options: StoreOptions,
    ) -> Result<(), CacheError> {
        let quota = self.quota.get_storage_quota().await;
        if self.quota.needs_cleanup(&quota) {
            info!(percentage = quota.percentage, "Storage nearly full, cleaning up before write");
            self.cleanup_with(&quota).await?;
        }

        let now = self.clock.now();
        let encoded = self.codec.encode(serde_json::to_vec(payload)?)?;
        let record = ContentRecord {
            id: id.to_string(),
            content_type,
            payload: encoded,
            created_at: now,
            expires_at: self.resolve_expiry(options.expiry, now),
            priority: options.priority,
            sync_status: options.sync_status,
            retry_count: 0,
        };
        let pending = record.is_pending_submission();

        self.store.put(record).await?;

        if pending {
            self.working_set.insert(id);
        } else {
            self.working_set.remove(id);
        }
        debug!(id = id, content_type = %content_type, "Content stored");
        Ok(())
    }

    /// Queue a form for delivery. Returns the generated record id.
    pub async fn store_form_submission(&self, form_type: FormType, data: Value) -> Result<String, CacheError> {
        let now = self.clock.now();
        let id = format!("{}_{}_{}", form_type.as_str(), now.timestamp_millis(), random_suffix());
        let submission = serde_json::to_value(FormSubmission::new(form_type, data, now))?;

        let options = StoreOptions::default()
            .priority(Priority::High)
            .expires_in(self.settings.form_retention)
            .sync_status(SyncStatus::Pending);
        self.store_content(&id, ContentType::FormSubmission, &submission, options)
            .await?;

        info!(id = %id, form_type = %form_type, "Form submission queued");
        Ok(id)
    }

    /// Remove a record. Deleting an unknown id is not an error.
    pub async fn delete_content(&self, id: &str) -> Result<(), CacheError> {
        self.store.delete(id).await?;
        self.working_set.remove(id);
        Ok(())
    }

    // ===== Reads =====

    /// The record under `id`, unless absent or expired. An expired record
    /// is deleted on the way out.
    pub async fn get_record(&self, id: &str) -> Result<Option<ContentRecord>, CacheError> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(None);
        };
        if record.is_expired_at(self.clock.now()) {
            debug!(id = id, "Dropping expired record on read");
            self.delete_content(id).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub async fn get_content(&self, id: &str) -> Result<Option<Value>, CacheError> {
        match self.get_record(id).await? {
            Some(record) => Ok(Some(self.decode_payload(&record)?)),
            None => Ok(None),
        }
    }

    /// Payloads of every live record of `content_type`, oldest first.
    ///
    /// Expired records are skipped but left in place for the next cleanup
    /// pass. Records whose payload no longer decodes are skipped too.
    pub async fn get_content_by_type(&self, content_type: ContentType) -> Result<Vec<Value>, CacheError> {
        let now = self.clock.now();
        let mut records = self
            .store
            .get_all_by_index(IndexQuery::ContentType(content_type))
            .await?;
        records.retain(|r| !r.is_expired_at(now));
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut payloads = Vec::with_capacity(records.len());
        for record in &records {
            match self.decode_payload(record) {
                Ok(payload) => payloads.push(payload),
                Err(e) => warn!(id = %record.id, error = %e, "Skipping undecodable payload"),
            }
        }
        Ok(payloads)
    }

    /// Form submissions still waiting for delivery, straight from the store.
    pub async fn pending_submissions(&self) -> Result<Vec<ContentRecord>, CacheError> {
        let mut records = self
            .store
            .get_all_by_index(IndexQuery::SyncStatus(SyncStatus::Pending))
            .await?;
        records.retain(|r| r.content_type == ContentType::FormSubmission);
        Ok(records)
    }

    pub fn decode_payload(&self, record: &ContentRecord) -> Result<Value, CacheError> {
        let raw = self.codec.decode(&record.payload)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    // ===== Quota & Cleanup =====

    pub async fn get_storage_quota(&self) -> StorageQuota {
        self.quota.get_storage_quota().await
    }

    /// Delete expired records, plus old low-priority ones if storage is
    /// under pressure.
    pub async fn cleanup(&self) -> Result<CleanupReport, CacheError> {
        let quota = self.quota.get_storage_quota().await;
        self.cleanup_with(&quota).await
    }

    async fn cleanup_with(&self, quota: &StorageQuota) -> Result<CleanupReport, CacheError> {
        let records = self.store.get_all().await?;
        let plan = self.eviction.select(&records, self.clock.now(), quota);
        if plan.is_empty() {
            debug!(records = records.len(), "Cleanup found nothing to evict");
            return Ok(CleanupReport::default());
        }

        let ids = plan.ids();
        let removed = self.store.delete_many(&ids).await?;
        for id in &ids {
            self.working_set.remove(id);
        }
        info!(
            expired = plan.expired.len(),
            low_priority = plan.low_priority.len(),
            removed = removed,
            "Cleanup complete"
        );
        Ok(CleanupReport { plan, removed })
    }

    // ===== Stats =====

    pub async fn get_stats(&self) -> Result<CacheStats, CacheError> {
        let records = self.store.get_all().await?;

        let mut by_type = BTreeMap::new();
        let mut total_bytes = 0u64;
        for record in &records {
            *by_type.entry(record.content_type).or_insert(0) += 1;
            let len = record.serialized_len().map_err(|source| StoreError::Serialize {
                id: record.id.clone(),
                source,
            })?;
            total_bytes += len as u64;
        }

        Ok(CacheStats {
            total_records: records.len(),
            by_type,
            pending_sync: records
                .iter()
                .filter(|r| r.sync_status == SyncStatus::Pending)
                .count(),
            total_bytes,
            quota: self.quota.get_storage_quota().await,
            newest_created_at: records.iter().map(|r| r.created_at).max(),
        })
    }

    /// A lifetime that runs past the representable calendar never expires.
    fn resolve_expiry(&self, expiry: Expiry, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match expiry {
            Expiry::Default => now.checked_add_signed(self.settings.default_expiry),
            Expiry::In(ttl) => now.checked_add_signed(ttl),
            Expiry::At(at) => Some(at),
            Expiry::Never => None,
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUBMISSION_ID_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
