//! Retry-bounded delivery of pending form submissions.
//!
//! Per submission: `pending -> synced` on a successful delivery, or
//! `pending -> failed` once `retry_count` reaches the retry limit. `failed`
//! is terminal here; nothing re-queues it short of a collaborator storing a
//! new pending record under the id. A record replaced while its delivery is
//! in flight keeps its new state untouched and is delivered on a later drain.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::RemoteApi;
use crate::cache::ContentRepository;
use crate::error::CacheError;
use crate::models::{ContentRecord, FormSubmission, FormType, SyncStatus};
use crate::sync::WorkingSet;

/// Failed delivery attempts before a submission is given up on.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Tally of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub synced: usize,
    /// Failed attempts that left the submission pending.
    pub retrying: usize,
    /// Submissions moved to `failed` during this drain.
    pub gave_up: usize,
    /// Ids dropped because the store no longer had them as pending.
    pub dropped: usize,
    /// Attempts whose record was replaced mid-flight; the new version stays
    /// queued.
    pub superseded: usize,
    /// Ids skipped because the store itself errored.
    pub errors: usize,
    /// True if another drain was already running and this one did nothing.
    pub skipped: bool,
}

enum Outcome {
    Synced,
    Retrying,
    GaveUp,
    Dropped,
    Superseded,
}

enum Update {
    /// The stored record the transition applies to.
    Current(ContentRecord),
    /// Nothing to change; the status the record is left in.
    Settled(Option<SyncStatus>),
}

pub struct SyncQueue {
    repo: Arc<ContentRepository>,
    api: Arc<dyn RemoteApi>,
    retry_limit: u32,
    draining: Mutex<()>,
}

impl SyncQueue {
    pub fn new(repo: Arc<ContentRepository>, api: Arc<dyn RemoteApi>) -> Self {
        Self {
            repo,
            api,
            retry_limit: DEFAULT_RETRY_LIMIT,
            draining: Mutex::new(()),
        }
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Ids currently tracked for delivery.
    pub fn working_set(&self) -> &WorkingSet {
        self.repo.working_set()
    }

    /// Rebuild the working set from the store. Must run before the first
    /// drain after startup; returns the number of submissions tracked.
    pub async fn initialize(&self) -> Result<usize, CacheError> {
        let pending = self.get_pending_submissions().await?;
        self.working_set()
            .replace(pending.into_iter().map(|record| record.id));
        let tracked = self.working_set().len();
        info!(pending = tracked, "Sync queue reconciled with store");
        Ok(tracked)
    }

    pub async fn get_pending_submissions(&self) -> Result<Vec<ContentRecord>, CacheError> {
        self.repo.pending_submissions().await
    }

    /// Record a successful delivery. Only a pending form submission moves
    /// to `synced`; anything else is left as stored. Returns the status the
    /// record is left in, or `None` if it no longer exists.
    pub async fn mark_submission_synced(&self, id: &str) -> Result<Option<SyncStatus>, CacheError> {
        match self.load_for_update(id, None).await? {
            Update::Current(record) => self.settle_synced(record).await.map(Some),
            Update::Settled(status) => Ok(status),
        }
    }

    /// Count a failed delivery attempt. Returns the status the record is
    /// left in, or `None` if it no longer exists.
    pub async fn mark_submission_failed(&self, id: &str) -> Result<Option<SyncStatus>, CacheError> {
        match self.load_for_update(id, None).await? {
            Update::Current(record) => self.settle_failed(record).await.map(Some),
            Update::Settled(status) => Ok(status),
        }
    }

    /// Load `id` for a sync-state transition.
    ///
    /// With `delivered` set, the transition only applies if the store still
    /// holds exactly that record. A record replaced while its delivery was
    /// in flight stays pending and tracked, so the new version is delivered
    /// on a later drain.
    async fn load_for_update(&self, id: &str, delivered: Option<&ContentRecord>) -> Result<Update, CacheError> {
        let Some(record) = self.repo.store().get(id).await? else {
            self.working_set().remove(id);
            return Ok(Update::Settled(None));
        };
        if !record.is_pending_submission() {
            self.working_set().remove(id);
            return Ok(Update::Settled(Some(record.sync_status)));
        }
        if delivered.is_some_and(|delivered| *delivered != record) {
            debug!(id = id, "Submission replaced during delivery, keeping it queued");
            self.working_set().insert(id);
            return Ok(Update::Settled(Some(SyncStatus::Pending)));
        }
        Ok(Update::Current(record))
    }

    async fn settle_synced(&self, mut record: ContentRecord) -> Result<SyncStatus, CacheError> {
        let id = record.id.clone();
        record.sync_status = SyncStatus::Synced;
        self.repo.store().put(record).await?;
        self.working_set().remove(&id);
        debug!(id = %id, "Submission synced");
        Ok(SyncStatus::Synced)
    }

    async fn settle_failed(&self, mut record: ContentRecord) -> Result<SyncStatus, CacheError> {
        let id = record.id.clone();
        record.retry_count += 1;
        if record.retry_count >= self.retry_limit {
            record.sync_status = SyncStatus::Failed;
        }
        let status = record.sync_status;
        let retry_count = record.retry_count;
        self.repo.store().put(record).await?;

        if status == SyncStatus::Failed {
            self.working_set().remove(&id);
            warn!(id = %id, retry_count = retry_count, "Submission failed permanently");
        } else {
            debug!(id = %id, retry_count = retry_count, "Submission will be retried");
        }
        Ok(status)
    }

    /// One drain cycle over the working set.
    ///
    /// Delivery and per-id storage errors are contained here; they show up
    /// in the report and the records' sync state, never as an `Err`.
    pub async fn process_sync_queue(&self) -> DrainReport {
        let Ok(_guard) = self.draining.try_lock() else {
            debug!("Drain already in progress");
            return DrainReport {
                skipped: true,
                ..DrainReport::default()
            };
        };

        let mut report = DrainReport::default();
        for id in self.working_set().snapshot() {
            if !self.working_set().contains(&id) {
                continue;
            }
            match self.deliver(&id).await {
                Ok(Outcome::Synced) => {
                    report.attempted += 1;
                    report.synced += 1;
                }
                Ok(Outcome::Retrying) => {
                    report.attempted += 1;
                    report.retrying += 1;
                }
                Ok(Outcome::GaveUp) => {
                    report.attempted += 1;
                    report.gave_up += 1;
                }
                Ok(Outcome::Dropped) => report.dropped += 1,
                Ok(Outcome::Superseded) => {
                    report.attempted += 1;
                    report.superseded += 1;
                }
                Err(e) => {
                    error!(id = %id, error = %e, "Storage error while syncing submission");
                    report.errors += 1;
                }
            }
        }

        if report.attempted > 0 || report.dropped > 0 || report.errors > 0 {
            info!(
                attempted = report.attempted,
                synced = report.synced,
                retrying = report.retrying,
                gave_up = report.gave_up,
                "Drain cycle complete"
            );
        }
        report
    }

    async fn deliver(&self, id: &str) -> Result<Outcome, CacheError> {
        let record = match self.repo.store().get(id).await? {
            Some(record) if record.is_pending_submission() => record,
            _ => {
                debug!(id = id, "Dropping id that is no longer pending");
                self.working_set().remove(id);
                return Ok(Outcome::Dropped);
            }
        };

        let (form_type, submission) = match self.decode_submission(&record) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(id = id, error = %e, "Undeliverable submission, not retrying");
                self.give_up(record).await?;
                return Ok(Outcome::GaveUp);
            }
        };

        let delivered = self.api.submit(form_type.endpoint(), &submission.data).await;
        if let Err(ref e) = delivered {
            warn!(id = id, endpoint = form_type.endpoint(), error = %e, "Delivery failed");
        }

        let current = match self.load_for_update(id, Some(&record)).await? {
            Update::Current(current) => current,
            Update::Settled(Some(SyncStatus::Pending)) => return Ok(Outcome::Superseded),
            Update::Settled(_) => return Ok(Outcome::Dropped),
        };
        match delivered {
            Ok(()) => {
                self.settle_synced(current).await?;
                Ok(Outcome::Synced)
            }
            Err(_) => match self.settle_failed(current).await? {
                SyncStatus::Failed => Ok(Outcome::GaveUp),
                _ => Ok(Outcome::Retrying),
            },
        }
    }

    fn decode_submission(&self, record: &ContentRecord) -> Result<(FormType, FormSubmission), CacheError> {
        let submission: FormSubmission = serde_json::from_value(self.repo.decode_payload(record)?)?;
        let form_type = submission
            .form_type()
            .map_err(|e| CacheError::UnknownFormType(e.value))?;
        Ok((form_type, submission))
    }

    /// Move straight to `failed` without an attempt.
    async fn give_up(&self, mut record: ContentRecord) -> Result<(), CacheError> {
        let id = record.id.clone();
        record.sync_status = SyncStatus::Failed;
        self.repo.store().put(record).await?;
        self.working_set().remove(&id);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
