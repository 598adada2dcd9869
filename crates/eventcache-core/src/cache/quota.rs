//! Storage usage reporting.
//!
//! The platform may or may not be able to say how much space the cache is
//! using. When it cannot, the quota reads as all zeros and nothing is ever
//! evicted for space reasons (fail-open).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::ContentStore;

/// Cleanup runs before a write once usage passes this percentage.
pub const DEFAULT_CLEANUP_THRESHOLD: f64 = 90.0;

/// Raw figures reported by a storage estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

/// Platform hook for storage usage. `None` means "unknown".
#[async_trait]
pub trait StorageEstimator: Send + Sync {
    async fn estimate(&self) -> Option<StorageEstimate>;
}

/// Estimator for platforms with no usage API.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEstimate;

#[async_trait]
impl StorageEstimator for NoEstimate {
    async fn estimate(&self) -> Option<StorageEstimate> {
        None
    }
}

/// Reports the store's own serialized size against a configured byte budget.
pub struct StoreUsageEstimator {
    store: Arc<dyn ContentStore>,
    quota_bytes: u64,
}

impl StoreUsageEstimator {
    pub fn new(store: Arc<dyn ContentStore>, quota_bytes: u64) -> Self {
        Self { store, quota_bytes }
    }
}

#[async_trait]
impl StorageEstimator for StoreUsageEstimator {
    async fn estimate(&self) -> Option<StorageEstimate> {
        if self.quota_bytes == 0 {
            return None;
        }
        let usage = match self.store.total_bytes().await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(error = %e, "Failed to read store size for usage estimate");
                return None;
            }
        };
        Some(StorageEstimate {
            usage,
            quota: self.quota_bytes,
        })
    }
}

/// Storage usage as reported to callers and stats.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StorageQuota {
    pub used: u64,
    pub available: u64,
    pub total: u64,
    pub percentage: f64,
}

impl StorageQuota {
    pub fn from_estimate(estimate: Option<StorageEstimate>) -> Self {
        match estimate {
            Some(StorageEstimate { usage, quota }) if quota > 0 => Self {
                used: usage,
                available: quota.saturating_sub(usage),
                total: quota,
                percentage: usage as f64 / quota as f64 * 100.0,
            },
            _ => Self::default(),
        }
    }

    /// True when no estimate was available.
    pub fn is_unknown(&self) -> bool {
        self.total == 0
    }
}

pub struct QuotaMonitor {
    estimator: Arc<dyn StorageEstimator>,
    cleanup_threshold: f64,
}

impl QuotaMonitor {
    pub fn new(estimator: Arc<dyn StorageEstimator>) -> Self {
        Self {
            estimator,
            cleanup_threshold: DEFAULT_CLEANUP_THRESHOLD,
        }
    }

    pub fn with_cleanup_threshold(mut self, percentage: f64) -> Self {
        self.cleanup_threshold = percentage;
        self
    }

    pub async fn get_storage_quota(&self) -> StorageQuota {
        let quota = StorageQuota::from_estimate(self.estimator.estimate().await);
        debug!(used = quota.used, total = quota.total, percentage = quota.percentage, "Storage quota");
        quota
    }

    /// Whether a write seeing `quota` must run a cleanup pass first.
    pub fn needs_cleanup(&self, quota: &StorageQuota) -> bool {
        quota.percentage > self.cleanup_threshold
    }
}
