//! Local caching module for offline data access.
//!
//! This module provides the `ContentRepository`, the only way collaborators
//! read and write cached content, along with the pieces it leans on:
//! - `PayloadCodec`: encoding applied to payload bytes (identity by default)
//! - `QuotaMonitor`: storage usage, fail-open when the platform can't say
//! - `EvictionPolicy`: expired first, then oldest low-priority under pressure
//! - `CacheStats`: read-only summary of the cache contents

pub mod codec;
pub mod eviction;
pub mod quota;
pub mod repository;
pub mod stats;

pub use codec::{IdentityCodec, PayloadCodec};
pub use eviction::{EvictionPlan, EvictionPolicy};
pub use quota::{NoEstimate, QuotaMonitor, StorageEstimate, StorageEstimator, StorageQuota, StoreUsageEstimator};
pub use repository::{CleanupReport, ContentRepository, Expiry, RepositorySettings, StoreOptions};
pub use stats::CacheStats;
