//! Offline content cache and synchronization queue.
//!
//! `eventcache-core` keeps event content, schedules and user-submitted forms
//! in a local store so the application stays usable without a network, and
//! pushes queued form submissions to the remote API once connectivity returns.
//!
//! The pieces, leaf-first:
//! - [`store`]: the persistent record store with its secondary indices
//! - [`cache`]: the content repository, quota monitor and eviction policy
//! - [`sync`]: the retry-bounded sync queue and its background scheduler
//! - [`prefetch`]: pulls critical content into the cache on reconnect
//! - [`api`]: the HTTP client used for delivery and prefetch
//!
//! [`OfflineCache`] wires all of these together for an application.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod offline;
pub mod prefetch;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, RemoteApi};
pub use cache::{CacheStats, ContentRepository, Expiry, StorageQuota, StoreOptions};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::CacheError;
pub use models::{ContentRecord, ContentType, FormType, Priority, SyncStatus};
pub use offline::OfflineCache;
pub use prefetch::CriticalDataPrefetcher;
pub use store::{ContentStore, FileStore, IndexQuery, MemoryStore, StoreError};
pub use sync::{ConnectivitySignal, SyncQueue, SyncScheduler};
