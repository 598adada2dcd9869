//! Delivery of queued form submissions.
//!
//! - `WorkingSet`: transient index of submissions being actively retried
//! - `SyncQueue`: retry-bounded delivery and sync-state transitions
//! - `SyncScheduler`: background loop driven by connectivity signals and timers

pub mod queue;
pub mod scheduler;
pub mod working_set;

pub use queue::{DrainReport, SyncQueue, DEFAULT_RETRY_LIMIT};
pub use scheduler::{ConnectivitySignal, SchedulerSettings, SyncScheduler};
pub use working_set::WorkingSet;
