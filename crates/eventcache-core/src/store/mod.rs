//! Persistent record store.
//!
//! A `ContentStore` holds `ContentRecord`s keyed by id with secondary indices
//! on content type, priority, sync status and creation time. Two backends:
//! - `MemoryStore`: ephemeral, for tests and sessions that never touch disk
//! - `FileStore`: one JSON document per record, replaced atomically
//!
//! The store applies no expiry logic; a raw `get` may return an expired
//! record. That is the repository's job.

pub mod error;
pub mod file;
pub mod index;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ContentRecord, ContentType, Priority, SyncStatus};

pub use error::StoreError;
pub use file::FileStore;
pub use index::RecordTable;
pub use memory::MemoryStore;

/// Lookup against one of the secondary indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexQuery {
    ContentType(ContentType),
    Priority(Priority),
    SyncStatus(SyncStatus),
    CreatedAt(DateTime<Utc>),
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert or fully replace the record with the same id. Either the whole
    /// record is written or nothing is.
    async fn put(&self, record: ContentRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ContentRecord>, StoreError>;

    /// Every record whose indexed field equals the queried value.
    async fn get_all_by_index(&self, query: IndexQuery) -> Result<Vec<ContentRecord>, StoreError>;

    async fn get_all(&self) -> Result<Vec<ContentRecord>, StoreError>;

    /// Removing an id that is not present is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Sum of every record's serialized JSON length.
    async fn total_bytes(&self) -> Result<u64, StoreError> {
        let records = self.get_all().await?;
        Ok(records
            .iter()
            .filter_map(|r| r.serialized_len().ok())
            .map(|len| len as u64)
            .sum())
    }

    /// Delete several ids, returning how many were actually present.
    async fn delete_many(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut removed = 0;
        for id in ids {
            if self.get(id).await?.is_some() {
                self.delete(id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
