use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ContentStore, IndexQuery, RecordTable, StoreError};
use crate::models::ContentRecord;

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, record: ContentRecord) -> Result<(), StoreError> {
        record.validate().map_err(|reason| StoreError::InvalidRecord {
            id: record.id.clone(),
            reason,
        })?;
        self.table.write().await.upsert(record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContentRecord>, StoreError> {
        Ok(self.table.read().await.get(id).cloned())
    }

    async fn get_all_by_index(&self, query: IndexQuery) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.table.read().await.query(query))
    }

    async fn get_all(&self) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.table.read().await.all())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.table.write().await.remove(id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().await.len())
    }

    async fn total_bytes(&self) -> Result<u64, StoreError> {
        Ok(self.table.read().await.total_bytes())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut table = self.table.write().await;
        Ok(ids.iter().filter_map(|id| table.remove(id)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, Priority, SyncStatus};
    use chrono::{Duration, Utc};

    fn record(id: &str, payload: &[u8]) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            content_type: ContentType::Content,
            payload: payload.to_vec(),
            created_at: Utc::now(),
            expires_at: None,
            priority: Priority::Medium,
            sync_status: SyncStatus::Synced,
            retry_count: 0,
        }
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let store = MemoryStore::new();
        store.put(record("news", b"first")).await.unwrap();
        store.put(record("news", b"second")).await.unwrap();

        let stored = store.get("news").await.unwrap().expect("record present");
        assert_eq!(stored.payload, b"second");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put(record("news", b"x")).await.unwrap();

        store.delete("news").await.unwrap();
        store.delete("news").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert!(store.get("news").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_record() {
        let store = MemoryStore::new();
        let mut bad = record("news", b"x");
        bad.expires_at = Some(bad.created_at - Duration::minutes(1));

        let err = store.put(bad).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_many_counts_present_ids() {
        let store = MemoryStore::new();
        store.put(record("a", b"1")).await.unwrap();
        store.put(record("b", b"2")).await.unwrap();

        let removed = store
            .delete_many(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
