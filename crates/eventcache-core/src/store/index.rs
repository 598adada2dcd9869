//! In-memory table plus secondary indices shared by both store backends.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::IndexQuery;
use crate::models::{ContentRecord, ContentType, Priority, SyncStatus};

/// Records keyed by id, with one id-set per indexed value.
///
/// Index traversal order is by id within each bucket, which is the only
/// ordering `get_all_by_index` promises.
#[derive(Debug, Default)]
pub struct RecordTable {
    records: HashMap<String, ContentRecord>,
    by_type: BTreeMap<ContentType, BTreeSet<String>>,
    by_priority: BTreeMap<Priority, BTreeSet<String>>,
    by_sync_status: BTreeMap<SyncStatus, BTreeSet<String>>,
    by_created_at: BTreeMap<DateTime<Utc>, BTreeSet<String>>,
    /// Sum of `serialized_len` over every record.
    total_bytes: u64,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ContentRecord> {
        self.records.get(id)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Insert or replace, keeping every index in step. Returns the replaced
    /// record, if any.
    pub fn upsert(&mut self, record: ContentRecord) -> Option<ContentRecord> {
        let previous = self.remove(&record.id);
        let id = record.id.clone();
        self.by_type.entry(record.content_type).or_default().insert(id.clone());
        self.by_priority.entry(record.priority).or_default().insert(id.clone());
        self.by_sync_status.entry(record.sync_status).or_default().insert(id.clone());
        self.by_created_at.entry(record.created_at).or_default().insert(id.clone());
        self.total_bytes += record_bytes(&record);
        self.records.insert(id, record);
        previous
    }

    pub fn remove(&mut self, id: &str) -> Option<ContentRecord> {
        let record = self.records.remove(id)?;
        detach(&mut self.by_type, &record.content_type, id);
        detach(&mut self.by_priority, &record.priority, id);
        detach(&mut self.by_sync_status, &record.sync_status, id);
        detach(&mut self.by_created_at, &record.created_at, id);
        self.total_bytes = self.total_bytes.saturating_sub(record_bytes(&record));
        Some(record)
    }

    pub fn query(&self, query: IndexQuery) -> Vec<ContentRecord> {
        let ids = match query {
            IndexQuery::ContentType(t) => self.by_type.get(&t),
            IndexQuery::Priority(p) => self.by_priority.get(&p),
            IndexQuery::SyncStatus(s) => self.by_sync_status.get(&s),
            IndexQuery::CreatedAt(at) => self.by_created_at.get(&at),
        };
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<ContentRecord> {
        self.by_created_at
            .values()
            .flatten()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }
}

fn record_bytes(record: &ContentRecord) -> u64 {
    record.serialized_len().map_or(0, |len| len as u64)
}

fn detach<K: Ord>(index: &mut BTreeMap<K, BTreeSet<String>>, key: &K, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, content_type: ContentType, priority: Priority, age_mins: i64) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            content_type,
            payload: b"{}".to_vec(),
            created_at: Utc::now() - Duration::minutes(age_mins),
            expires_at: None,
            priority,
            sync_status: SyncStatus::Synced,
            retry_count: 0,
        }
    }

    fn ids(records: Vec<ContentRecord>) -> Vec<String> {
        records.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_query_each_index() {
        let mut table = RecordTable::new();
        let speakers = record("speakers", ContentType::Speakers, Priority::High, 5);
        let created_at = speakers.created_at;
        table.upsert(speakers);
        table.upsert(record("schedule", ContentType::Schedule, Priority::Critical, 10));
        table.upsert(record("banner", ContentType::Static, Priority::Low, 1));

        assert_eq!(ids(table.query(IndexQuery::ContentType(ContentType::Schedule))), ["schedule"]);
        assert_eq!(ids(table.query(IndexQuery::Priority(Priority::Low))), ["banner"]);
        assert_eq!(table.query(IndexQuery::SyncStatus(SyncStatus::Synced)).len(), 3);
        assert!(table.query(IndexQuery::SyncStatus(SyncStatus::Pending)).is_empty());
        assert_eq!(ids(table.query(IndexQuery::CreatedAt(created_at))), ["speakers"]);
    }

    #[test]
    fn test_upsert_moves_record_between_buckets() {
        let mut table = RecordTable::new();
        let mut rec = record("contact_1", ContentType::FormSubmission, Priority::High, 0);
        rec.sync_status = SyncStatus::Pending;
        table.upsert(rec.clone());

        rec.sync_status = SyncStatus::Synced;
        let previous = table.upsert(rec);

        assert_eq!(previous.map(|r| r.sync_status), Some(SyncStatus::Pending));
        assert_eq!(table.len(), 1);
        assert!(table.query(IndexQuery::SyncStatus(SyncStatus::Pending)).is_empty());
        assert_eq!(table.query(IndexQuery::SyncStatus(SyncStatus::Synced)).len(), 1);
    }

    #[test]
    fn test_remove_clears_indices() {
        let mut table = RecordTable::new();
        table.upsert(record("banner", ContentType::Static, Priority::Low, 0));

        assert!(table.remove("banner").is_some());
        assert!(table.remove("banner").is_none());
        assert!(table.is_empty());
        assert!(table.query(IndexQuery::Priority(Priority::Low)).is_empty());
        assert!(table.all().is_empty());
    }

    #[test]
    fn test_total_bytes_follows_writes() {
        let mut table = RecordTable::new();
        let small = record("banner", ContentType::Static, Priority::Low, 0);
        let mut large = record("schedule", ContentType::Schedule, Priority::Critical, 0);
        large.payload = vec![b'x'; 512];
        let size = |r: &ContentRecord| r.serialized_len().unwrap() as u64;

        table.upsert(small.clone());
        table.upsert(large.clone());
        assert_eq!(table.total_bytes(), size(&small) + size(&large));

        let mut replaced = small.clone();
        replaced.payload = vec![b'y'; 64];
        table.upsert(replaced.clone());
        assert_eq!(table.total_bytes(), size(&replaced) + size(&large));

        table.remove("schedule");
        table.remove("banner");
        assert_eq!(table.total_bytes(), 0);
    }

    #[test]
    fn test_all_is_oldest_first() {
        let mut table = RecordTable::new();
        table.upsert(record("new", ContentType::Content, Priority::Medium, 1));
        table.upsert(record("old", ContentType::Content, Priority::Medium, 30));
        table.upsert(record("mid", ContentType::Content, Priority::Medium, 10));

        assert_eq!(ids(table.all()), ["old", "mid", "new"]);
    }
}
