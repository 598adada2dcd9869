//! Victim selection for cleanup passes.
//!
//! Expired records always go. Under quota pressure a batch of low-priority
//! records goes too, oldest first. Nothing above `Low` is ever chosen for
//! space reasons.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::quota::StorageQuota;
use crate::models::{ContentRecord, Priority};

/// Quota percentage above which low-priority records are evicted.
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionPolicy {
    pub pressure_threshold: f64,
    /// Lower bound on the low-priority batch size.
    pub min_batch: usize,
    /// Share of the total record count targeted per pass.
    pub batch_fraction: f64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            min_batch: 10,
            batch_fraction: 0.10,
        }
    }
}

/// Ids chosen by one pass, split by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionPlan {
    pub expired: Vec<String>,
    pub low_priority: Vec<String>,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.low_priority.is_empty()
    }

    pub fn len(&self) -> usize {
        self.expired.len() + self.low_priority.len()
    }

    /// Union of both sets; each id appears once.
    pub fn ids(&self) -> Vec<String> {
        self.expired
            .iter()
            .chain(self.low_priority.iter())
            .cloned()
            .collect()
    }
}

impl EvictionPolicy {
    /// How many low-priority records one pass may reclaim.
    pub fn reclaim_target(&self, total_count: usize) -> usize {
        let share = (total_count as f64 * self.batch_fraction).floor() as usize;
        share.max(self.min_batch)
    }

    pub fn under_pressure(&self, quota: &StorageQuota) -> bool {
        quota.percentage > self.pressure_threshold
    }

    /// Pick victims from `records` (the full table) as of `now`.
    pub fn select(&self, records: &[ContentRecord], now: DateTime<Utc>, quota: &StorageQuota) -> EvictionPlan {
        let mut expired: Vec<&ContentRecord> = records.iter().filter(|r| r.is_expired_at(now)).collect();
        expired.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let expired: Vec<String> = expired.into_iter().map(|r| r.id.clone()).collect();

        let mut low_priority = Vec::new();
        if self.under_pressure(quota) {
            let already: HashSet<&str> = expired.iter().map(String::as_str).collect();
            let mut candidates: Vec<&ContentRecord> =
                records.iter().filter(|r| r.priority == Priority::Low).collect();
            candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            low_priority = candidates
                .into_iter()
                .take(self.reclaim_target(records.len()))
                .filter(|r| !already.contains(r.id.as_str()))
                .map(|r| r.id.clone())
                .collect();
        }

        EvictionPlan { expired, low_priority }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, SyncStatus};
    use chrono::Duration;

    fn record(id: &str, priority: Priority, age_mins: i64, expired: bool, now: DateTime<Utc>) -> ContentRecord {
        let created_at = now - Duration::minutes(age_mins);
        ContentRecord {
            id: id.to_string(),
            content_type: ContentType::Static,
            payload: Vec::new(),
            created_at,
            expires_at: expired.then(|| created_at + Duration::seconds(1)),
            priority,
            sync_status: SyncStatus::Synced,
            retry_count: 0,
        }
    }

    fn quota(percentage: f64) -> StorageQuota {
        StorageQuota {
            used: percentage as u64,
            available: 100 - percentage as u64,
            total: 100,
            percentage,
        }
    }

    #[test]
    fn test_reclaim_target() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.reclaim_target(0), 10);
        assert_eq!(policy.reclaim_target(50), 10);
        assert_eq!(policy.reclaim_target(250), 25);
        assert_eq!(policy.reclaim_target(259), 25);
    }

    #[test]
    fn test_expired_selected_without_pressure() {
        let now = Utc::now();
        let records = vec![
            record("stale-critical", Priority::Critical, 60, true, now),
            record("fresh-low", Priority::Low, 60, false, now),
        ];

        let plan = EvictionPolicy::default().select(&records, now, &quota(10.0));
        assert_eq!(plan.expired, ["stale-critical"]);
        assert!(plan.low_priority.is_empty());
    }

    #[test]
    fn test_pressure_evicts_oldest_low_first_and_spares_critical() {
        let now = Utc::now();
        let mut records: Vec<ContentRecord> = (0..15)
            .map(|i| record(&format!("low-{:02}", i), Priority::Low, 100 - i, false, now))
            .collect();
        records.push(record("ancient-critical", Priority::Critical, 10_000, false, now));
        records.push(record("ancient-medium", Priority::Medium, 10_000, false, now));

        let plan = EvictionPolicy::default().select(&records, now, &quota(86.0));

        let expected: Vec<String> = (0..10).map(|i| format!("low-{:02}", i)).collect();
        assert_eq!(plan.low_priority, expected);
        assert!(plan.expired.is_empty());
        assert!(!plan.ids().iter().any(|id| id.starts_with("ancient")));
    }

    #[test]
    fn test_at_threshold_is_not_pressure() {
        let now = Utc::now();
        let records = vec![record("low", Priority::Low, 5, false, now)];
        assert!(EvictionPolicy::default().select(&records, now, &quota(85.0)).is_empty());
    }

    #[test]
    fn test_union_does_not_repeat_expired_low_records() {
        let now = Utc::now();
        let records = vec![
            record("old-expired-low", Priority::Low, 50, true, now),
            record("newer-low", Priority::Low, 10, false, now),
        ];

        let plan = EvictionPolicy::default().select(&records, now, &quota(99.0));
        assert_eq!(plan.expired, ["old-expired-low"]);
        assert_eq!(plan.low_priority, ["newer-low"]);
        assert_eq!(plan.len(), 2);
    }
}
