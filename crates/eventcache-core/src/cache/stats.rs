use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::quota::StorageQuota;
use crate::models::ContentType;

/// Snapshot of what the cache holds. Produced without side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_records: usize,
    pub by_type: BTreeMap<ContentType, usize>,
    pub pending_sync: usize,
    /// Sum of each record's JSON length.
    pub total_bytes: u64,
    pub quota: StorageQuota,
    pub newest_created_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    pub fn count(&self, content_type: ContentType) -> usize {
        self.by_type.get(&content_type).copied().unwrap_or(0)
    }

    /// Age of the most recent write, e.g. "5m ago", or "never".
    pub fn last_updated(&self, now: DateTime<Utc>) -> String {
        self.newest_created_at
            .map(|at| Self::age_label(now - at))
            .unwrap_or_else(|| "never".to_string())
    }

    /// Coarsest whole unit, rounded to nearest. Negative ages (clock skew)
    /// read as "just now".
    fn age_label(age: Duration) -> String {
        const HOUR: i64 = 60;
        const DAY: i64 = 24 * HOUR;
        match age.num_minutes() {
            m if m < 1 => "just now".to_string(),
            m if m < HOUR => format!("{}m ago", m),
            m if m < DAY => format!("{}h ago", (m + HOUR / 2) / HOUR),
            m => format!("{}d ago", (m + DAY / 2) / DAY),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_label_rounds_to_nearest_unit() {
        let label = |mins: i64| CacheStats::age_label(Duration::minutes(mins));
        assert_eq!(label(-3), "just now");
        assert_eq!(label(0), "just now");
        assert_eq!(label(5), "5m ago");
        assert_eq!(label(89), "1h ago");
        assert_eq!(label(90), "2h ago");
        assert_eq!(label(1440 + 11 * 60), "1d ago");
        assert_eq!(label(1440 + 12 * 60), "2d ago");
    }

    #[test]
    fn test_last_updated() {
        let now = Utc::now();
        let mut stats = CacheStats {
            total_records: 0,
            by_type: BTreeMap::new(),
            pending_sync: 0,
            total_bytes: 0,
            quota: StorageQuota::default(),
            newest_created_at: None,
        };
        assert_eq!(stats.last_updated(now), "never");

        stats.newest_created_at = Some(now - Duration::minutes(5));
        assert_eq!(stats.last_updated(now), "5m ago");
        assert_eq!(stats.count(ContentType::Schedule), 0);
    }
}
