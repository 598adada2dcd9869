use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ids of pending submissions the queue is actively retrying.
///
/// This is a derived index over the store's `syncStatus = pending` bucket.
/// It is never persisted; `SyncQueue::initialize` rebuilds it after a
/// restart and the store wins any disagreement. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    ids: Arc<Mutex<BTreeSet<String>>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns false if the id was already tracked.
    pub fn insert(&self, id: &str) -> bool {
        self.lock().insert(id.to_string())
    }

    /// Returns false if the id was not tracked.
    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current members, in id order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Swap the whole membership for `ids`.
    pub fn replace(&self, ids: impl IntoIterator<Item = String>) {
        *self.lock() = ids.into_iter().collect();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_membership() {
        let set = WorkingSet::new();
        let other = set.clone();

        assert!(set.insert("contact_1"));
        assert!(!other.insert("contact_1"));
        assert!(other.contains("contact_1"));

        other.replace(vec!["b".to_string(), "a".to_string()]);
        assert_eq!(set.snapshot(), ["a", "b"]);

        set.clear();
        assert!(other.is_empty());
    }
}
