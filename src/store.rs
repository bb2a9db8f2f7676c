//! Per-child state store
//!
//! Explicit keyed store replacing ambient per-child globals. Events for
//! different children proceed fully in parallel; within one child, the
//! trend tracker and crisis machine are guarded by a per-child mutex so
//! rolling-window updates and state-machine transitions are single-writer.
//! Diagnostic reads take cloned snapshots and never hold the write lock.

use crate::crisis::CrisisMachine;
use crate::trend::TrendTracker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Cross-event mutable state for one child
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildState {
    pub tracker: TrendTracker,
    pub crisis: CrisisMachine,
}

/// Keyed store with single-writer-per-child discipline
#[derive(Default)]
pub struct ChildStateStore {
    children: RwLock<HashMap<String, Arc<Mutex<ChildState>>>>,
}

impl ChildStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to one child's state, creating it on first touch.
    ///
    /// The caller locks the returned mutex for the duration of its update;
    /// the outer map lock is held only long enough to fetch the handle.
    pub fn entry(&self, child_id: &str) -> Arc<Mutex<ChildState>> {
        if let Some(state) = self
            .children
            .read()
            .expect("child map poisoned")
            .get(child_id)
        {
            return Arc::clone(state);
        }

        let mut map = self.children.write().expect("child map poisoned");
        Arc::clone(
            map.entry(child_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ChildState::default()))),
        )
    }

    /// Cloned snapshot of one child's state, for diagnostics
    pub fn snapshot(&self, child_id: &str) -> Option<ChildState> {
        let handle = {
            let map = self.children.read().expect("child map poisoned");
            map.get(child_id).cloned()
        };
        handle.map(|state| state.lock().expect("child state poisoned").clone())
    }

    /// Child ids currently tracked
    pub fn child_ids(&self) -> Vec<String> {
        self.children
            .read()
            .expect("child map poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendConfig;
    use chrono::Utc;
    use std::thread;

    #[test]
    fn test_entry_creates_then_reuses() {
        let store = ChildStateStore::new();
        let a = store.entry("c1");
        let b = store.entry("c1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.child_ids(), vec!["c1".to_string()]);
    }

    #[test]
    fn test_snapshot_is_decoupled_from_live_state() {
        let store = ChildStateStore::new();
        let config = TrendConfig::default();

        {
            let handle = store.entry("c1");
            let mut state = handle.lock().unwrap();
            state.tracker.record(0.4, Utc::now(), &config);
        }

        let snapshot = store.snapshot("c1").unwrap();
        assert_eq!(snapshot.tracker.len(), 1);

        // Mutating the live state does not affect the snapshot
        {
            let handle = store.entry("c1");
            let mut state = handle.lock().unwrap();
            state.tracker.record(0.5, Utc::now(), &config);
        }
        assert_eq!(snapshot.tracker.len(), 1);
        assert_eq!(store.snapshot("c1").unwrap().tracker.len(), 2);
    }

    #[test]
    fn test_unknown_child_has_no_snapshot() {
        let store = ChildStateStore::new();
        assert!(store.snapshot("missing").is_none());
    }

    #[test]
    fn test_concurrent_updates_from_many_threads() {
        let store = Arc::new(ChildStateStore::new());
        let config = TrendConfig::default();
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = Arc::clone(&store);
            let config = config.clone();
            handles.push(thread::spawn(move || {
                let child = format!("child-{}", t % 2);
                for _ in 0..50 {
                    let handle = store.entry(&child);
                    let mut state = handle.lock().unwrap();
                    state.tracker.record(0.3, Utc::now(), &config);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // No lost updates: both children saw all their writes, bounded by
        // the window cap
        for child in ["child-0", "child-1"] {
            let snapshot = store.snapshot(child).unwrap();
            assert_eq!(snapshot.tracker.len(), config.max_entries);
        }
    }
}
