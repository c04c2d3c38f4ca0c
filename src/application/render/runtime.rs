use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-composition async locks.
///
/// Two requests for the same composition run check-render-record-prune one
/// after the other; different compositions proceed in parallel. Entries are
/// dropped once nobody holds or waits on them.
#[derive(Default, Clone)]
pub struct CompositionLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl CompositionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, composition_id: &str) -> CompositionGuard {
        let lock = self
            .locks
            .entry(composition_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let held = lock.lock_owned().await;
        CompositionGuard {
            composition_id: composition_id.to_string(),
            locks: Arc::clone(&self.locks),
            held: Some(held),
        }
    }

    /// Number of compositions with a live lock entry.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

pub struct CompositionGuard {
    composition_id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for CompositionGuard {
    fn drop(&mut self) {
        // Release first so the map entry is the only remaining reference if nobody waits.
        self.held.take();
        self.locks
            .remove_if(&self.composition_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
