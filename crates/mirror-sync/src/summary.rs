//! Run-scoped counters and failure registry.

use mirror_data::{ChangeCategory, EntityRef};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-entity tally an applier accumulates while walking a plan.
///
/// Merged into the shared [`SyncSummary`] only when the whole entity
/// succeeded; a failing entity contributes nothing to the success counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeTally {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl ChangeTally {
    /// Counts one change. One increment per change, however many versions
    /// the change materializes.
    pub fn record(&mut self, category: ChangeCategory) {
        match category {
            ChangeCategory::Added => self.added += 1,
            ChangeCategory::Updated => self.updated += 1,
            ChangeCategory::Deleted => self.deleted += 1,
        }
    }
}

/// Outcome of one synchronization run.
///
/// Created once per run, shared by every worker, discarded at run end.
/// Counters are atomics because workers merge tallies concurrently; the
/// failure registry is a mutex-guarded set.
#[derive(Debug, Default)]
pub struct SyncSummary {
    added: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
    not_registered: Mutex<BTreeSet<String>>,
}

impl SyncSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one entity's tally. Lock-free.
    pub fn merge(&self, tally: ChangeTally) {
        self.added.fetch_add(tally.added, Ordering::Relaxed);
        self.updated.fetch_add(tally.updated, Ordering::Relaxed);
        self.deleted.fetch_add(tally.deleted, Ordering::Relaxed);
    }

    /// Records an entity that could not be reconciled.
    ///
    /// Returns `false` when the registry itself is unavailable (a poisoned
    /// lock); the caller escalates that to a hard per-entity error without
    /// aborting the run.
    #[must_use]
    pub fn record_failure(&self, entity: &EntityRef) -> bool {
        match self.not_registered.lock() {
            Ok(mut set) => {
                set.insert(entity.failure_key());
                true
            }
            Err(_) => false,
        }
    }

    pub fn added(&self) -> u64 {
        self.added.load(Ordering::Relaxed)
    }

    pub fn updated(&self) -> u64 {
        self.updated.load(Ordering::Relaxed)
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    /// Keys (`kind:perm_id`) of every entity that failed this run.
    pub fn not_registered(&self) -> Vec<String> {
        self.not_registered
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn failure_count(&self) -> usize {
        self.not_registered
            .lock()
            .map(|set| set.len())
            .unwrap_or_default()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Copies current counter values into a fresh summary.
    ///
    /// Used when the run orchestrator hands the summary out of an `Arc`
    /// that something still holds.
    pub fn detached_copy(&self) -> Self {
        let copy = Self::new();
        copy.added.store(self.added(), Ordering::Relaxed);
        copy.updated.store(self.updated(), Ordering::Relaxed);
        copy.deleted.store(self.deleted(), Ordering::Relaxed);
        if let Ok(mut set) = copy.not_registered.lock() {
            set.extend(self.not_registered());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_data::EntityKind;
    use std::sync::Arc;

    #[test]
    fn tallies_merge_into_counters() {
        let summary = SyncSummary::new();
        let mut tally = ChangeTally::default();
        tally.record(ChangeCategory::Added);
        tally.record(ChangeCategory::Updated);
        tally.record(ChangeCategory::Updated);
        tally.record(ChangeCategory::Deleted);
        summary.merge(tally);

        assert_eq!(summary.added(), 1);
        assert_eq!(summary.updated(), 2);
        assert_eq!(summary.deleted(), 1);
        assert!(!summary.has_failures());
    }

    #[test]
    fn failure_registry_deduplicates() {
        let summary = SyncSummary::new();
        let entity = EntityRef::new(EntityKind::Sample, "S-1", "/LAB/S1", true);
        assert!(summary.record_failure(&entity));
        assert!(summary.record_failure(&entity));
        assert_eq!(summary.not_registered(), vec!["sample:S-1".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_merges_lose_nothing() {
        let summary = Arc::new(SyncSummary::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let summary = summary.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    summary.merge(ChangeTally {
                        added: 1,
                        updated: 0,
                        deleted: 0,
                    });
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(summary.added(), 1600);
    }
}
