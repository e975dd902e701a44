use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::db::{Db, FileId};
use crate::model::IndexFile;
use crate::update::IndexUpdate;

/// Read handle on the entity store shared with query callers.
#[derive(Debug, Clone)]
pub struct SharedIndex(Arc<RwLock<Db>>);

impl SharedIndex {
    /// Readers see the state between merges, never a partial merge.
    pub fn read(&self) -> RwLockReadGuard<'_, Db> {
        self.0.read()
    }
}

/// Result of handing a parse result to the [`MergeEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied {
        file_id: FileId,
        entities_changed: usize,
        entities_removed: usize,
    },
    /// A newer generation of the same file was already merged.
    Superseded { latest: u64 },
}

#[derive(Debug, Clone)]
struct Snapshot {
    generation: u64,
    /// `None` once the file has been retracted.
    index: Option<Arc<IndexFile>>,
}

/// Owns the single writer lock over the entity store and the last merged parse
/// result of every file.
///
/// Lock order is snapshots, then the store.
#[derive(Debug)]
pub struct MergeEngine {
    db: Arc<RwLock<Db>>,
    snapshots: Mutex<HashMap<String, Snapshot>>,
    reject_stale_merges: bool,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MergeEngine {
    /// With `reject_stale_merges`, a result whose generation is older than the
    /// last merged one for the same file is dropped; without it the last result
    /// to complete wins.
    pub fn new(reject_stale_merges: bool) -> Self {
        Self {
            db: Arc::new(RwLock::new(Db::new())),
            snapshots: Mutex::new(HashMap::new()),
            reject_stale_merges,
        }
    }

    pub fn shared(&self) -> SharedIndex {
        SharedIndex(Arc::clone(&self.db))
    }

    /// The last merged parse result for `path`, if the file is currently indexed.
    pub fn snapshot(&self, path: &str) -> Option<Arc<IndexFile>> {
        self.snapshots
            .lock()
            .get(path)
            .and_then(|snapshot| snapshot.index.clone())
    }

    /// Replace everything `file.path` contributed with `file`.
    pub fn merge(&self, generation: u64, file: IndexFile) -> MergeOutcome {
        let path = file.path.clone();
        self.apply(generation, &path, Some(Arc::new(file)))
    }

    /// Retract everything `path` contributed, as if it were merged empty.
    pub fn remove_file(&self, generation: u64, path: &str) -> MergeOutcome {
        self.apply(generation, path, None)
    }

    fn apply(&self, generation: u64, path: &str, next: Option<Arc<IndexFile>>) -> MergeOutcome {
        let mut snapshots = self.snapshots.lock();
        let prev = snapshots.get(path);
        if let Some(prev) = prev {
            if self.reject_stale_merges && generation < prev.generation {
                tracing::debug!(
                    target: "lodestar.index",
                    path,
                    generation,
                    latest = prev.generation,
                    "dropping superseded parse result"
                );
                return MergeOutcome::Superseded {
                    latest: prev.generation,
                };
            }
        }

        let prev_index = prev.and_then(|prev| prev.index.as_deref());
        let update = match next.as_deref() {
            Some(file) => IndexUpdate::create_delta(prev_index, file),
            None => IndexUpdate::retract(path, prev_index),
        };

        let stats = self.db.write().apply_index_update(&update);
        let latest = prev.map_or(generation, |prev| prev.generation.max(generation));
        snapshots.insert(
            path.to_string(),
            Snapshot {
                generation: latest,
                index: next,
            },
        );

        tracing::debug!(
            target: "lodestar.index",
            path,
            generation,
            changed = stats.entities_changed,
            removed = stats.entities_removed,
            "merged file"
        );

        MergeOutcome::Applied {
            file_id: stats.file_id,
            entities_changed: stats.entities_changed,
            entities_removed: stats.entities_removed,
        }
    }
}
