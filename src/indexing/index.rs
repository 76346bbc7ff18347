use crate::core::error::Error;
use crate::indexing::discovery::{discover_entries, Discovery};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Immutable view of the password store at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Entry identifiers, sorted
    pub entries: Vec<String>,
    /// Directories that must be watched for this snapshot to stay current
    pub watched_dirs: Vec<PathBuf>,
    /// Number of rebuilds installed before this one (0 for the initial empty snapshot)
    pub generation: u64,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.binary_search_by(|e| e.as_str().cmp(entry)).is_ok()
    }
}

/// In-memory index of the entries under one password store root.
///
/// Published snapshots are never mutated: a rebuild walks the tree into a new
/// `Snapshot` and swaps the pointer under the write lock. Readers clone the
/// `Arc` under the read lock and then work without holding it, so they always
/// see a complete snapshot from before or after a rebuild.
#[derive(Debug)]
pub struct EntryIndex {
    root: PathBuf,
    current: RwLock<Arc<Snapshot>>,
    // Serializes rebuilds so a slow, older walk cannot replace a newer snapshot.
    rebuilding: Mutex<()>,
}

impl EntryIndex {
    /// Create an index with an empty snapshot. Call `rebuild` to populate it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current: RwLock::new(Arc::new(Snapshot::default())),
            rebuilding: Mutex::new(()),
        }
    }

    /// Create and populate an index
    pub fn open(root: impl Into<PathBuf>) -> Arc<Self> {
        let index = Arc::new(Self::new(root));
        index.rebuild();
        index
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The most recently installed snapshot
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Walk the store and install the result as the current snapshot.
    ///
    /// A missing or unreadable root produces an empty snapshot, never an error.
    pub fn rebuild(&self) -> Arc<Snapshot> {
        let _serial = self.rebuilding.lock().unwrap_or_else(PoisonError::into_inner);

        let Discovery { entries, dirs } = match discover_entries(&self.root) {
            Ok(found) => found,
            Err(Error::StoreNotFound(path)) => {
                tracing::warn!("Password store {} does not exist", path.display());
                Discovery::default()
            }
            Err(e) => {
                tracing::warn!("Password store {} is unreadable: {}", self.root.display(), e);
                Discovery::default()
            }
        };

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::new(Snapshot {
            entries,
            watched_dirs: dirs,
            generation: guard.generation + 1,
        });
        *guard = Arc::clone(&snapshot);
        drop(guard);

        tracing::debug!(
            entries = snapshot.entries.len(),
            dirs = snapshot.watched_dirs.len(),
            generation = snapshot.generation,
            "Index rebuilt"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_index_is_empty() {
        let index = EntryIndex::new("/nowhere");
        let snapshot = index.current_snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.generation, 0);
    }

    #[test]
    fn test_rebuild_installs_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bank.gpg"), "x").unwrap();

        let index = EntryIndex::new(temp_dir.path());
        let built = index.rebuild();
        let current = index.current_snapshot();

        assert!(Arc::ptr_eq(&built, &current));
        assert_eq!(current.entries, vec!["bank"]);
        assert!(current.contains("bank"));
        assert!(!current.contains("ban"));
        assert_eq!(current.generation, 1);
    }

    #[test]
    fn test_missing_root_yields_empty_snapshot() {
        let index = EntryIndex::new("/nonexistent/password-store");
        let snapshot = index.rebuild();
        assert!(snapshot.is_empty());
        assert!(snapshot.watched_dirs.is_empty());
        assert_eq!(snapshot.generation, 1);
    }

    #[test]
    fn test_old_snapshot_is_untouched_by_rebuild() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.gpg"), "x").unwrap();

        let index = EntryIndex::open(temp_dir.path());
        let before = index.current_snapshot();

        fs::write(temp_dir.path().join("two.gpg"), "x").unwrap();
        index.rebuild();

        assert_eq!(before.entries, vec!["one"]);
        assert_eq!(index.current_snapshot().entries, vec!["one", "two"]);
    }

    #[test]
    fn test_removed_file_disappears() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.gpg"), "x").unwrap();
        fs::write(temp_dir.path().join("two.gpg"), "x").unwrap();

        let index = EntryIndex::open(temp_dir.path());
        fs::remove_file(temp_dir.path().join("one.gpg")).unwrap();

        assert_eq!(index.rebuild().entries, vec!["two"]);
    }
}
