use crate::core::error::{Error, Result};
use crate::indexing::index::{EntryIndex, Snapshot};
use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdCache,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Called on the rebuild thread after every snapshot the watcher installs
pub type RebuildHook = Box<dyn Fn(&Snapshot) + Send + 'static>;

/// Something that can add and drop per-directory watches
pub trait WatchRegistrar {
    fn watch(&mut self, dir: &Path) -> Result<()>;
    fn unwatch(&mut self, dir: &Path) -> Result<()>;
}

impl<T: Watcher, C: FileIdCache> WatchRegistrar for Debouncer<T, C> {
    fn watch(&mut self, dir: &Path) -> Result<()> {
        self.watcher()
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(format!("Failed to watch {}: {}", dir.display(), e)))
    }

    fn unwatch(&mut self, dir: &Path) -> Result<()> {
        self.watcher()
            .unwatch(dir)
            .map_err(|e| Error::Watch(format!("Failed to unwatch {}: {}", dir.display(), e)))
    }
}

enum WatchMsg {
    Changed(Vec<PathBuf>),
    Rescan,
    Shutdown,
}

/// Keeps an `EntryIndex` current by watching every directory in the store.
///
/// Each directory gets its own non-recursive watch. After every rebuild the
/// watch set is re-derived from the new snapshot: new directories are added
/// and directories that vanished are dropped. Bursts of events are debounced
/// and pending batches are coalesced, so several quick changes usually cost a
/// single rebuild; the last rebuild always reflects the final state.
pub struct DirectoryWatcher {
    tx: Sender<WatchMsg>,
    watched: Arc<Mutex<BTreeSet<PathBuf>>>,
    worker: Option<JoinHandle<()>>,
}

impl DirectoryWatcher {
    /// Start watching the store behind `index`
    pub fn start(index: Arc<EntryIndex>, debounce: Duration) -> Result<Self> {
        Self::start_inner(index, debounce, None)
    }

    /// Like `start`, calling `hook` after every watcher-triggered rebuild
    pub fn start_with_hook<F>(index: Arc<EntryIndex>, debounce: Duration, hook: F) -> Result<Self>
    where
        F: Fn(&Snapshot) + Send + 'static,
    {
        Self::start_inner(index, debounce, Some(Box::new(hook)))
    }

    fn start_inner(
        index: Arc<EntryIndex>,
        debounce: Duration,
        hook: Option<RebuildHook>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events
                        .into_iter()
                        .filter(|e| !matches!(e.event.kind, EventKind::Access(_)))
                        .flat_map(|e| e.event.paths)
                        .collect();
                    if !paths.is_empty() {
                        let _ = event_tx.send(WatchMsg::Changed(paths));
                    }
                }
                Err(errors) => {
                    for e in errors {
                        tracing::warn!("File watcher error: {}", e);
                    }
                }
            }
        })
        .map_err(|e| Error::Watch(format!("Failed to create file watcher: {}", e)))?;

        let snapshot = if index.current_snapshot().generation == 0 {
            index.rebuild()
        } else {
            index.current_snapshot()
        };

        let watched = Arc::new(Mutex::new(BTreeSet::new()));
        {
            let mut set = watched.lock().unwrap_or_else(PoisonError::into_inner);
            sync_watches(&mut debouncer, &mut set, &snapshot.watched_dirs);
        }

        let worker_watched = Arc::clone(&watched);
        let worker = std::thread::Builder::new()
            .name("passrun-rebuild".to_string())
            .spawn(move || {
                rebuild_loop(&index, &mut debouncer, &worker_watched, &rx, hook.as_ref());
            })?;

        Ok(Self {
            tx,
            watched,
            worker: Some(worker),
        })
    }

    /// Directories currently registered with the OS watcher
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Queue a rebuild as if the store had changed
    pub fn request_rebuild(&self) {
        let _ = self.tx.send(WatchMsg::Rescan);
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        let _ = self.tx.send(WatchMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Drain change notifications, rebuilding once per coalesced batch.
/// Returns the number of rebuilds performed.
fn rebuild_loop<R: WatchRegistrar>(
    index: &EntryIndex,
    registrar: &mut R,
    watched: &Mutex<BTreeSet<PathBuf>>,
    rx: &Receiver<WatchMsg>,
    hook: Option<&RebuildHook>,
) -> u64 {
    let mut rebuilds = 0;

    while let Ok(msg) = rx.recv() {
        let mut changed = match msg {
            WatchMsg::Changed(paths) => paths,
            WatchMsg::Rescan => Vec::new(),
            WatchMsg::Shutdown => break,
        };

        let mut shutdown = false;
        while let Ok(pending) = rx.try_recv() {
            match pending {
                WatchMsg::Changed(paths) => changed.extend(paths),
                WatchMsg::Rescan => {}
                WatchMsg::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
        }
        if shutdown {
            break;
        }

        tracing::debug!(paths = changed.len(), "Password store changed, rebuilding index");
        let snapshot = index.rebuild();
        rebuilds += 1;
        {
            let mut set = watched.lock().unwrap_or_else(PoisonError::into_inner);
            sync_watches(registrar, &mut set, &snapshot.watched_dirs);
        }

        if let Some(hook) = hook {
            hook(&snapshot);
        }
    }

    rebuilds
}

/// Make the registered set equal to `wanted`
fn sync_watches<R: WatchRegistrar>(
    registrar: &mut R,
    watched: &mut BTreeSet<PathBuf>,
    wanted: &[PathBuf],
) {
    let wanted: BTreeSet<&PathBuf> = wanted.iter().collect();

    let stale: Vec<PathBuf> = watched
        .iter()
        .filter(|dir| !wanted.contains(dir))
        .cloned()
        .collect();
    for dir in stale {
        // Usually fails because the directory is already gone, which is fine.
        if let Err(e) = registrar.unwatch(&dir) {
            tracing::debug!("{}", e);
        }
        watched.remove(&dir);
    }

    for dir in wanted {
        if watched.contains(dir) {
            continue;
        }
        match registrar.watch(dir) {
            Ok(()) => {
                watched.insert(dir.clone());
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
}
