use passrun::{DirectoryWatcher, EntryIndex, Snapshot};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DEBOUNCE: Duration = Duration::from_millis(100);
const WAIT: Duration = Duration::from_secs(10);

/// Poll until `done` holds for the current snapshot, or give up after `WAIT`
fn wait_for(index: &EntryIndex, done: impl Fn(&Snapshot) -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < WAIT {
        if done(&index.current_snapshot()) {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_new_entry_in_subdirectory_is_indexed() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("email")).unwrap();
    fs::write(temp_dir.path().join("email/work.gpg"), "x").unwrap();

    let index = EntryIndex::open(temp_dir.path());
    let rebuilds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rebuilds);
    let watcher = DirectoryWatcher::start_with_hook(Arc::clone(&index), DEBOUNCE, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert!(watcher
        .watched_dirs()
        .contains(&temp_dir.path().join("email")));

    fs::write(temp_dir.path().join("email/new.gpg"), "x").unwrap();

    assert!(wait_for(&index, |s| s.contains("email/new")));

    // Let any stragglers through the debouncer before counting.
    thread::sleep(DEBOUNCE * 5);
    assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
    assert!(index.current_snapshot().contains("email/new"));
}

#[test]
fn test_new_directory_is_watched_after_rebuild() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("bank.gpg"), "x").unwrap();

    let index = EntryIndex::open(temp_dir.path());
    let watcher = DirectoryWatcher::start(Arc::clone(&index), DEBOUNCE).unwrap();

    let web = temp_dir.path().join("web");
    fs::create_dir_all(&web).unwrap();
    assert!(wait_for(&index, |_| watcher.watched_dirs().contains(&web)));
    assert!(index.current_snapshot().watched_dirs.contains(&web));

    // A file added inside the new directory is seen through its own watch.
    fs::write(web.join("forum.gpg"), "x").unwrap();
    assert!(wait_for(&index, |s| s.contains("web/forum")));
}

#[test]
fn test_removed_entry_disappears() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("bank.gpg"), "x").unwrap();
    fs::write(temp_dir.path().join("old.gpg"), "x").unwrap();

    let index = EntryIndex::open(temp_dir.path());
    let _watcher = DirectoryWatcher::start(Arc::clone(&index), DEBOUNCE).unwrap();

    fs::remove_file(temp_dir.path().join("old.gpg")).unwrap();
    assert!(wait_for(&index, |s| !s.contains("old") && s.contains("bank")));
}

#[test]
fn test_request_rebuild_and_drop() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("bank.gpg"), "x").unwrap();

    let index = EntryIndex::open(temp_dir.path());
    let before = index.current_snapshot().generation;
    let watcher = DirectoryWatcher::start(Arc::clone(&index), DEBOUNCE).unwrap();

    watcher.request_rebuild();
    assert!(wait_for(&index, |s| s.generation > before));

    // Dropping joins the worker; the index stays usable.
    drop(watcher);
    assert!(index.current_snapshot().contains("bank"));
}
