use crate::core::error::{Error, Result};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Suffix `pass` gives every encrypted entry
pub const ENTRY_SUFFIX: &str = "gpg";

/// Result of one walk over the password store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Entry identifiers, sorted and unique
    pub entries: Vec<String>,
    /// Every directory seen, the root included
    pub dirs: Vec<PathBuf>,
}

/// Walk the store and collect entry identifiers plus the directories to watch.
///
/// Hidden files and directories (`.git`, `.gpg-id`, ...) are skipped.
/// Unreadable subtrees are logged and left out; the rest of the walk continues.
pub fn discover_entries(root: &Path) -> Result<Discovery> {
    if !root.exists() {
        return Err(Error::StoreNotFound(root.to_path_buf()));
    }

    if !root.is_dir() {
        return Err(Error::Config(format!(
            "Password store is not a directory: {}",
            root.display()
        )));
    }

    let mut entries = BTreeSet::new();
    let mut dirs = BTreeSet::new();

    // Plain recursive walk: no ignore files, only skip dotfiles like `pass` does.
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .build();

    for result in walker {
        match result {
            Ok(entry) => {
                let path = entry.path();

                if path.is_dir() {
                    dirs.insert(path.to_path_buf());
                    continue;
                }

                if !is_entry_file(path) {
                    continue;
                }

                if let Some(id) = entry_id(root, path) {
                    entries.insert(id);
                }
            }
            Err(err) => {
                tracing::warn!("Failed to access path in password store: {}", err);
            }
        }
    }

    Ok(Discovery {
        entries: entries.into_iter().collect(),
        dirs: dirs.into_iter().collect(),
    })
}

/// A regular file whose extension is exactly `gpg`
pub fn is_entry_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == ENTRY_SUFFIX)
            .unwrap_or(false)
}

/// Identifier for `path` relative to `root`: `/`-separated, suffix stripped.
pub fn entry_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }

    let joined = parts.join("/");
    let id = joined.strip_suffix(&format!(".{}", ENTRY_SUFFIX))?;
    if id.is_empty() || id.ends_with('/') {
        return None;
    }
    Some(id.to_string())
}
