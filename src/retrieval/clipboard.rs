use crate::core::error::{Error, Result};
#[cfg(target_os = "linux")]
use arboard::SetExtLinux;
#[cfg(windows)]
use arboard::SetExtWindows;
use std::sync::{Mutex, PoisonError};

/// The shared clipboard. Last writer wins.
pub trait Clipboard: Send + Sync {
    /// Put a secret on the clipboard, flagged so clipboard managers skip it
    fn set_secret(&self, text: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// The desktop clipboard, via `arboard`.
///
/// On X11 and Wayland the contents are served by this process, so keep the
/// value alive for as long as the secret should stay available.
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| Error::Clipboard(format!("Failed to open clipboard: {}", e)))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

impl Clipboard for SystemClipboard {
    fn set_secret(&self, text: &str) -> Result<()> {
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let set = clipboard.set();
        // No history hint exists on macOS.
        #[cfg(any(target_os = "linux", windows))]
        let set = set.exclude_from_history();
        set.text(text.to_string())
            .map_err(|e| Error::Clipboard(format!("Failed to set clipboard: {}", e)))
    }

    fn clear(&self) -> Result<()> {
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        clipboard
            .clear()
            .map_err(|e| Error::Clipboard(format!("Failed to clear clipboard: {}", e)))
    }
}

/// Process-local clipboard for headless use and tests
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    contents: Option<String>,
    writes: usize,
    clears: usize,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.lock().contents.clone()
    }

    /// Number of `set_secret` calls so far
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Number of `clear` calls so far
    pub fn clears(&self) -> usize {
        self.lock().clears
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clipboard for MemoryClipboard {
    fn set_secret(&self, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.contents = Some(text.to_string());
        state.writes += 1;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        state.contents = None;
        state.clears += 1;
        Ok(())
    }
}
