// Core functionality
pub mod core {
    pub mod config;
    pub mod error;
    pub mod logging;
}

// Password store index
pub mod indexing {
    pub mod discovery;
    pub mod index;
    pub mod watcher;
}

// Query matching
pub mod search {
    pub mod matcher;
}

// Extraction actions
pub mod actions {
    pub mod registry;
}

// Decrypt, extract, deliver
pub mod retrieval {
    pub mod clipboard;
    pub mod notification;
    pub mod pipeline;
}

pub mod runner;

// User interfaces
pub mod ui {
    pub mod cli;
    pub mod tui;
}

// Re-export commonly used types
pub use core::config::{ActionConfig, Settings};
pub use core::error::{Error, Result};
pub use actions::registry::{ActionDescriptor, ActionRegistry, Capture};
pub use indexing::discovery::discover_entries;
pub use indexing::index::{EntryIndex, Snapshot};
pub use indexing::watcher::DirectoryWatcher;
pub use retrieval::clipboard::{Clipboard, MemoryClipboard, SystemClipboard};
pub use retrieval::notification::{DesktopSink, LogSink, NotificationSink};
pub use retrieval::pipeline::{Delivery, RetrievalPipeline};
pub use runner::{PassRunner, QueryMatch};
pub use search::matcher::{Match, QueryMatcher, Relevance};
pub use ui::cli::Cli;
pub use ui::tui::PickerTui;
