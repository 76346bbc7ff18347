use crate::actions::registry::{ActionDescriptor, ActionRegistry};
use crate::core::config::Settings;
use crate::core::error::{Error, Result};
use crate::indexing::index::{EntryIndex, Snapshot};
use crate::indexing::watcher::DirectoryWatcher;
use crate::retrieval::clipboard::Clipboard;
use crate::retrieval::notification::NotificationSink;
use crate::retrieval::pipeline::{Delivery, RetrievalPipeline};
use crate::search::matcher::{QueryMatcher, Relevance};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;

/// Icon shown next to every match
pub const MATCH_ICON: &str = "object-locked";

/// A query form the runner understands, for help screens
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub example: &'static str,
    pub description: &'static str,
}

pub const SYNTAXES: &[Syntax] = &[
    Syntax {
        example: ":q:",
        description: "Looks for a password matching :q:. Pressing ENTER copies the password to the clipboard.",
    },
    Syntax {
        example: "pass :q:",
        description: "Looks for a password matching :q:. This way you avoid results from other runners.",
    },
];

/// A match as the host renders it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryMatch {
    pub text: String,
    pub icon: &'static str,
    pub relevance: Relevance,
}

struct Store {
    index: Arc<EntryIndex>,
    // Dropping the watcher stops it, so replacing the store stops the old watch.
    watcher: Option<DirectoryWatcher>,
}

impl Store {
    fn open(settings: &Settings, watch: bool) -> Result<Self> {
        let index = EntryIndex::open(settings.store_dir.clone());
        let watcher = if watch {
            Some(DirectoryWatcher::start(Arc::clone(&index), settings.debounce())?)
        } else {
            None
        };
        Ok(Self {
            index,
            watcher,
        })
    }

    /// Re-walk the store now and have the watcher re-sync its watch set.
    /// Picks up a store that did not exist when it was opened.
    fn refresh(&self) {
        let snapshot = self.index.rebuild();
        tracing::debug!(entries = snapshot.len(), "Store refreshed");
        if let Some(watcher) = &self.watcher {
            watcher.request_rebuild();
        }
    }

    fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watcher
            .as_ref()
            .map(DirectoryWatcher::watched_dirs)
            .unwrap_or_default()
    }
}

/// The interface a launcher host drives: query, list actions, run, reload.
///
/// Queries, reloads and retrievals may come from different threads. Each piece
/// of state sits behind its own lock and is replaced wholesale on reload.
pub struct PassRunner {
    settings: RwLock<Arc<Settings>>,
    actions: RwLock<Arc<ActionRegistry>>,
    store: RwLock<Store>,
    pipeline: RwLock<Arc<RetrievalPipeline>>,
    clipboard: Arc<dyn Clipboard>,
    sink: Arc<dyn NotificationSink>,
    watch: bool,
}

impl PassRunner {
    /// Build the index and, if `watch` is set, start watching the store
    pub fn start(
        settings: Settings,
        clipboard: Arc<dyn Clipboard>,
        sink: Arc<dyn NotificationSink>,
        watch: bool,
    ) -> Result<Self> {
        let store = Store::open(&settings, watch)?;
        let actions = ActionRegistry::load(&settings);
        let pipeline = RetrievalPipeline::new(&settings, Arc::clone(&clipboard), Arc::clone(&sink));

        tracing::info!(
            store = %settings.store_dir.display(),
            entries = store.index.current_snapshot().len(),
            actions = actions.len(),
            "Password store loaded"
        );

        Ok(Self {
            settings: RwLock::new(Arc::new(settings)),
            actions: RwLock::new(Arc::new(actions)),
            store: RwLock::new(store),
            pipeline: RwLock::new(Arc::new(pipeline)),
            clipboard,
            sink,
            watch,
        })
    }

    pub fn syntaxes(&self) -> &'static [Syntax] {
        SYNTAXES
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&*self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn index(&self) -> Arc<EntryIndex> {
        Arc::clone(&self.store.read().unwrap_or_else(PoisonError::into_inner).index)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.index().current_snapshot()
    }

    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .watched_dirs()
    }

    /// Matches for free-text `input`, in store order
    pub fn query(&self, input: &str, single_runner: bool) -> Vec<QueryMatch> {
        QueryMatcher::new(self.index())
            .find(input, single_runner)
            .into_iter()
            .map(|m| QueryMatch {
                text: m.entry,
                icon: MATCH_ICON,
                relevance: m.relevance,
            })
            .collect()
    }

    /// The global action list; empty when actions are disabled
    pub fn actions(&self) -> Arc<ActionRegistry> {
        Arc::clone(&*self.actions.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn actions_for_match(&self, _m: &QueryMatch) -> Vec<ActionDescriptor> {
        self.actions().actions().to_vec()
    }

    fn pipeline(&self) -> Arc<RetrievalPipeline> {
        Arc::clone(&*self.pipeline.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Start a retrieval for a selected match. Must be called inside a tokio runtime.
    pub fn run(&self, m: &QueryMatch, action: Option<&ActionDescriptor>) -> JoinHandle<Result<Delivery>> {
        self.pipeline().spawn(m.text.clone(), action.cloned())
    }

    /// Retrieve `entry` with the action called `action_name`, if any
    pub async fn retrieve(&self, entry: &str, action_name: Option<&str>) -> Result<Delivery> {
        let action = match action_name {
            Some(name) => Some(
                self.actions()
                    .find(name)
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("Unknown action: {}", name)))?,
            ),
            None => None,
        };
        self.pipeline().retrieve(entry, action.as_ref()).await
    }

    /// Re-read configuration and environment and swap everything derived from them
    pub fn reload(&self) -> Result<()> {
        let current = self.settings();
        let fresh = current.reload()?;
        self.apply(fresh)
    }

    /// Install new settings. The store is reopened if its location changed
    /// and refreshed otherwise.
    pub fn apply(&self, settings: Settings) -> Result<()> {
        let current = self.settings();
        if settings.store_dir != current.store_dir || settings.debounce_ms != current.debounce_ms {
            let store = Store::open(&settings, self.watch)?;
            *self.store.write().unwrap_or_else(PoisonError::into_inner) = store;
        } else {
            self.store
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .refresh();
        }

        let actions = ActionRegistry::load(&settings);
        let pipeline = RetrievalPipeline::new(
            &settings,
            Arc::clone(&self.clipboard),
            Arc::clone(&self.sink),
        );

        *self.actions.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(actions);
        *self.pipeline.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(pipeline);
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);

        tracing::info!("Configuration reloaded");
        Ok(())
    }
}
