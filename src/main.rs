use anyhow::{Context, Result};
use clap::Parser;
use passrun::core::logging::{self, LogTarget};
use passrun::retrieval::notification::copied_message;
use passrun::ui::cli::{Cli, Commands};
use passrun::{
    ActionRegistry, Clipboard, Delivery, DesktopSink, DirectoryWatcher, EntryIndex, LogSink,
    NotificationSink, PassRunner, PickerTui, RetrievalPipeline, Settings, SystemClipboard,
};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let target = match cli.command {
        None => LogTarget::File(logging::default_log_file()),
        Some(_) => LogTarget::Stderr,
    };
    logging::init(&target, cli.verbose)?;

    let mut settings = Settings::load(cli.config.clone()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.store_dir {
        settings = settings.with_store_dir(dir);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    match cli.command {
        None => handle_picker(settings, &runtime),
        Some(Commands::Query { text, single, json }) => handle_query(settings, &text, single, json),
        Some(Commands::List) => handle_list(settings),
        Some(Commands::Actions { json }) => handle_actions(&settings, json),
        Some(Commands::Copy { entry, action, quiet }) => {
            runtime.block_on(handle_copy(settings, &entry, action.as_deref(), quiet))
        }
        Some(Commands::Watch) => runtime.block_on(handle_watch(settings)),
    }
}

fn handle_picker(settings: Settings, runtime: &tokio::runtime::Runtime) -> Result<()> {
    let clipboard = SystemClipboard::new().context("No clipboard available")?;
    let runner = PassRunner::start(
        settings,
        Arc::new(clipboard),
        Arc::new(DesktopSink::default()),
        true,
    )
    .context("Failed to open password store")?;

    let mut tui = PickerTui::new(Arc::new(runner), runtime.handle().clone());
    tui.run()?;
    Ok(())
}

fn open_runner(settings: Settings) -> Result<PassRunner> {
    // One-shot commands have no clipboard or notification needs.
    PassRunner::start(
        settings,
        Arc::new(passrun::MemoryClipboard::new()),
        Arc::new(LogSink),
        false,
    )
    .context("Failed to open password store")
}

fn handle_query(settings: Settings, text: &str, single: bool, json: bool) -> Result<()> {
    let runner = open_runner(settings)?;
    let matches = runner.query(text, single);

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No matching entries.");
        for syntax in runner.syntaxes() {
            println!("  {:<10} {}", syntax.example, syntax.description);
        }
        return Ok(());
    }

    for m in &matches {
        println!("{:<8} {}", format!("{:?}", m.relevance).to_lowercase(), m.text);
    }
    Ok(())
}

fn handle_list(settings: Settings) -> Result<()> {
    let store_dir = settings.store_dir.clone();
    let runner = open_runner(settings)?;
    let snapshot = runner.snapshot();

    if snapshot.is_empty() {
        eprintln!("No entries found in {}", store_dir.display());
        return Ok(());
    }
    for entry in &snapshot.entries {
        println!("{}", entry);
    }
    Ok(())
}

fn handle_actions(settings: &Settings, json: bool) -> Result<()> {
    let registry = ActionRegistry::load(settings);

    if json {
        println!("{}", serde_json::to_string_pretty(registry.actions())?);
        return Ok(());
    }

    if registry.is_empty() {
        let config = settings
            .config_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "config.yaml".to_string());
        println!("No actions enabled. Set `show_actions: true` in {}", config);
        return Ok(());
    }
    for action in registry.actions() {
        println!("{} ({})", action.name, action.icon);
    }
    Ok(())
}

async fn handle_copy(settings: Settings, entry: &str, action: Option<&str>, quiet: bool) -> Result<()> {
    let action = match action {
        Some(name) => Some(
            ActionRegistry::load(&settings)
                .find(name)
                .cloned()
                .with_context(|| format!("Unknown action: {}", name))?,
        ),
        None => None,
    };

    let clipboard: Arc<dyn Clipboard> =
        Arc::new(SystemClipboard::new().context("No clipboard available")?);
    let sink: Arc<dyn NotificationSink> = if quiet {
        Arc::new(LogSink)
    } else {
        Arc::new(DesktopSink::default())
    };
    let pipeline = RetrievalPipeline::new(&settings, clipboard, sink);

    let delivery = pipeline
        .retrieve(entry, action.as_ref())
        .await
        .with_context(|| format!("Failed to retrieve {}", entry))?;

    match delivery {
        Delivery::Displayed { content, .. } => print!("{}", content),
        Delivery::Copied {
            entry,
            action,
            clear_task,
        } => {
            println!("{}", copied_message(&entry, action.as_deref(), pipeline.clip_timeout()));
            // The clipboard is served by this process, so stay alive until it is cleared.
            clear_task.await.context("Clipboard clear task failed")?;
        }
    }
    Ok(())
}

async fn handle_watch(settings: Settings) -> Result<()> {
    println!("Watching password store: {}", settings.store_dir.display());

    let index = EntryIndex::open(settings.store_dir.clone());
    let watcher = DirectoryWatcher::start_with_hook(Arc::clone(&index), settings.debounce(), |snapshot| {
        tracing::info!(
            generation = snapshot.generation,
            entries = snapshot.len(),
            dirs = snapshot.watched_dirs.len(),
            "Index rebuilt"
        );
        println!("Index rebuilt: {} entries", snapshot.len());
    })
    .context("Failed to start watching")?;

    println!(
        "Indexed {} entries, watching {} directories. Press Ctrl-C to stop.",
        index.current_snapshot().len(),
        watcher.watched_dirs().len()
    );

    tokio::signal::ctrl_c().await?;
    drop(watcher);
    println!("Stopped.");
    Ok(())
}
