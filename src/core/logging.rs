use super::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Where log lines go
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Standard error, for one-shot subcommands
    Stderr,
    /// Append to a file, so the interactive picker keeps the terminal to itself
    File(PathBuf),
}

/// Default log file for the interactive picker
pub fn default_log_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("passrun")
        .join("passrun.log")
}

fn filter_for(verbosity: u8) -> EnvFilter {
    let default_level = match verbosity {
        0 => "passrun=warn",
        1 => "passrun=info",
        2 => "passrun=debug",
        _ => "passrun=trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init(target: &LogTarget, verbosity: u8) -> Result<()> {
    let filter = filter_for(verbosity);

    let installed = match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
    };

    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?)
}
