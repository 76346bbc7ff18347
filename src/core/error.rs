use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Password store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Failed to launch {program}: {source}")]
    CommandLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decrypting {entry} failed (exit code {code:?})")]
    Decrypt { entry: String, code: Option<i32> },

    #[error("Action \"{action}\" found nothing in {entry}")]
    PatternMiss { action: String, entry: String },

    #[error("Action \"{action}\" has an invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        action: String,
        pattern: String,
        reason: String,
    },

    #[error("No secret found in {0}")]
    EmptySecret(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

impl Error {
    /// Failures that end a single retrieval attempt before anything reaches
    /// the clipboard
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(
            self,
            Error::CommandLaunch { .. }
                | Error::Decrypt { .. }
                | Error::PatternMiss { .. }
                | Error::InvalidPattern { .. }
                | Error::EmptySecret(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
