use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the password store location
pub const ENV_STORE_DIR: &str = "PASSWORD_STORE_DIR";
/// Overrides the clipboard auto-clear timeout, in whole seconds
pub const ENV_CLIP_TIME: &str = "PASSWORD_STORE_CLIP_TIME";
/// Overrides the path-segment prefix that marks one-time-password entries
pub const ENV_OTP_IDENTIFIER: &str = "PASSWORD_STORE_OTP_IDENTIFIER";

pub const DEFAULT_CLIP_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_OTP_IDENTIFIER: &str = "totp::";
pub const DEFAULT_PASS_COMMAND: &str = "pass";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// One configured extraction action, in the order the user listed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub regex: String,
}

/// Shape of `config.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    store_dir: Option<PathBuf>,
    clip_timeout: Option<u64>,
    otp_identifier: Option<String>,
    show_actions: bool,
    show_file_content_action: bool,
    notify_failures: bool,
    pass_command: Option<String>,
    debounce_ms: Option<u64>,
    actions: Vec<ActionConfig>,
}

/// Runtime settings for passrun
///
/// Loaded once at startup and again on every explicit reload. A reload builds
/// a fresh value; callers swap it in wholesale instead of patching fields.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the password store
    pub store_dir: PathBuf,
    /// Seconds a copied secret stays on the clipboard
    pub clip_timeout: u64,
    /// Path-segment prefix that switches retrieval to `pass otp show`
    pub otp_identifier: String,
    /// Offer the configured extraction actions on every match
    pub show_actions: bool,
    /// Offer the synthetic "show password file contents" action
    pub show_file_content_action: bool,
    /// Configured extraction actions, in presentation order
    pub actions: Vec<ActionConfig>,
    /// Surface decrypt failures and pattern misses as notifications
    pub notify_failures: bool,
    /// Program invoked to decrypt an entry
    pub pass_command: String,
    /// Quiet period before a burst of filesystem events triggers a rebuild
    pub debounce_ms: u64,
    /// File the settings were read from, if any
    pub config_path: Option<PathBuf>,
    store_dir_override: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: Self::default_store_dir(),
            clip_timeout: DEFAULT_CLIP_TIMEOUT_SECS,
            otp_identifier: DEFAULT_OTP_IDENTIFIER.to_string(),
            show_actions: false,
            show_file_content_action: false,
            actions: Vec::new(),
            notify_failures: false,
            pass_command: DEFAULT_PASS_COMMAND.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            config_path: None,
            store_dir_override: None,
        }
    }
}

impl Settings {
    /// `~/.password-store`, or a relative fallback when there is no home directory
    pub fn default_store_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".password-store"))
            .unwrap_or_else(|| PathBuf::from(".password-store"))
    }

    /// `<config dir>/passrun/config.yaml`
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
            .map(|dir| dir.join("passrun").join("config.yaml"))
    }

    /// Load settings from the config file and the process environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Load settings with an explicit environment lookup.
    ///
    /// Precedence, lowest first: defaults, config file, environment.
    pub fn load_with_env<F>(config_path: Option<PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match config_path {
            Some(path) => Some(path),
            None => Self::default_config_path().ok(),
        };

        let file = match path.as_deref() {
            Some(path) if path.exists() => read_file_config(path)?,
            _ => FileConfig::default(),
        };

        let mut settings = Self::default();
        settings.apply_file(file);
        settings.apply_env(env);
        settings.config_path = path;
        Ok(settings)
    }

    /// Pin the store directory, e.g. from `--store-dir`. Survives reloads.
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.store_dir = dir.clone();
        self.store_dir_override = Some(dir);
        self
    }

    /// Re-read the config file and environment
    pub fn reload(&self) -> Result<Self> {
        self.reload_with_env(|key| std::env::var(key).ok())
    }

    pub fn reload_with_env<F>(&self, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fresh = Self::load_with_env(self.config_path.clone(), env)?;
        Ok(match &self.store_dir_override {
            Some(dir) => fresh.with_store_dir(dir.clone()),
            None => fresh,
        })
    }

    pub fn clip_duration(&self) -> Duration {
        Duration::from_secs(self.clip_timeout)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(dir) = file.store_dir {
            self.store_dir = dir;
        }
        if let Some(timeout) = file.clip_timeout {
            self.clip_timeout = timeout;
        }
        if let Some(otp) = file.otp_identifier {
            self.otp_identifier = otp;
        }
        if let Some(command) = file.pass_command {
            self.pass_command = command;
        }
        if let Some(debounce) = file.debounce_ms {
            self.debounce_ms = debounce;
        }
        self.show_actions = file.show_actions;
        self.show_file_content_action = file.show_file_content_action;
        self.notify_failures = file.notify_failures;
        self.actions = file.actions;
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env(ENV_STORE_DIR).filter(|dir| !dir.is_empty()) {
            self.store_dir = PathBuf::from(dir);
        }

        if let Some(raw) = env(ENV_CLIP_TIME) {
            match raw.trim().parse::<u64>() {
                Ok(timeout) => self.clip_timeout = timeout,
                Err(_) => tracing::debug!(value = %raw, "ignoring unparseable {}", ENV_CLIP_TIME),
            }
        }

        if let Some(otp) = env(ENV_OTP_IDENTIFIER) {
            self.otp_identifier = otp;
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&raw).map_err(|e| {
        tracing::warn!(path = %path.display(), "Config file is not valid");
        Error::Yaml(e)
    })
}
