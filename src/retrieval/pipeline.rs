use crate::actions::registry::{ActionDescriptor, Capture};
use crate::core::config::{Settings, ENV_STORE_DIR};
use crate::core::error::{Error, Result};
use crate::retrieval::clipboard::Clipboard;
use crate::retrieval::notification::NotificationSink;
use regex::RegexBuilder;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// What a successful retrieval produced
#[derive(Debug)]
pub enum Delivery {
    /// A secret is on the clipboard. `clear_task` finishes once it has been wiped.
    Copied {
        entry: String,
        action: Option<String>,
        clear_task: JoinHandle<()>,
    },
    /// The decrypted file, to be shown to the user verbatim
    Displayed { entry: String, content: String },
}

/// What extraction pulled out of decrypted output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Secret(String),
    Content(String),
}

/// Decrypts an entry with `pass`, extracts the secret and hands it to the
/// clipboard with a timed clear.
///
/// `retrieve` is async and never blocks the calling thread; `spawn` runs it on
/// the tokio runtime, so its continuation runs on a runtime worker thread.
/// Retrievals are independent: nothing serializes two of them, and a later
/// copy does not cancel the clear scheduled by an earlier one.
pub struct RetrievalPipeline {
    pass_command: String,
    store_dir: PathBuf,
    otp_identifier: String,
    clip_timeout: Duration,
    notify_failures: bool,
    clipboard: Arc<dyn Clipboard>,
    sink: Arc<dyn NotificationSink>,
}

impl RetrievalPipeline {
    pub fn new(
        settings: &Settings,
        clipboard: Arc<dyn Clipboard>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pass_command: settings.pass_command.clone(),
            store_dir: settings.store_dir.clone(),
            otp_identifier: settings.otp_identifier.clone(),
            clip_timeout: settings.clip_duration(),
            notify_failures: settings.notify_failures,
            clipboard,
            sink,
        }
    }

    pub fn clip_timeout(&self) -> Duration {
        self.clip_timeout
    }

    /// True if any path segment of `entry` starts with the OTP identifier
    pub fn is_otp(&self, entry: &str) -> bool {
        is_otp_entry(entry, &self.otp_identifier)
    }

    /// Arguments for the decrypt command: `[otp] show <entry>`
    pub fn command_args(&self, entry: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if self.is_otp(entry) {
            args.push("otp".to_string());
        }
        args.push("show".to_string());
        args.push(entry.to_string());
        args
    }

    /// Run the pipeline as a background task
    pub fn spawn(
        self: &Arc<Self>,
        entry: String,
        action: Option<ActionDescriptor>,
    ) -> JoinHandle<Result<Delivery>> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.retrieve(&entry, action.as_ref()).await })
    }

    /// Decrypt `entry`, extract according to `action` and deliver the result.
    ///
    /// Every failure ends this attempt only. When failure notifications are
    /// enabled the reason is also sent to the sink; otherwise it is just logged.
    pub async fn retrieve(&self, entry: &str, action: Option<&ActionDescriptor>) -> Result<Delivery> {
        let result = self.run(entry, action).await;
        if let Err(e) = &result {
            if e.is_retrieval_failure() && self.notify_failures {
                self.sink.notify_failure(entry, &e.to_string());
            }
        }
        result
    }

    async fn run(&self, entry: &str, action: Option<&ActionDescriptor>) -> Result<Delivery> {
        let output = self.decrypt(entry).await?;

        match extract(&output, action, entry)? {
            Extracted::Content(content) => Ok(Delivery::Displayed {
                entry: entry.to_string(),
                content,
            }),
            Extracted::Secret(secret) => {
                self.clipboard.set_secret(&secret)?;
                let clear_task = self.schedule_clear();

                let action_name = action.map(|a| a.name.clone());
                self.sink
                    .notify(entry, action_name.as_deref(), self.clip_timeout);
                tracing::info!(entry, action = action_name.as_deref(), "Secret copied to clipboard");

                Ok(Delivery::Copied {
                    entry: entry.to_string(),
                    action: action_name,
                    clear_task,
                })
            }
        }
    }

    async fn decrypt(&self, entry: &str) -> Result<String> {
        let args = self.command_args(entry);
        tracing::debug!(program = %self.pass_command, ?args, "Running decrypt command");

        // `output` waits for exit and reaps the child on every path.
        let output = Command::new(&self.pass_command)
            .args(&args)
            .env(ENV_STORE_DIR, &self.store_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::CommandLaunch {
                program: self.pass_command.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::warn!(
                entry,
                code = output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Decrypt command failed"
            );
            return Err(Error::Decrypt {
                entry: entry.to_string(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn schedule_clear(&self) -> JoinHandle<()> {
        let clipboard = Arc::clone(&self.clipboard);
        let timeout = self.clip_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            match clipboard.clear() {
                Ok(()) => tracing::debug!("Clipboard cleared"),
                Err(e) => tracing::warn!("{}", e),
            }
        })
    }
}

pub fn is_otp_entry(entry: &str, otp_identifier: &str) -> bool {
    entry
        .split('/')
        .any(|segment| segment.starts_with(otp_identifier))
}

/// Pull the deliverable out of decrypted `output`.
///
/// - no action: the first non-empty line
/// - show-content action: the whole output
/// - pattern action: capture group 1 of the first multi-line match
pub fn extract(output: &str, action: Option<&ActionDescriptor>, entry: &str) -> Result<Extracted> {
    let Some(action) = action else {
        return output
            .split('\n')
            .find(|line| !line.is_empty())
            .map(|line| Extracted::Secret(line.to_string()))
            .ok_or_else(|| Error::EmptySecret(entry.to_string()));
    };

    let pattern = match &action.capture {
        Capture::ShowContent => return Ok(Extracted::Content(output.to_string())),
        Capture::Pattern(pattern) => pattern,
    };

    let re = match RegexBuilder::new(pattern).multi_line(true).build() {
        Ok(re) => re,
        Err(e) => {
            tracing::info!(pattern = %pattern, valid = false, entry, "Action pattern did not match");
            return Err(Error::InvalidPattern {
                action: action.name.clone(),
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    };

    match re.captures(output).and_then(|caps| caps.get(1)) {
        Some(group) => Ok(Extracted::Secret(group.as_str().to_string())),
        None => {
            tracing::info!(pattern = %pattern, valid = true, entry, "Action pattern did not match");
            Err(Error::PatternMiss {
                action: action.name.clone(),
                entry: entry.to_string(),
            })
        }
    }
}
