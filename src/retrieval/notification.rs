use std::process::{Command, Stdio};
use std::time::Duration;

pub const NOTIFICATION_ICON: &str = "object-unlocked";
const NOTIFICATION_TITLE: &str = "Pass";

/// Fire-and-forget user feedback from the retrieval pipeline
pub trait NotificationSink: Send + Sync {
    /// A secret from `entry` is on the clipboard until `timeout` elapses
    fn notify(&self, entry: &str, action: Option<&str>, timeout: Duration);

    /// A retrieval failed. Only called when failure notifications are enabled.
    fn notify_failure(&self, entry: &str, reason: &str);
}

/// `"[Username of ]Password email/work copied to clipboard for 45 seconds"`
pub fn copied_message(entry: &str, action: Option<&str>, timeout: Duration) -> String {
    let prefix = match action {
        Some(name) if !name.is_empty() => format!("{} of ", name),
        _ => String::new(),
    };
    format!(
        "{}Password {} copied to clipboard for {} seconds",
        prefix,
        entry,
        timeout.as_secs()
    )
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, entry: &str, action: Option<&str>, timeout: Duration) {
        tracing::info!("{}", copied_message(entry, action, timeout));
    }

    fn notify_failure(&self, entry: &str, reason: &str) {
        tracing::warn!(entry, "{}", reason);
    }
}

/// Desktop notifications through `notify-send`, dismissed after the clip timeout
#[derive(Debug, Clone)]
pub struct DesktopSink {
    program: String,
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }
}

impl DesktopSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn send(&self, icon: &str, body: String, expire: Duration) {
        let mut command = Command::new(&self.program);
        command
            .args(notify_send_args(icon, body, expire))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let program = self.program.clone();
        // Reap the child off the caller's thread.
        std::thread::spawn(move || match command.status() {
            Ok(status) if !status.success() => {
                tracing::debug!("{} exited with {}", program, status);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Failed to run {}: {}", program, e),
        });
    }
}

/// Arguments for `notify-send`. An expire time of 0 means "never" to the
/// notification server, so the shortest timeout it gets is 1 ms.
fn notify_send_args(icon: &str, body: String, expire: Duration) -> Vec<String> {
    vec![
        "--app-name=passrun".to_string(),
        format!("--icon={}", icon),
        format!("--expire-time={}", expire.as_millis().max(1)),
        NOTIFICATION_TITLE.to_string(),
        body,
    ]
}

impl NotificationSink for DesktopSink {
    fn notify(&self, entry: &str, action: Option<&str>, timeout: Duration) {
        let message = copied_message(entry, action, timeout);
        tracing::info!("{}", message);
        self.send(NOTIFICATION_ICON, message, timeout);
    }

    fn notify_failure(&self, entry: &str, reason: &str) {
        tracing::warn!(entry, "{}", reason);
        self.send("dialog-error", reason.to_string(), Duration::from_secs(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copied_message_without_action() {
        assert_eq!(
            copied_message("bank", None, Duration::from_secs(45)),
            "Password bank copied to clipboard for 45 seconds"
        );
    }

    #[test]
    fn test_notify_send_args_expire_with_clip_timeout() {
        let args = notify_send_args("object-unlocked", "body".to_string(), Duration::from_secs(45));
        assert_eq!(
            args,
            vec![
                "--app-name=passrun",
                "--icon=object-unlocked",
                "--expire-time=45000",
                "Pass",
                "body",
            ]
        );
    }

    #[test]
    fn test_notify_send_args_zero_timeout_still_expires() {
        let args = notify_send_args("object-unlocked", "body".to_string(), Duration::ZERO);
        assert_eq!(args[2], "--expire-time=1");
    }

    #[test]
    fn test_copied_message_with_action() {
        assert_eq!(
            copied_message("email/work", Some("Username"), Duration::from_secs(10)),
            "Username of Password email/work copied to clipboard for 10 seconds"
        );
    }
}
