#![cfg(unix)]

use passrun::{
    ActionConfig, ActionRegistry, Delivery, Error, MemoryClipboard, NotificationSink, PassRunner,
    RetrievalPipeline, Settings,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Remembers everything the pipeline reported
#[derive(Default)]
struct RecordingSink {
    copied: Mutex<Vec<(String, Option<String>, Duration)>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, entry: &str, action: Option<&str>, timeout: Duration) {
        self.copied
            .lock()
            .unwrap()
            .push((entry.to_string(), action.map(String::from), timeout));
    }

    fn notify_failure(&self, entry: &str, reason: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((entry.to_string(), reason.to_string()));
    }
}

/// A stand-in for `pass` that logs its arguments and store dir, then runs `body`
fn fake_pass(dir: &Path, body: &str) -> (PathBuf, PathBuf) {
    let script = dir.join("fake-pass");
    let log = dir.join("calls.log");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"$* | $PASSWORD_STORE_DIR\" >> '{}'\n{}\n",
            log.display(),
            body
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (script, log)
}

fn settings(store: &Path, script: &Path) -> Settings {
    let mut settings = Settings::default().with_store_dir(store);
    settings.pass_command = script.display().to_string();
    settings.clip_timeout = 1;
    settings.show_actions = true;
    settings.show_file_content_action = true;
    settings.actions = vec![ActionConfig {
        name: "Username".to_string(),
        icon: None,
        regex: "^login: (.*)$".to_string(),
    }];
    settings
}

struct Fixture {
    _temp_dir: TempDir,
    store: PathBuf,
    log: PathBuf,
    settings: Settings,
    clipboard: Arc<MemoryClipboard>,
    sink: Arc<RecordingSink>,
}

impl Fixture {
    fn new(body: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("store");
        fs::create_dir_all(&store).unwrap();
        let (script, log) = fake_pass(temp_dir.path(), body);
        let settings = settings(&store, &script);
        Self {
            _temp_dir: temp_dir,
            store,
            log,
            settings,
            clipboard: Arc::new(MemoryClipboard::new()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn pipeline(&self) -> RetrievalPipeline {
        RetrievalPipeline::new(&self.settings, self.clipboard.clone(), self.sink.clone())
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }
}

#[tokio::test]
async fn test_copies_first_line_and_clears_after_timeout() {
    let fixture = Fixture::new("printf 'secret123\\nextra\\n'");
    let pipeline = fixture.pipeline();

    let delivery = pipeline.retrieve("x", None).await.unwrap();
    assert_eq!(fixture.clipboard.contents().as_deref(), Some("secret123"));
    assert_eq!(
        fixture.sink.copied.lock().unwrap().as_slice(),
        &[("x".to_string(), None, Duration::from_secs(1))]
    );
    assert_eq!(
        fixture.calls(),
        vec![format!("show x | {}", fixture.store.display())]
    );

    let Delivery::Copied { clear_task, .. } = delivery else {
        panic!("expected a clipboard delivery");
    };
    tokio::time::timeout(Duration::from_secs(5), clear_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fixture.clipboard.contents(), None);
    assert_eq!(fixture.clipboard.clears(), 1);
}

#[tokio::test]
async fn test_failed_decrypt_is_silent() {
    let fixture = Fixture::new("echo 'gpg: decryption failed' >&2\nexit 1");
    let pipeline = fixture.pipeline();

    let result = pipeline.retrieve("x", None).await;
    assert!(matches!(result, Err(Error::Decrypt { code: Some(1), .. })));
    assert_eq!(fixture.clipboard.writes(), 0);
    assert!(fixture.sink.copied.lock().unwrap().is_empty());
    assert!(fixture.sink.failures.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failures_reported_when_enabled() {
    let mut fixture = Fixture::new("exit 2");
    fixture.settings.notify_failures = true;
    let pipeline = fixture.pipeline();

    assert!(pipeline.retrieve("bank", None).await.is_err());
    let failures = fixture.sink.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "bank");
    assert_eq!(fixture.clipboard.writes(), 0);
}

#[tokio::test]
async fn test_missing_program_fails_cleanly() {
    let mut fixture = Fixture::new("true");
    fixture.settings.pass_command = fixture.store.join("no-such-pass").display().to_string();
    let pipeline = fixture.pipeline();

    let result = pipeline.retrieve("x", None).await;
    assert!(matches!(result, Err(Error::CommandLaunch { .. })));
    assert_eq!(fixture.clipboard.writes(), 0);
}

#[tokio::test]
async fn test_action_pattern_copies_capture_group() {
    let fixture = Fixture::new("printf 'hunter2\\nlogin: alice\\npassword: xyz\\n'");
    let pipeline = fixture.pipeline();
    let registry = ActionRegistry::load(&fixture.settings);
    let action = registry.find("Username").unwrap();

    let delivery = pipeline.retrieve("email/work", Some(action)).await.unwrap();
    assert!(matches!(
        delivery,
        Delivery::Copied { ref action, .. } if action.as_deref() == Some("Username")
    ));
    assert_eq!(fixture.clipboard.contents().as_deref(), Some("alice"));
    assert_eq!(
        fixture.sink.copied.lock().unwrap()[0].1.as_deref(),
        Some("Username")
    );
}

#[tokio::test]
async fn test_pattern_miss_leaves_clipboard_alone() {
    let fixture = Fixture::new("printf 'hunter2\\n'");
    let pipeline = fixture.pipeline();
    let registry = ActionRegistry::load(&fixture.settings);

    let result = pipeline
        .retrieve("bank", registry.find("Username"))
        .await;
    assert!(matches!(result, Err(Error::PatternMiss { .. })));
    assert_eq!(fixture.clipboard.writes(), 0);
    assert!(fixture.sink.copied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_otp_entry_uses_otp_subcommand() {
    let fixture = Fixture::new("echo 123456");
    let pipeline = fixture.pipeline();

    pipeline.retrieve("web/totp::github", None).await.unwrap();
    assert_eq!(fixture.clipboard.contents().as_deref(), Some("123456"));
    assert_eq!(
        fixture.calls(),
        vec![format!("otp show web/totp::github | {}", fixture.store.display())]
    );
}

#[tokio::test]
async fn test_show_content_displays_without_copying() {
    let fixture = Fixture::new("printf 'hunter2\\nlogin: alice\\n'");
    let pipeline = fixture.pipeline();
    let registry = ActionRegistry::load(&fixture.settings);
    let show = registry
        .actions()
        .iter()
        .find(|a| a.is_show_content())
        .unwrap();

    let delivery = pipeline.retrieve("bank", Some(show)).await.unwrap();
    match delivery {
        Delivery::Displayed { entry, content } => {
            assert_eq!(entry, "bank");
            assert_eq!(content, "hunter2\nlogin: alice\n");
        }
        other => panic!("unexpected delivery: {:?}", other),
    }
    assert_eq!(fixture.clipboard.writes(), 0);
    assert!(fixture.sink.copied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_earlier_clear_wipes_later_copy() {
    let fixture = Fixture::new("echo \"secret-$2\"");
    let pipeline = fixture.pipeline();

    let first = pipeline.retrieve("a", None).await.unwrap();
    pipeline.retrieve("b", None).await.unwrap();
    assert_eq!(fixture.clipboard.contents().as_deref(), Some("secret-b"));

    // Clears are not cancelled by later copies.
    let Delivery::Copied { clear_task, .. } = first else {
        panic!("expected a clipboard delivery");
    };
    clear_task.await.unwrap();
    assert_eq!(fixture.clipboard.contents(), None);
}

#[tokio::test]
async fn test_runner_retrieves_by_action_name() {
    let fixture = Fixture::new("printf 'hunter2\\nlogin: alice\\n'");
    fs::write(fixture.store.join("bank.gpg"), "x").unwrap();

    let runner = PassRunner::start(
        fixture.settings.clone(),
        fixture.clipboard.clone(),
        fixture.sink.clone(),
        false,
    )
    .unwrap();

    let matches = runner.query("bank", false);
    assert_eq!(matches.len(), 1);

    let handle = runner.run(&matches[0], None);
    handle.await.unwrap().unwrap();
    assert_eq!(fixture.clipboard.contents().as_deref(), Some("hunter2"));

    runner.retrieve("bank", Some("Username")).await.unwrap();
    assert_eq!(fixture.clipboard.contents().as_deref(), Some("alice"));

    let unknown = runner.retrieve("bank", Some("Nope")).await;
    assert!(matches!(unknown, Err(Error::Config(_))));
}
