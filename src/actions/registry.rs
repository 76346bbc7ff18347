use crate::core::config::Settings;
use crate::search::matcher::Match;
use serde::Serialize;

/// Icon used when a configured action names none
pub const DEFAULT_ACTION_ICON: &str = "object-unlocked";
/// Icon and label of the synthetic show-contents action
pub const SHOW_CONTENT_ICON: &str = "document-new";
pub const SHOW_CONTENT_NAME: &str = "Show password file contents";

/// How an action turns decrypted output into something for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum Capture {
    /// Display the whole decrypted file; nothing is copied
    ShowContent,
    /// Multi-line regex; capture group 1 is the secret. Validated when used.
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub icon: String,
    pub capture: Capture,
}

impl ActionDescriptor {
    pub fn show_content() -> Self {
        Self {
            name: SHOW_CONTENT_NAME.to_string(),
            icon: SHOW_CONTENT_ICON.to_string(),
            capture: Capture::ShowContent,
        }
    }

    pub fn is_show_content(&self) -> bool {
        matches!(self.capture, Capture::ShowContent)
    }
}

/// The ordered, process-wide action list offered on every match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRegistry {
    actions: Vec<ActionDescriptor>,
}

impl ActionRegistry {
    /// Derive the action list from settings, keeping the configured order
    pub fn load(settings: &Settings) -> Self {
        if !settings.show_actions {
            return Self::default();
        }

        let mut actions: Vec<ActionDescriptor> = settings
            .actions
            .iter()
            .map(|action| ActionDescriptor {
                name: action.name.clone(),
                icon: action
                    .icon
                    .clone()
                    .filter(|icon| !icon.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ACTION_ICON.to_string()),
                capture: Capture::Pattern(action.regex.clone()),
            })
            .collect();

        if settings.show_file_content_action {
            actions.push(ActionDescriptor::show_content());
        }

        Self { actions }
    }

    pub fn actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    /// Same list for every match
    pub fn actions_for_match(&self, _m: &Match) -> &[ActionDescriptor] {
        &self.actions
    }

    pub fn find(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|action| action.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}
