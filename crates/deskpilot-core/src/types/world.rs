//! WorldState - frozen snapshot of ambient OS and session state.

use serde::{Deserialize, Serialize};

/// The window that currently holds focus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusedWindow {
    pub title: String,
    pub process: String,
}

/// Snapshot of the ambient state relevant to planning decisions.
///
/// Collected once at request entry by an external provider and never mutated
/// afterwards. Planners read it for decisions; they must not write to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Process names of applications known to be running.
    #[serde(default)]
    pub running_apps: Vec<String>,
    /// Currently focused window, if any.
    #[serde(default)]
    pub focused_window: Option<FocusedWindow>,
    /// Whether a managed browser session already exists.
    #[serde(default)]
    pub browser_session_active: bool,
    /// Whether clipboard access is available.
    #[serde(default)]
    pub clipboard_available: bool,
    /// Whether the screen is locked.
    #[serde(default)]
    pub screen_locked: bool,
    /// Recently observed facts, newest last.
    #[serde(default)]
    pub recent_facts: Vec<String>,
}

impl WorldState {
    /// Empty snapshot, used when no ambient collector is wired in.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether an application with the given name is running.
    pub fn is_running(&self, app: &str) -> bool {
        let needle = app.to_lowercase();
        self.running_apps
            .iter()
            .any(|a| a.to_lowercase() == needle)
    }

    /// Whether the focused window belongs to the given process.
    pub fn is_focused(&self, process: &str) -> bool {
        let needle = process.to_lowercase();
        self.focused_window
            .as_ref()
            .map(|w| w.process.to_lowercase() == needle)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_and_focused_checks_are_case_insensitive() {
        let world = WorldState {
            running_apps: vec!["Chrome".to_string(), "Spotify".to_string()],
            focused_window: Some(FocusedWindow {
                title: "New Tab".to_string(),
                process: "chrome".to_string(),
            }),
            ..WorldState::empty()
        };

        assert!(world.is_running("chrome"));
        assert!(world.is_running("SPOTIFY"));
        assert!(!world.is_running("notepad"));
        assert!(world.is_focused("Chrome"));
        assert!(!world.is_focused("spotify"));
    }
}
