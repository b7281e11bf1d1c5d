//! Domain-lock tables for tool resolution.
//!
//! These tables are authoritative data, not code: adding behavior is a data
//! edit. Safety invariant: `system.input.*` (raw mouse/keyboard) appears in
//! no allowed set except `input_control`'s and is hard-excluded everywhere
//! else, so no intent reaches physical input by fallback.

use crate::types::IntentKind;

/// Preferred tool-name prefixes per intent (Stage 1 search space).
pub fn preferred_domains(intent: IntentKind) -> &'static [&'static str] {
    match intent {
        IntentKind::ApplicationLaunch => &["system.apps.launch"],
        IntentKind::ApplicationControl => &["system.apps"],
        IntentKind::WindowManagement => &["system.window", "system.virtual_desktop"],
        IntentKind::SystemQuery => &["system.state"],
        IntentKind::SystemControl => &[
            "system.audio",
            "system.display",
            "system.power",
            "system.desktop",
            "system.network",
        ],
        IntentKind::ScreenCapture => &["system.display"],
        IntentKind::ScreenPerception => &["system.display"],
        IntentKind::InputControl => &["system.input"],
        IntentKind::ClipboardOperation => &["system.clipboard"],
        IntentKind::MemoryRecall => &["memory"],
        IntentKind::FileOperation => &["files"],
        IntentKind::BrowserControl => &["browsers"],
        IntentKind::OfficeOperation => &["office"],
        // Pure LLM paths: no tools.
        IntentKind::InformationQuery => &[],
        IntentKind::Unknown => &[],
    }
}

/// Allowed prefixes for Stage 2 fallback (whitelist, hard constraint).
///
/// `Some(&[])` means the intent supports no fallback at all; `None` means
/// no whitelist restriction (only the disallow list applies).
pub fn allowed_domains(intent: IntentKind) -> Option<&'static [&'static str]> {
    match intent {
        IntentKind::FileOperation => Some(&["files"]),
        IntentKind::BrowserControl => Some(&["browsers", "system.apps.launch"]),
        IntentKind::ApplicationLaunch => Some(&["system.apps.launch"]),
        IntentKind::ApplicationControl => Some(&["system.apps"]),
        IntentKind::SystemControl => Some(&[
            "system.audio",
            "system.display",
            "system.power",
            "system.desktop",
            "system.network",
        ]),
        IntentKind::ScreenCapture => Some(&["system.display"]),
        IntentKind::ScreenPerception => Some(&["system.display"]),
        IntentKind::ClipboardOperation => Some(&["system.clipboard"]),
        IntentKind::InputControl => Some(&["system.input"]),
        IntentKind::WindowManagement => Some(&["system.window", "system.virtual_desktop"]),
        IntentKind::SystemQuery => Some(&["system.state"]),
        IntentKind::MemoryRecall => Some(&["memory"]),
        IntentKind::OfficeOperation => Some(&["office"]),
        IntentKind::InformationQuery => Some(&[]),
        IntentKind::Unknown => None,
    }
}

/// Hard-excluded prefixes per intent (blacklist, applied after the
/// whitelist).
pub fn disallowed_domains(intent: IntentKind) -> &'static [&'static str] {
    match intent {
        IntentKind::BrowserControl => &["system.input"],
        IntentKind::FileOperation => &["system.input"],
        IntentKind::OfficeOperation => &["system.input"],
        IntentKind::ApplicationLaunch => &["system.input"],
        IntentKind::ApplicationControl => &["system.input"],
        IntentKind::WindowManagement => &["system.input"],
        IntentKind::InformationQuery => &["system.input", "system.apps", "system.power"],
        IntentKind::ScreenCapture => &["system.input"],
        IntentKind::ScreenPerception => &["system.input"],
        IntentKind::SystemQuery => &["system.input"],
        IntentKind::SystemControl => &["system.input"],
        IntentKind::ClipboardOperation => &["system.input"],
        IntentKind::MemoryRecall => &["system.input"],
        IntentKind::InputControl => &[],
        IntentKind::Unknown => &["system.input"],
    }
}

/// Direct lookup from structured description prefixes to tool names,
/// filtered at resolution time by the intent's preferred domains.
pub const DESCRIPTION_TOOL_MAP: &[(&str, &str)] = &[
    ("create:folder", "files.create_folder"),
    ("create:file", "files.create_file"),
    ("delete:folder", "files.delete_folder"),
    ("delete:file", "files.delete_file"),
    ("move:", "files.move"),
    ("copy:", "files.copy"),
    ("rename:", "files.rename"),
    ("write:", "files.write_file"),
    ("list:", "files.list"),
    ("navigate:", "browsers.navigate"),
    ("search:", "browsers.search"),
    ("click:", "browsers.click"),
    ("click:", "system.input.mouse.click"),
    ("type:", "browsers.type"),
    ("type:", "system.input.keyboard.type"),
    ("scroll:", "browsers.scroll"),
    ("read:", "browsers.read"),
    ("read:", "files.read_file"),
    ("launch:", "system.apps.launch"),
    ("focus:", "system.apps.focus"),
    ("close:", "system.apps.close"),
    ("set:volume", "system.audio.set_volume"),
    ("set:brightness", "system.display.set_brightness"),
    ("toggle:mute", "system.audio.toggle_mute"),
    ("toggle:wifi", "system.network.toggle_wifi"),
    ("toggle:bluetooth", "system.network.toggle_bluetooth"),
    ("toggle:airplane_mode", "system.network.toggle_airplane_mode"),
    ("get:battery", "system.state.battery"),
    ("get:time", "system.state.time"),
    ("get:wifi", "system.state.wifi"),
    ("get:bluetooth", "system.state.bluetooth"),
    ("get:screenshot", "system.display.screenshot"),
    ("query:", "system.state.query"),
    ("media:play", "system.audio.play"),
    ("media:pause", "system.audio.pause"),
    ("media:stop", "system.audio.stop"),
    ("media:next", "system.audio.next"),
    ("media:previous", "system.audio.previous"),
    ("store:", "memory.store"),
    ("recall:", "memory.recall"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_domain_is_opt_in_only() {
        for intent in IntentKind::all() {
            let allows_input = allowed_domains(*intent)
                .map(|domains| domains.contains(&"system.input"))
                .unwrap_or(false);
            if *intent == IntentKind::InputControl {
                assert!(allows_input);
                assert!(disallowed_domains(*intent).is_empty());
            } else {
                assert!(!allows_input, "{intent} must not allow system.input");
            }
        }
    }

    #[test]
    fn test_information_query_has_no_fallback_tools() {
        assert_eq!(preferred_domains(IntentKind::InformationQuery), &[] as &[&str]);
        assert_eq!(allowed_domains(IntentKind::InformationQuery), Some(&[] as &[&str]));
    }

    #[test]
    fn test_description_map_targets_live_inside_some_preferred_domain() {
        // Every mapped tool belongs to the preferred domains of at least one
        // intent, so Stage 1 filtering can never orphan an entry.
        for (_, tool) in DESCRIPTION_TOOL_MAP {
            let covered = IntentKind::all().iter().any(|intent| {
                preferred_domains(*intent).iter().any(|prefix| {
                    tool == prefix
                        || tool
                            .strip_prefix(prefix)
                            .map(|rest| rest.starts_with('.'))
                            .unwrap_or(false)
                })
            });
            assert!(covered, "{tool} is outside every preferred domain");
        }
    }
}
