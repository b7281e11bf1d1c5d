//! Default capability catalog.
//!
//! Registers the standard tool set: native file tools, a native clock, and
//! platform-command tools for the app, system, input, and browser domains.
//! Everything is registered once at bootstrap; the registry is read-only
//! afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use deskpilot_core::capability::{
    Capability, Preconditions, SessionHandle, Tool, ToolOutcome,
};
use deskpilot_core::types::{ActionClass, IntentKind, Params};

use crate::command::{CommandSpec, CommandTool};
use crate::files::file_tools;
use crate::registry::InMemoryRegistry;

/// Build the default registry.
pub fn default_catalog() -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    for tool in file_tools() {
        registry.register(tool);
    }
    for spec in command_specs() {
        registry.register(CommandTool::new(spec));
    }
    registry.register(Arc::new(ClockTool::new()));
    tracing::info!(tools = registry.len(), "default catalog registered");
    registry
}

fn input_preconditions() -> Preconditions {
    Preconditions {
        requires_unlocked_screen: true,
        ..Preconditions::default()
    }
}

fn command_specs() -> Vec<CommandSpec> {
    let mut specs = vec![
        CommandSpec {
            capability: Capability::new("system.apps.launch", ActionClass::Actuate)
                .with_intents(vec![IntentKind::ApplicationLaunch, IntentKind::BrowserControl])
                .with_effects(vec!["application started".to_string()])
                .with_schema(app_schema()),
            program: if cfg!(target_os = "windows") { "cmd" } else { "sh" },
            args: if cfg!(target_os = "windows") {
                &["/C", "start", "", "{app_name}"]
            } else {
                &["-c", "{app_name}"]
            },
            detach: true,
        },
        CommandSpec {
            capability: Capability::new("system.apps.focus", ActionClass::Actuate)
                .with_intents(vec![IntentKind::ApplicationControl])
                .with_effects(vec!["application window focused".to_string()])
                .with_schema(app_schema()),
            program: if cfg!(target_os = "macos") { "osascript" } else { "wmctrl" },
            args: if cfg!(target_os = "macos") {
                &["-e", "tell application \"{app_name}\" to activate"]
            } else {
                &["-a", "{app_name}"]
            },
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.apps.close", ActionClass::Actuate)
                .with_intents(vec![IntentKind::ApplicationControl])
                .with_effects(vec!["application terminated".to_string()])
                .with_schema(app_schema()),
            program: if cfg!(target_os = "windows") { "taskkill" } else { "pkill" },
            args: if cfg!(target_os = "windows") {
                &["/IM", "{app_name}"]
            } else {
                &["-f", "{app_name}"]
            },
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.audio.set_volume", ActionClass::Actuate)
                .with_intents(vec![IntentKind::SystemControl])
                .with_effects(vec!["output volume changed".to_string()])
                .with_schema(value_schema()),
            program: if cfg!(target_os = "macos") { "osascript" } else { "amixer" },
            args: if cfg!(target_os = "macos") {
                &["-e", "set volume output volume {value}"]
            } else {
                &["set", "Master", "{value}%"]
            },
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.audio.toggle_mute", ActionClass::Actuate)
                .with_intents(vec![IntentKind::SystemControl])
                .with_effects(vec!["output mute toggled".to_string()])
                .with_schema(json!({"type": "object"})),
            program: if cfg!(target_os = "macos") { "osascript" } else { "amixer" },
            args: if cfg!(target_os = "macos") {
                &["-e", "set volume output muted not (output muted of (get volume settings))"]
            } else {
                &["set", "Master", "toggle"]
            },
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.display.set_brightness", ActionClass::Actuate)
                .with_intents(vec![IntentKind::SystemControl])
                .with_effects(vec!["display brightness changed".to_string()])
                .with_schema(value_schema()),
            program: "brightnessctl",
            args: &["set", "{value}%"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.display.screenshot", ActionClass::Observe)
                .with_intents(vec![IntentKind::ScreenCapture, IntentKind::SystemQuery])
                .with_effects(vec!["screen captured to file".to_string()])
                .with_schema(json!({"type": "object"})),
            program: if cfg!(target_os = "macos") { "screencapture" } else { "scrot" },
            args: &[],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.state.battery", ActionClass::Observe)
                .with_intents(vec![IntentKind::SystemQuery])
                .with_effects(vec!["battery level returned".to_string()])
                .with_schema(json!({"type": "object"})),
            program: if cfg!(target_os = "macos") { "pmset" } else { "cat" },
            args: if cfg!(target_os = "macos") {
                &["-g", "batt"]
            } else {
                &["/sys/class/power_supply/BAT0/capacity"]
            },
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.state.wifi", ActionClass::Observe)
                .with_intents(vec![IntentKind::SystemQuery])
                .with_effects(vec!["wifi radio state returned".to_string()])
                .with_schema(json!({"type": "object"})),
            program: "nmcli",
            args: &["radio", "wifi"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.network.toggle_wifi", ActionClass::Actuate)
                .with_intents(vec![IntentKind::SystemControl])
                .with_effects(vec!["wifi radio toggled".to_string()])
                .with_schema(json!({"type": "object"})),
            program: "rfkill",
            args: &["toggle", "wifi"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.network.toggle_bluetooth", ActionClass::Actuate)
                .with_intents(vec![IntentKind::SystemControl])
                .with_effects(vec!["bluetooth radio toggled".to_string()])
                .with_schema(json!({"type": "object"})),
            program: "rfkill",
            args: &["toggle", "bluetooth"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.network.toggle_airplane_mode", ActionClass::Actuate)
                .with_intents(vec![IntentKind::SystemControl])
                .with_effects(vec!["all radios toggled".to_string()])
                .with_schema(json!({"type": "object"})),
            program: "rfkill",
            args: &["toggle", "all"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.input.mouse.click", ActionClass::Actuate)
                .with_intents(vec![IntentKind::InputControl])
                .with_effects(vec!["mouse click at coordinates".to_string()])
                .with_schema(json!({
                    "type": "object",
                    "properties": {
                        "x": { "type": "integer" },
                        "y": { "type": "integer" }
                    },
                    "required": ["x", "y"]
                }))
                .with_preconditions(input_preconditions()),
            program: "xdotool",
            args: &["mousemove", "{x}", "{y}", "click", "1"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.input.keyboard.type", ActionClass::Actuate)
                .with_intents(vec![IntentKind::InputControl])
                .with_effects(vec!["text typed into focused window".to_string()])
                .with_schema(json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }))
                .with_preconditions(Preconditions {
                    requires_focus: true,
                    requires_unlocked_screen: true,
                    ..Preconditions::default()
                }),
            program: "xdotool",
            args: &["type", "{text}"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("system.input.keyboard.release", ActionClass::Actuate)
                .with_intents(vec![IntentKind::InputControl])
                .with_effects(vec!["held modifier keys released".to_string()])
                .with_schema(json!({
                    "type": "object",
                    "properties": { "keys": { "type": "array" } },
                    "required": ["keys"]
                })),
            program: "xdotool",
            args: &["keyup", "{keys}"],
            detach: false,
        },
        CommandSpec {
            capability: Capability::new("browsers.navigate", ActionClass::Actuate)
                .with_intents(vec![IntentKind::BrowserControl])
                .with_effects(vec!["url opened in browser".to_string()])
                .with_schema(url_schema())
                .with_session(),
            program: opener(),
            args: opener_args(),
            detach: true,
        },
        CommandSpec {
            capability: Capability::new("browsers.search", ActionClass::Actuate)
                .with_intents(vec![IntentKind::BrowserControl])
                .with_effects(vec!["search results opened in browser".to_string()])
                .with_schema(json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string" },
                        "platform": { "type": "string" },
                        "query": { "type": "string" }
                    },
                    "required": ["url"]
                }))
                .with_session(),
            program: opener(),
            args: opener_args(),
            detach: true,
        },
    ];

    // playerctl speaks every media verb with the same argv shape.
    for verb in ["play", "pause", "stop", "next", "previous"] {
        specs.push(media_spec(verb));
    }
    specs
}

fn media_spec(verb: &'static str) -> CommandSpec {
    let (name, effect, args): (&'static str, &'static str, &'static [&'static str]) = match verb {
        "play" => ("system.audio.play", "media playback started", &["play"]),
        "pause" => ("system.audio.pause", "media playback paused", &["pause"]),
        "stop" => ("system.audio.stop", "media playback stopped", &["stop"]),
        "next" => ("system.audio.next", "next media track", &["next"]),
        _ => ("system.audio.previous", "previous media track", &["previous"]),
    };
    CommandSpec {
        capability: Capability::new(name, ActionClass::Actuate)
            .with_intents(vec![IntentKind::SystemControl])
            .with_effects(vec![effect.to_string()])
            .with_schema(json!({"type": "object"})),
        program: "playerctl",
        args,
        detach: false,
    }
}

fn opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "cmd"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

fn opener_args() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["/C", "start", "", "{url}"]
    } else {
        &["{url}"]
    }
}

fn app_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "app_name": { "type": "string" } },
        "required": ["app_name"]
    })
}

fn value_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "value": { "type": "string" } },
        "required": ["value"]
    })
}

fn url_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "url": { "type": "string" } },
        "required": ["url"]
    })
}

/// Native clock capability; `get:time` needs no subprocess.
struct ClockTool {
    capability: Capability,
}

impl ClockTool {
    fn new() -> Self {
        Self {
            capability: Capability::new("system.state.time", ActionClass::Observe)
                .with_intents(vec![IntentKind::SystemQuery])
                .with_effects(vec!["current local time returned".to_string()])
                .with_schema(json!({"type": "object"})),
        }
    }
}

#[async_trait]
impl Tool for ClockTool {
    fn capability(&self) -> &Capability {
        &self.capability
    }

    async fn execute(&self, _args: &Params, _session: Option<&SessionHandle>) -> ToolOutcome {
        let now = chrono::Local::now();
        let mut data = Params::new();
        data.insert("time".to_string(), json!(now.to_rfc3339()));
        ToolOutcome::success_with(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::capability::ToolRegistry;

    #[test]
    fn test_catalog_covers_core_domains() {
        let registry = default_catalog();
        for name in [
            "files.create_folder",
            "files.create_file",
            "files.delete_folder",
            "system.apps.launch",
            "system.audio.set_volume",
            "system.state.time",
            "system.input.mouse.click",
            "browsers.navigate",
            "browsers.search",
        ] {
            assert!(registry.has(name), "missing {name}");
        }
    }

    #[test]
    fn test_browser_tools_require_session() {
        let registry = default_catalog();
        assert!(registry.get("browsers.navigate").unwrap().requires_session);
        assert!(!registry.get("files.create_file").unwrap().requires_session);
    }

    #[test]
    fn test_input_tools_guarded_by_preconditions() {
        let registry = default_catalog();
        let click = registry.get("system.input.mouse.click").unwrap();
        assert!(click.preconditions.requires_unlocked_screen);
        let kb = registry.get("system.input.keyboard.type").unwrap();
        assert!(kb.preconditions.requires_focus);
    }

    #[test]
    fn test_clock_tool_returns_time() {
        tokio_test::block_on(async {
            let registry = default_catalog();
            let clock = registry.tool("system.state.time").unwrap();
            let outcome = clock.execute(&Params::new(), None).await;
            assert!(outcome.is_success());
            assert!(outcome.data.contains_key("time"));
        });
    }
}
