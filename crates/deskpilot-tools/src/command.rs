//! Declarative platform-command tools.
//!
//! A `CommandSpec` maps one capability onto an argv template; `{param}`
//! placeholders are substituted from the validated argument map. This keeps
//! the system/browser capability set a data table rather than one struct
//! per tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio::time::timeout;

use deskpilot_core::capability::{Capability, SessionHandle, Tool, ToolOutcome};
use deskpilot_core::types::Params;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const OUTPUT_PREVIEW_CHARS: usize = 4_000;

/// Declarative description of one command-backed capability.
pub struct CommandSpec {
    pub capability: Capability,
    pub program: &'static str,
    /// Argv template; `{param}` placeholders substitute from args.
    pub args: &'static [&'static str],
    /// Fire-and-forget: spawn without waiting for exit (app launches).
    pub detach: bool,
}

/// Tool that runs a platform command built from an argv template.
pub struct CommandTool {
    spec: CommandSpec,
}

impl CommandTool {
    pub fn new(spec: CommandSpec) -> Arc<dyn Tool> {
        Arc::new(Self { spec })
    }

    fn render_args(&self, args: &Params) -> Result<Vec<String>, String> {
        self.spec
            .args
            .iter()
            .map(|template| substitute(template, args))
            .collect()
    }
}

fn substitute(template: &str, args: &Params) -> Result<String, String> {
    let mut rendered = template.to_string();
    while let Some(start) = rendered.find('{') {
        let end = rendered[start..]
            .find('}')
            .map(|offset| start + offset)
            .ok_or_else(|| format!("unbalanced placeholder in '{template}'"))?;
        let key = rendered[start + 1..end].to_string();
        let value = args
            .get(&key)
            .ok_or_else(|| format!("missing param '{key}'"))?;
        let text = match value {
            Value::String(s) => s.clone(),
            // Key chords: ["ctrl", "shift"] renders as "ctrl+shift".
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("+"),
            other => other.to_string(),
        };
        rendered.replace_range(start..=end, &text);
    }
    Ok(rendered)
}

#[async_trait]
impl Tool for CommandTool {
    fn capability(&self) -> &Capability {
        &self.spec.capability
    }

    async fn execute(&self, args: &Params, _session: Option<&SessionHandle>) -> ToolOutcome {
        let argv = match self.render_args(args) {
            Ok(argv) => argv,
            Err(message) => return ToolOutcome::error(message),
        };

        let mut command = Command::new(self.spec.program);
        command.args(&argv);
        command.kill_on_drop(true);

        tracing::debug!(
            tool = %self.spec.capability.tool_name,
            program = self.spec.program,
            "command tool invoked"
        );

        if self.spec.detach {
            return match command.spawn() {
                Ok(child) => {
                    let mut data = Params::new();
                    if let Some(pid) = child.id() {
                        data.insert("pid".to_string(), json!(pid));
                    }
                    ToolOutcome::success_with(data)
                }
                Err(e) => ToolOutcome::error(format!(
                    "failed to spawn '{}': {e}",
                    self.spec.program
                )),
            };
        }

        let output = match timeout(DEFAULT_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolOutcome::error(format!("failed to run '{}': {e}", self.spec.program))
            }
            Err(_) => {
                return ToolOutcome::error(format!(
                    "command '{}' timed out after {}s",
                    self.spec.program,
                    DEFAULT_TIMEOUT.as_secs()
                ))
            }
        };

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout));
        if output.status.success() {
            let mut data = Params::new();
            data.insert("output".to_string(), json!(stdout.trim()));
            ToolOutcome::success_with(data)
        } else {
            let stderr = truncate(&String::from_utf8_lossy(&output.stderr));
            ToolOutcome::error(format!(
                "'{}' exited with {}: {}",
                self.spec.program,
                output.status,
                stderr.trim()
            ))
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= OUTPUT_PREVIEW_CHARS {
        return text.to_string();
    }
    text.chars().take(OUTPUT_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::types::{ActionClass, IntentKind};

    fn echo_spec() -> CommandSpec {
        CommandSpec {
            capability: Capability::new("system.state.query", ActionClass::Observe)
                .with_intents(vec![IntentKind::SystemQuery]),
            program: "echo",
            args: &["{target}"],
            detach: false,
        }
    }

    #[test]
    fn test_placeholder_substitution() {
        let mut args = Params::new();
        args.insert("target".to_string(), json!("battery"));
        let tool = CommandTool { spec: echo_spec() };
        assert_eq!(tool.render_args(&args).unwrap(), ["battery"]);
    }

    #[test]
    fn test_missing_param_is_an_error_outcome() {
        tokio_test::block_on(async {
            let tool = CommandTool::new(echo_spec());
            let outcome = tool.execute(&Params::new(), None).await;
            assert!(!outcome.is_success());
            assert!(outcome.error.unwrap().contains("missing param"));
        });
    }

    #[test]
    fn test_command_output_captured() {
        tokio_test::block_on(async {
            let mut args = Params::new();
            args.insert("target".to_string(), json!("uptime"));
            let tool = CommandTool::new(echo_spec());
            let outcome = tool.execute(&args, None).await;
            assert!(outcome.is_success());
            assert_eq!(outcome.data["output"], json!("uptime"));
        });
    }
}
