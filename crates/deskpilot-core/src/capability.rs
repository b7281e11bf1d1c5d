//! Tool capability contracts: Capability metadata, the Tool trait, the
//! ToolRegistry trait, and plan-scoped session management.
//!
//! Tools are black boxes to the pipeline. They are atomic (no internal
//! retries or loops), declare their preconditions and effects statically,
//! and return a structured result with a status field.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::types::{ActionClass, IntentKind, Params};

/// Preconditions enforced by the executor, not by prompts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Preconditions {
    /// The target application must hold focus.
    #[serde(default)]
    pub requires_focus: bool,
    /// A named application must be running (checked against world state).
    #[serde(default)]
    pub requires_active_app: bool,
    /// The screen must be unlocked.
    #[serde(default)]
    pub requires_unlocked_screen: bool,
    /// The caller must confirm through an explicit channel.
    #[serde(default)]
    pub is_destructive: bool,
}

/// Metadata describing one registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Dotted tool name (e.g. `files.create_folder`).
    pub tool_name: String,
    /// Intent tags this tool serves.
    pub intent_tags: Vec<IntentKind>,
    /// Preconditions checked before invocation.
    #[serde(default)]
    pub preconditions: Preconditions,
    /// Declared effects, used by the resolver's similarity stage.
    #[serde(default)]
    pub effects: Vec<String>,
    /// JSON schema for the tool's argument map.
    #[serde(default)]
    pub schema: Value,
    /// Whether invocations must attach to a plan-scoped session.
    #[serde(default)]
    pub requires_session: bool,
    /// Whether this tool actuates or only observes.
    pub action_class: ActionClass,
}

impl Capability {
    pub fn new(tool_name: impl Into<String>, action_class: ActionClass) -> Self {
        Self {
            tool_name: tool_name.into(),
            intent_tags: Vec::new(),
            preconditions: Preconditions::default(),
            effects: Vec::new(),
            schema: Value::Null,
            requires_session: false,
            action_class,
        }
    }

    pub fn with_intents(mut self, intents: Vec<IntentKind>) -> Self {
        self.intent_tags = intents;
        self
    }

    pub fn with_effects(mut self, effects: Vec<String>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn with_session(mut self) -> Self {
        self.requires_session = true;
        self
    }

    /// Whether the tool name falls under the given domain prefix.
    ///
    /// A prefix matches on whole dotted segments: `system.apps` matches
    /// `system.apps.launch` but not `system.appsx.foo`.
    pub fn in_domain(&self, prefix: &str) -> bool {
        self.tool_name == prefix
            || self
                .tool_name
                .strip_prefix(prefix)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
    }
}

/// Outcome status reported by a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Structured result of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    /// Payload keys produced by the tool.
    #[serde(default)]
    pub data: Params,
    /// Error message, present iff status is `Error`.
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success() -> Self {
        Self {
            status: ToolStatus::Success,
            data: Params::new(),
            error: None,
        }
    }

    pub fn success_with(data: Params) -> Self {
        Self {
            status: ToolStatus::Success,
            data,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            data: Params::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// The tool contract: one atomic, deterministic capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static capability record.
    fn capability(&self) -> &Capability;

    /// Invoke the tool with the planner-authoritative argument map.
    ///
    /// `session` is the plan-scoped session handle, present exactly when
    /// the capability declares `requires_session`. Tools never acquire
    /// sessions themselves.
    async fn execute(&self, args: &Params, session: Option<&SessionHandle>) -> ToolOutcome;
}

/// Read-only tool lookup, populated once before the first request.
pub trait ToolRegistry: Send + Sync {
    fn has(&self, name: &str) -> bool;
    fn get(&self, name: &str) -> Option<Capability>;
    fn list_by_prefix(&self, prefix: &str) -> Vec<Capability>;
    fn list_all(&self) -> Vec<Capability>;
    /// The invocable tool behind a capability.
    fn tool(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

/// Handle to an acquired plan-scoped session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
}

/// Session acquisition for tools that declare `requires_session`.
///
/// The executor acquires at most one session per plan execution, at plan
/// start; tools must never create sessions mid-plan.
#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn acquire(&self) -> Result<SessionHandle, PipelineError>;
    async fn release(&self, handle: SessionHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_prefix_matches_whole_segments() {
        let cap = Capability::new("system.apps.launch", ActionClass::Actuate);
        assert!(cap.in_domain("system.apps"));
        assert!(cap.in_domain("system.apps.launch"));
        assert!(cap.in_domain("system"));
        assert!(!cap.in_domain("system.app"));
        assert!(!cap.in_domain("files"));
    }
}
