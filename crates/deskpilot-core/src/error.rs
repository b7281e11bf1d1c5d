//! Pipeline error kinds.
//!
//! Errors are a closed, tagged set and travel as values on return paths.
//! Each stage logs and returns; aggregation into a final status happens in
//! the orchestrator and the runtime, never mid-stage.

use thiserror::Error;

/// Closed error set for the reasoning pipeline.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Transport or authentication failure in the provider layer.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider output failed structural validation.
    #[error("provider output failed schema validation: {0}")]
    SchemaInvalid(String),

    /// The interpreter could not derive a meta-goal structure.
    #[error("could not derive goal structure: {0}")]
    AmbiguousUtterance(String),

    /// No planner rule exists for this (domain, verb) pair.
    #[error("no planner rule for ({domain}, {verb})")]
    NoCapability { domain: String, verb: String },

    /// A required parameter is missing or outside its allowed values.
    #[error("parameter validation failed for ({domain}, {verb}): {reason}")]
    ValidationFailed {
        domain: String,
        verb: String,
        reason: String,
    },

    /// Domain-locked resolution found no tool for the action.
    #[error("no tool for intent '{intent}' matching '{description}'")]
    NoTool {
        intent: String,
        description: String,
    },

    /// A declared tool precondition does not hold.
    #[error("precondition '{precondition}' unmet for tool '{tool}'")]
    PreconditionUnmet { tool: String, precondition: String },

    /// The tool reported an error status.
    #[error("tool '{tool}' failed: {message}")]
    ToolFailure { tool: String, message: String },

    /// The request was cancelled or timed out.
    #[error("request cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stable tag for logging and result aggregation.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ProviderUnavailable(_) => "provider_unavailable",
            PipelineError::SchemaInvalid(_) => "schema_invalid",
            PipelineError::AmbiguousUtterance(_) => "ambiguous_utterance",
            PipelineError::NoCapability { .. } => "no_capability",
            PipelineError::ValidationFailed { .. } => "validation_failed",
            PipelineError::NoTool { .. } => "no_tool",
            PipelineError::PreconditionUnmet { .. } => "precondition_unmet",
            PipelineError::ToolFailure { .. } => "tool_failure",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        let err = PipelineError::NoCapability {
            domain: "system".to_string(),
            verb: "schedule_task".to_string(),
        };
        assert_eq!(err.kind(), "no_capability");
        assert!(err.to_string().contains("system"));
        assert!(err.to_string().contains("schedule_task"));
    }
}
