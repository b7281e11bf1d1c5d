//! PlannedAction and Plan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{IntentKind, Params};

/// Whether an action changes the world or only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    Actuate,
    Observe,
}

/// One validated, parameter-authoritative step.
///
/// `args` is the final parameter set for the eventual tool call. Downstream
/// stages may fill keys that are absent but must never add to or rewrite
/// keys already present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Unique within a plan graph (e.g. `g0_a1`).
    pub action_id: String,
    /// Intent tag attached by the planner rule.
    pub intent: IntentKind,
    /// Structured description used by the resolver (e.g. `navigate:{url}`).
    pub description: String,
    /// Authoritative, validated parameters.
    pub args: Params,
    pub action_class: ActionClass,
}

impl PlannedAction {
    pub fn new(
        action_id: impl Into<String>,
        intent: IntentKind,
        description: impl Into<String>,
        args: Params,
        action_class: ActionClass,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            intent,
            description: description.into(),
            args,
            action_class,
        }
    }

    /// Whether this is a context-only action that produces a frame and
    /// invokes no tool.
    pub fn is_context_only(&self) -> bool {
        self.args
            .get("context_only")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Invariant violations rejected by the `Plan` constructor.
#[derive(Debug, Error)]
pub enum PlanViolation {
    #[error("plan must contain at least one action")]
    Empty,
    #[error("duplicate action id '{0}'")]
    DuplicateActionId(String),
    #[error("goal_achieved_by '{0}' is not an action id in the plan")]
    UnknownAchiever(String),
}

/// A minimal sequence of actions achieving one goal.
#[derive(Debug, Clone)]
pub struct Plan {
    actions: Vec<PlannedAction>,
    goal_achieved_by: String,
}

impl Plan {
    /// Construct a plan, enforcing that action ids are unique and that
    /// `goal_achieved_by` names one of them.
    pub fn new(
        actions: Vec<PlannedAction>,
        goal_achieved_by: impl Into<String>,
    ) -> Result<Self, PlanViolation> {
        if actions.is_empty() {
            return Err(PlanViolation::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for action in &actions {
            if !seen.insert(action.action_id.as_str()) {
                return Err(PlanViolation::DuplicateActionId(action.action_id.clone()));
            }
        }
        let goal_achieved_by = goal_achieved_by.into();
        if !actions.iter().any(|a| a.action_id == goal_achieved_by) {
            return Err(PlanViolation::UnknownAchiever(goal_achieved_by));
        }
        Ok(Self {
            actions,
            goal_achieved_by,
        })
    }

    /// A single-action plan achieved by that action.
    pub fn single(action: PlannedAction) -> Self {
        let id = action.action_id.clone();
        Self {
            actions: vec![action],
            goal_achieved_by: id,
        }
    }

    pub fn actions(&self) -> &[PlannedAction] {
        &self.actions
    }

    pub fn goal_achieved_by(&self) -> &str {
        &self.goal_achieved_by
    }

    pub fn total_actions(&self) -> usize {
        self.actions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(id: &str) -> PlannedAction {
        let mut args = Params::new();
        args.insert("url".to_string(), json!("https://example.com"));
        PlannedAction::new(
            id,
            IntentKind::BrowserControl,
            "navigate:https://example.com",
            args,
            ActionClass::Actuate,
        )
    }

    #[test]
    fn test_plan_invariants_hold() {
        let plan = Plan::new(vec![action("g0_a1")], "g0_a1").unwrap();
        assert_eq!(plan.total_actions(), plan.actions().len());
        assert_eq!(plan.goal_achieved_by(), "g0_a1");
    }

    #[test]
    fn test_unknown_achiever_rejected() {
        assert!(matches!(
            Plan::new(vec![action("g0_a1")], "g0_a9"),
            Err(PlanViolation::UnknownAchiever(_))
        ));
    }

    #[test]
    fn test_duplicate_action_ids_rejected() {
        assert!(matches!(
            Plan::new(vec![action("g0_a1"), action("g0_a1")], "g0_a1"),
            Err(PlanViolation::DuplicateActionId(_))
        ));
    }
}
