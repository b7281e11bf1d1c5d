//! GoalPlanner - one parametric goal to one minimal plan.
//!
//! Table-driven: all behavior is declared in the planner rules; this module
//! reads rule fields and never special-cases a domain or verb by name. The
//! `args` map on an emitted action is the final parameter set. Downstream
//! stages must not inject, overwrite, or omit keys, and must never ask a
//! provider to re-derive a selector, URL, or path.

pub mod rules;

use serde_json::Value;

use crate::error::PipelineError;
use crate::types::{
    ActionClass, ContextFrame, ContextFrames, Goal, Params, Plan, PlannedAction, WorldState,
};

use self::rules::{
    format_description, rule_for, search_url, validate_params, ParamSynthesis, PlannerRule,
};

/// A planned goal: the plan plus any context frames it produced.
#[derive(Debug)]
pub struct PlannedGoal {
    pub plan: Plan,
    pub produced: Vec<ContextFrame>,
    /// Whether the plan's actions must attach to the plan-scoped session.
    pub requires_session: bool,
}

/// Transforms a single goal into a minimal validated plan.
#[derive(Debug, Default)]
pub struct GoalPlanner;

impl GoalPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan one goal against the frozen world snapshot and the context
    /// frames accumulated from upstream goals.
    pub fn plan(
        &self,
        goal: &Goal,
        _world: &WorldState,
        frames: &ContextFrames,
    ) -> Result<PlannedGoal, PipelineError> {
        let rule = rule_for(&goal.domain, &goal.verb).ok_or_else(|| {
            tracing::warn!(domain = %goal.domain, verb = %goal.verb, "no planner rule");
            PipelineError::NoCapability {
                domain: goal.domain.clone(),
                verb: goal.verb.clone(),
            }
        })?;

        let mut params = goal.params.clone();

        // Fill declared consumptions from the most recent matching frame.
        // Explicit user params always win.
        for binding in rule.context_consumption {
            if !params.contains_key(binding.param) {
                if let Some(value) = frames.latest(binding.domain, binding.key) {
                    tracing::debug!(
                        goal_id = %goal.goal_id,
                        param = binding.param,
                        domain = binding.domain,
                        "param filled from context frame"
                    );
                    params.insert(binding.param.to_string(), value.clone());
                }
            }
        }

        // The orchestrator's resolved path is the authoritative location.
        if rule.requires_resolved_path {
            match &goal.resolved_path {
                Some(path) if is_absolute_path(path) => {
                    params.insert("path".to_string(), Value::String(path.clone()));
                }
                Some(path) => {
                    return Err(PipelineError::ValidationFailed {
                        domain: goal.domain.clone(),
                        verb: goal.verb.clone(),
                        reason: format!("resolved path is not absolute: {path}"),
                    });
                }
                None => {
                    return Err(PipelineError::ValidationFailed {
                        domain: goal.domain.clone(),
                        verb: goal.verb.clone(),
                        reason: "path not resolved by orchestrator".to_string(),
                    });
                }
            }
        }

        let validated = match validate_params(&goal.domain, &goal.verb, &params, rule) {
            Ok(validated) => validated,
            Err(err) if rule.allow_semantic_only => {
                tracing::info!(
                    goal_id = %goal.goal_id,
                    reason = %err,
                    "accepting semantic-only goal, emitting context-only action"
                );
                return Ok(self.context_only(goal, rule, params));
            }
            Err(err) => return Err(err),
        };

        let validated = apply_synthesis(rule, validated);
        let description = format_description(rule.description_template, &validated);

        let action_id = format!("{}_a1", goal.goal_id);
        let action = PlannedAction::new(
            action_id.clone(),
            rule.intent,
            description.clone(),
            validated.clone(),
            rule.action_class,
        );

        let produced = produce_frames(rule, &action_id, &validated);
        tracing::info!(
            goal_id = %goal.goal_id,
            action_id = %action_id,
            description = %description,
            "goal planned"
        );

        Ok(PlannedGoal {
            plan: Plan::single(action),
            produced,
            requires_session: rule.requires_session,
        })
    }

    /// A context-producing action for a semantic-only goal: no tool call,
    /// just the declared frame for downstream consumers.
    fn context_only(&self, goal: &Goal, rule: &PlannerRule, params: Params) -> PlannedGoal {
        let action_id = format!("{}_a1", goal.goal_id);
        let mut args = params;
        args.insert("context_only".to_string(), Value::Bool(true));
        let description = format_description(rule.description_template, &args);
        let produced = produce_frames(rule, &action_id, &args);
        let action = PlannedAction::new(
            action_id,
            rule.intent,
            description,
            args,
            ActionClass::Observe,
        );
        PlannedGoal {
            plan: Plan::single(action),
            produced,
            requires_session: false,
        }
    }
}

fn apply_synthesis(rule: &PlannerRule, mut params: Params) -> Params {
    for step in rule.synthesize {
        match step {
            ParamSynthesis::SearchUrl { into } => {
                if !params.contains_key(*into) {
                    let platform = params
                        .get("platform")
                        .and_then(Value::as_str)
                        .unwrap_or(rules::DEFAULT_SEARCH_ENGINE)
                        .to_lowercase();
                    let query = params.get("query").and_then(Value::as_str).unwrap_or("");
                    params.insert(
                        (*into).to_string(),
                        Value::String(search_url(&platform, query)),
                    );
                }
            }
            ParamSynthesis::EnsureUrlScheme { param } => {
                if let Some(url) = params.get(*param).and_then(Value::as_str) {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        let with_scheme = format!("https://{url}");
                        params.insert((*param).to_string(), Value::String(with_scheme));
                    }
                }
            }
        }
    }
    params
}

fn produce_frames(rule: &PlannerRule, action_id: &str, params: &Params) -> Vec<ContextFrame> {
    let Some(production) = &rule.context_production else {
        return Vec::new();
    };
    let mut data = Params::new();
    for key in production.keys {
        if let Some(value) = params.get(*key) {
            data.insert((*key).to_string(), value.clone());
        }
    }
    if data.is_empty() {
        return Vec::new();
    }
    vec![ContextFrame::new(action_id, production.domain, data)]
}

/// Absolute-path check covering both unix roots and drive-letter prefixes.
///
/// Paths in the data model are plain strings so that drive anchors resolve
/// identically on every host; `std::path` absoluteness is platform-bound.
pub fn is_absolute_path(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntentKind, Scope};
    use serde_json::json;

    fn planner() -> GoalPlanner {
        GoalPlanner::new()
    }

    fn browser_search_goal(query: &str, platform: Option<&str>) -> Goal {
        let mut params = Params::new();
        params.insert("query".to_string(), json!(query));
        if let Some(platform) = platform {
            params.insert("platform".to_string(), json!(platform));
        }
        Goal::new("browser", "search", "g0").with_params(params)
    }

    #[test]
    fn test_browser_search_plans_single_action_with_url() {
        let planned = planner()
            .plan(
                &browser_search_goal("nvidia", Some("youtube")),
                &WorldState::empty(),
                &ContextFrames::new(),
            )
            .unwrap();

        let plan = &planned.plan;
        assert_eq!(plan.total_actions(), plan.actions().len());
        assert_eq!(plan.total_actions(), 1);
        let action = &plan.actions()[0];
        assert_eq!(plan.goal_achieved_by(), action.action_id);
        assert_eq!(action.intent, IntentKind::BrowserControl);
        assert_eq!(action.description, "search:youtube:nvidia");
        assert_eq!(
            action.args["url"],
            json!("https://www.youtube.com/results?search_query=nvidia")
        );
        assert!(planned.requires_session);
    }

    #[test]
    fn test_unknown_pair_is_no_capability() {
        let goal = Goal::new("system", "schedule_task", "g0");
        let err = planner()
            .plan(&goal, &WorldState::empty(), &ContextFrames::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoCapability { .. }));
    }

    #[test]
    fn test_file_create_requires_resolved_path() {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("folder"));
        params.insert("name".to_string(), json!("alex"));
        let goal = Goal::new("file", "create", "g0").with_params(params.clone());

        let err = planner()
            .plan(&goal, &WorldState::empty(), &ContextFrames::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed { .. }));

        let mut resolved = Goal::new("file", "create", "g0").with_params(params);
        resolved.resolved_path = Some("D:/alex".to_string());
        let planned = planner()
            .plan(&resolved, &WorldState::empty(), &ContextFrames::new())
            .unwrap();
        let action = &planned.plan.actions()[0];
        assert_eq!(action.description, "create:folder:D:/alex");
        assert_eq!(action.args["path"], json!("D:/alex"));
    }

    #[test]
    fn test_verb_alias_mkdir_plans_as_create() {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("folder"));
        params.insert("name".to_string(), json!("projects"));
        let mut goal = Goal::new("file", "mkdir", "g0").with_params(params);
        goal.resolved_path = Some("/home/user/projects".to_string());

        let planned = planner()
            .plan(&goal, &WorldState::empty(), &ContextFrames::new())
            .unwrap();
        assert_eq!(
            planned.plan.actions()[0].description,
            "create:folder:/home/user/projects"
        );
    }

    #[test]
    fn test_context_consumption_fills_missing_param_only() {
        let mut frames = ContextFrames::new();
        let mut data = Params::new();
        data.insert("platform".to_string(), json!("youtube"));
        frames.push(ContextFrame::new("g0_a1", "browser", data));

        // Missing platform: filled from the frame.
        let planned = planner()
            .plan(
                &browser_search_goal("rust", None),
                &WorldState::empty(),
                &frames,
            )
            .unwrap();
        assert_eq!(planned.plan.actions()[0].args["platform"], json!("youtube"));

        // Explicit platform: the user param wins over the frame.
        let planned = planner()
            .plan(
                &browser_search_goal("rust", Some("github")),
                &WorldState::empty(),
                &frames,
            )
            .unwrap();
        assert_eq!(planned.plan.actions()[0].args["platform"], json!("github"));
    }

    #[test]
    fn test_context_production_emits_frame_after_validation() {
        let planned = planner()
            .plan(
                &browser_search_goal("nvidia", Some("youtube")),
                &WorldState::empty(),
                &ContextFrames::new(),
            )
            .unwrap();
        assert_eq!(planned.produced.len(), 1);
        let frame = &planned.produced[0];
        assert_eq!(frame.domain, "browser");
        assert_eq!(frame.get("platform"), Some(&json!("youtube")));
        assert_eq!(frame.produced_by, "g0_a1");
    }

    #[test]
    fn test_semantic_only_navigate_emits_context_only_action() {
        let mut params = Params::new();
        params.insert("platform".to_string(), json!("youtube"));
        let goal = Goal::new("browser", "navigate", "g0")
            .with_params(params)
            .with_scope(Scope::Root);

        let planned = planner()
            .plan(&goal, &WorldState::empty(), &ContextFrames::new())
            .unwrap();
        let action = &planned.plan.actions()[0];
        assert!(action.is_context_only());
        assert_eq!(action.action_class, ActionClass::Observe);
        assert_eq!(planned.produced.len(), 1);
    }

    #[test]
    fn test_invalid_allowed_value_fails_without_guessing() {
        let mut params = Params::new();
        params.insert("query".to_string(), json!("nvidia"));
        params.insert("platform".to_string(), json!("myspace"));
        let goal = Goal::new("browser", "search", "g0").with_params(params);
        let err = planner()
            .plan(&goal, &WorldState::empty(), &ContextFrames::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed { .. }));
    }

    #[test]
    fn test_absolute_path_detection() {
        assert!(is_absolute_path("/home/user/docs"));
        assert!(is_absolute_path("D:/alex"));
        assert!(is_absolute_path("d:\\alex"));
        assert!(is_absolute_path("C:"));
        assert!(!is_absolute_path("alex"));
        assert!(!is_absolute_path("docs/readme.md"));
    }
}
