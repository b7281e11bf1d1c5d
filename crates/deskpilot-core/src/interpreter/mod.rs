//! GoalInterpreter - semantic goal extraction for multi-routed utterances.
//!
//! Transforms an utterance into a MetaGoal: an ordered tuple of parametric
//! goals plus a deterministically derived dependency DAG. The provider
//! emits goals and per-goal scope annotations; all graph structure is
//! derived locally from the scope grammar. The interpreter is not the
//! authority on capability: unknown domains and verbs pass through and are
//! rejected at planning time.

pub mod scope;

use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::provider::{generate_checked, GenerateRequest, Provider};
use crate::types::{Goal, MetaGoal, Params, Scope, Utterance, WorldState};

use self::scope::{anchor_mentioned_in_text, derive_dependencies};

const INTERPRETER_SYSTEM: &str = "You are a semantic goal interpreter for a desktop \
assistant. Extract WHAT the user wants as structured goals; never plan HOW to achieve \
them and never emit dependency structure.";

const INTERPRETER_GUIDE: &str = r#"Each goal has:
- domain: one of browser, file, app, system, media, memory
- verb: the operation within the domain (navigate, search, create, launch, set, ...)
- params: operation parameters (name, object_type, url, query, platform, app_name, ...)
- object: the entity the goal creates or manipulates, when there is one
- scope: exactly one of
    "root"            - independent goal
    "after:<verb>"    - must run after the earlier goal with that verb
    "after:<goal id>" - must run after that goal (ids are g0, g1, ... by position)
    "inside:<target>" - contained in <target>; use "inside:it" for anaphora
    "drive:<letter>" | "desktop" | "documents" | "downloads" | "home" | "workspace"
                      - explicit base location mentioned BY THE USER

Examples:

"open chrome and open spotify" ->
  goals: [{domain:"app", verb:"launch", params:{app_name:"chrome"}, scope:"root"},
          {domain:"app", verb:"launch", params:{app_name:"spotify"}, scope:"root"}]

"create folder alex on D drive and create presentation.pptx inside it" ->
  goals: [{domain:"file", verb:"create",
           params:{object_type:"folder", name:"alex"}, object:"alex", scope:"drive:d"},
          {domain:"file", verb:"create",
           params:{object_type:"file", name:"presentation.pptx"},
           object:"presentation.pptx", scope:"inside:it"}]

Rules:
1. Extract semantic goals, not verbs.
2. Use a location scope ONLY when the user names the location in their own words.
3. Never put absolute paths in params; names are identities, not locations.
4. Keep goals in the order the user stated them."#;

/// Interpreter output: the meta goal plus a degradation flag.
///
/// `degraded` is set when the provider output was unusable and the result is
/// a synthetic single-goal fallback; the runtime routes such requests to the
/// legacy single-utterance path.
#[derive(Debug)]
pub struct Interpretation {
    pub meta_goal: MetaGoal,
    pub degraded: bool,
}

/// Semantic goal extraction from user input.
pub struct GoalInterpreter<P> {
    provider: P,
}

impl<P: Provider> GoalInterpreter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Interpret the utterance into a MetaGoal.
    ///
    /// Never fails: schema violations degrade to a single synthetic
    /// `unknown`-domain goal with the degradation flag set.
    pub async fn interpret(&self, utterance: &Utterance, _world: &WorldState) -> Interpretation {
        let request = GenerateRequest::new(
            INTERPRETER_SYSTEM,
            format!(
                "{INTERPRETER_GUIDE}\n\nInterpret this input:\n\"{}\"\n\n\
                 Return JSON with a `goals` array.",
                utterance.text
            ),
            interpreter_schema(),
        );

        let value = match generate_checked(&self.provider, request).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, "goal interpretation failed, returning fallback");
                return fallback(&utterance.text);
            }
        };

        let raw_goals = match value.get("goals").and_then(Value::as_array) {
            Some(goals) if !goals.is_empty() => goals.clone(),
            _ => {
                let err = PipelineError::AmbiguousUtterance(
                    "interpreter produced no goals".to_string(),
                );
                tracing::warn!(error = %err, "returning fallback");
                return fallback(&utterance.text);
            }
        };

        let goals: Vec<Goal> = raw_goals
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_goal(raw, i, &utterance.text))
            .collect();

        let dependencies = derive_dependencies(&goals);

        let meta_goal = match MetaGoal::new(goals, dependencies) {
            Ok(meta_goal) => meta_goal,
            Err(violation) => {
                // Derivation already drops self/forward references; reaching
                // this point means the goal list itself was unusable.
                tracing::error!(error = %violation, "meta goal construction failed, returning fallback");
                return fallback(&utterance.text);
            }
        };

        tracing::info!(
            meta_type = ?meta_goal.meta_type,
            goals = meta_goal.goals().len(),
            "utterance interpreted"
        );

        Interpretation {
            meta_goal,
            degraded: false,
        }
    }
}

/// Build one goal from a provider goal object.
///
/// Scope handling enforces the anchor rule: an anchor scope survives only
/// when the user text carries the matching linguistic cue. Provider-invented
/// anchors (typically echoes of absolute paths) degrade to root.
fn parse_goal(raw: &Value, index: usize, text: &str) -> Goal {
    let domain = raw
        .get("domain")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_lowercase();
    let verb = raw
        .get("verb")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_lowercase();
    let params = raw
        .get("params")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let scope_str = raw.get("scope").and_then(Value::as_str).unwrap_or("root");
    let mut scope = Scope::parse(scope_str);
    if let Scope::Anchor(anchor) = &scope {
        if !anchor_mentioned_in_text(anchor, text) {
            tracing::warn!(
                goal_index = index,
                anchor = %anchor.name(),
                "anchor scope has no linguistic cue in the utterance, degrading to root"
            );
            scope = Scope::Root;
        }
    }

    let mut goal = Goal::new(domain, verb, format!("g{index}"))
        .with_params(params)
        .with_scope(scope);
    if let Some(object) = raw.get("object").and_then(Value::as_str) {
        goal = goal.with_object(object);
    }
    goal
}

fn fallback(text: &str) -> Interpretation {
    let mut params = Params::new();
    params.insert("text".to_string(), json!(text));
    let goal = Goal::new("unknown", "unknown", "g0").with_params(params);
    Interpretation {
        meta_goal: MetaGoal::single(goal),
        degraded: true,
    }
}

fn interpreter_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "goals": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "domain": { "type": "string" },
                        "verb": { "type": "string" },
                        "params": { "type": "object" },
                        "object": { "type": "string" },
                        "scope": { "type": "string" }
                    },
                    "required": ["domain", "verb", "scope"]
                }
            }
        },
        "required": ["goals"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::types::{BaseAnchor, MetaType};
    use async_trait::async_trait;

    struct FixedProvider {
        output: Option<Value>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        async fn generate(&self, _request: GenerateRequest) -> Result<Value, ProviderError> {
            self.output
                .clone()
                .ok_or_else(|| ProviderError::Http("offline".to_string()))
        }
    }

    fn utterance(text: &str) -> Utterance {
        Utterance::new(text, WorldState::empty())
    }

    #[test]
    fn test_independent_multi_from_dual_launch() {
        tokio_test::block_on(async {
            let interpreter = GoalInterpreter::new(FixedProvider {
                output: Some(json!({
                    "goals": [
                        {"domain": "app", "verb": "launch",
                         "params": {"app_name": "chrome"}, "scope": "root"},
                        {"domain": "app", "verb": "launch",
                         "params": {"app_name": "spotify"}, "scope": "root"}
                    ]
                })),
            });
            let result = interpreter
                .interpret(&utterance("open chrome and open spotify"), &WorldState::empty())
                .await;
            assert!(!result.degraded);
            assert_eq!(result.meta_goal.meta_type, MetaType::IndependentMulti);
            assert_eq!(result.meta_goal.goals().len(), 2);
            assert!(result.meta_goal.dependencies().is_empty());
            assert_eq!(result.meta_goal.goals()[0].goal_id, "g0");
            assert_eq!(result.meta_goal.goals()[1].goal_id, "g1");
        });
    }

    #[test]
    fn test_dependent_multi_with_drive_anchor() {
        tokio_test::block_on(async {
            let interpreter = GoalInterpreter::new(FixedProvider {
                output: Some(json!({
                    "goals": [
                        {"domain": "file", "verb": "create",
                         "params": {"object_type": "folder", "name": "alex"},
                         "object": "alex", "scope": "drive:d"},
                        {"domain": "file", "verb": "create",
                         "params": {"object_type": "file", "name": "presentation.pptx"},
                         "object": "presentation.pptx", "scope": "inside:it"}
                    ]
                })),
            });
            let result = interpreter
                .interpret(
                    &utterance(
                        "create folder alex on D drive and create presentation.pptx inside it",
                    ),
                    &WorldState::empty(),
                )
                .await;
            assert_eq!(result.meta_goal.meta_type, MetaType::DependentMulti);
            assert_eq!(result.meta_goal.parents_of(1), [0]);
            assert_eq!(
                result.meta_goal.goals()[0].scope.anchor(),
                Some(&BaseAnchor::Drive('D'))
            );
        });
    }

    #[test]
    fn test_provider_anchor_without_linguistic_cue_is_degraded() {
        tokio_test::block_on(async {
            let interpreter = GoalInterpreter::new(FixedProvider {
                output: Some(json!({
                    "goals": [
                        {"domain": "file", "verb": "create",
                         "params": {"object_type": "folder", "name": "alex"},
                         "object": "alex", "scope": "drive:d"}
                    ]
                })),
            });
            // The user never said "d drive"; the anchor must not survive.
            let result = interpreter
                .interpret(&utterance("create folder alex"), &WorldState::empty())
                .await;
            assert_eq!(result.meta_goal.goals()[0].scope, Scope::Root);
        });
    }

    #[test]
    fn test_provider_failure_yields_degraded_single() {
        tokio_test::block_on(async {
            let interpreter = GoalInterpreter::new(FixedProvider { output: None });
            let result = interpreter
                .interpret(&utterance("do several things"), &WorldState::empty())
                .await;
            assert!(result.degraded);
            assert_eq!(result.meta_goal.meta_type, MetaType::Single);
            assert_eq!(result.meta_goal.goals()[0].domain, "unknown");
        });
    }
}
