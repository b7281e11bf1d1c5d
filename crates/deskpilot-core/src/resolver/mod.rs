//! ToolResolver - two-stage, intent-aware, strictly domain-bounded.
//!
//! Stage 1 looks up the structured action description directly inside the
//! intent's preferred tool domains. Stage 2 falls back to a similarity
//! search that is locked to the intent's allowed domains (a stricter set)
//! minus a hard disallow list. Raw input tools (`system.input.*`) are
//! opt-in only through the `input_control` intent; no other intent can
//! reach them by fallback.
//!
//! The resolver never invents tool names, never rewrites args already
//! present, and never alters the intent.

mod domains;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::capability::{Capability, ToolRegistry};
use crate::error::PipelineError;
use crate::provider::{generate_checked, GenerateRequest, Provider};
use crate::types::{IntentKind, Params, PlannedAction, WorldState};

pub use domains::{
    allowed_domains, disallowed_domains, preferred_domains, DESCRIPTION_TOOL_MAP,
};

/// Similarity floor for Stage 2; weaker matches hard-fail as `NoTool`.
const MIN_SIMILARITY: f64 = 0.2;
/// Confidence penalty for a Stage 2 winner outside the preferred domains.
const DOMAIN_MISMATCH_PENALTY: f64 = 0.15;

/// A resolved tool choice.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tool_name: String,
    /// Parameters for the invocation. When the action carried args they are
    /// passed through byte-for-byte; the resolver only fills params for
    /// arg-less single-path actions.
    pub params: Params,
    pub confidence: f64,
    /// 1 = direct description lookup, 2 = domain-locked similarity.
    pub stage: u8,
    /// Whether the tool sits in the intent's preferred domains.
    pub domain_match: bool,
}

/// Two-stage tool resolution over the registry.
pub struct ToolResolver<P> {
    registry: Arc<dyn ToolRegistry>,
    provider: P,
}

impl<P: Provider> ToolResolver<P> {
    pub fn new(registry: Arc<dyn ToolRegistry>, provider: P) -> Self {
        Self { registry, provider }
    }

    /// Resolve a planner-emitted action to a concrete tool.
    ///
    /// Deterministic: the structured description either maps directly to a
    /// registered tool in the preferred domains (Stage 1) or goes through
    /// the domain-locked similarity fallback (Stage 2). The action's args
    /// are the invocation params, unchanged.
    pub fn resolve(&self, action: &PlannedAction) -> Result<Resolution, PipelineError> {
        let intent = action.intent;

        // Stage 1: direct lookup inside preferred domains.
        let preferred = preferred_domains(intent);
        for (prefix, tool_name) in DESCRIPTION_TOOL_MAP {
            if action.description.starts_with(prefix)
                && in_any_domain(tool_name, preferred)
                && self.registry.has(tool_name)
            {
                tracing::info!(
                    action_id = %action.action_id,
                    tool = tool_name,
                    stage = 1,
                    "tool resolved by direct lookup"
                );
                return Ok(Resolution {
                    tool_name: (*tool_name).to_string(),
                    params: action.args.clone(),
                    confidence: 1.0,
                    stage: 1,
                    domain_match: true,
                });
            }
        }

        // Stage 2: similarity search, domain-locked.
        let candidates = self.stage2_candidates(intent, Some(action))?;
        let scored = candidates
            .iter()
            .map(|cap| (similarity(&action.description, cap), cap))
            .max_by(|(a, _), (b, _)| a.total_cmp(b));

        match scored {
            Some((score, cap)) if score >= MIN_SIMILARITY => {
                let domain_match = in_any_domain(&cap.tool_name, preferred);
                let confidence = if domain_match {
                    score
                } else {
                    (score - DOMAIN_MISMATCH_PENALTY).max(0.0)
                };
                tracing::info!(
                    action_id = %action.action_id,
                    tool = %cap.tool_name,
                    stage = 2,
                    confidence = confidence,
                    domain_match = domain_match,
                    "tool resolved by similarity"
                );
                Ok(Resolution {
                    tool_name: cap.tool_name.clone(),
                    params: action.args.clone(),
                    confidence,
                    stage: 2,
                    domain_match,
                })
            }
            _ => {
                tracing::warn!(
                    action_id = %action.action_id,
                    intent = %intent,
                    description = %action.description,
                    "no tool survived domain-locked resolution"
                );
                Err(PipelineError::NoTool {
                    intent: intent.as_str().to_string(),
                    description: action.description.clone(),
                })
            }
        }
    }

    /// Resolve a raw single-path utterance to a tool plus proposed params.
    ///
    /// Used only when no planner produced args: the provider proposes the
    /// parameter map, constrained to the domain-locked candidate set. The
    /// chosen tool is validated against that set; a name outside it is
    /// rejected, never trusted.
    pub async fn resolve_utterance(
        &self,
        intent: IntentKind,
        text: &str,
        world: &WorldState,
    ) -> Result<Resolution, PipelineError> {
        let mut candidates: Vec<Capability> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for cap in self.stage1_pool(intent) {
            if seen.insert(cap.tool_name.clone()) {
                candidates.push(cap);
            }
        }
        for cap in self.stage2_candidates(intent, None).unwrap_or_default() {
            if seen.insert(cap.tool_name.clone()) {
                candidates.push(cap);
            }
        }

        if candidates.is_empty() {
            return Err(PipelineError::NoTool {
                intent: intent.as_str().to_string(),
                description: text.to_string(),
            });
        }

        let names: Vec<&str> = candidates.iter().map(|c| c.tool_name.as_str()).collect();
        let request = GenerateRequest::new(
            "You match a desktop assistant request to exactly one tool and fill its \
             parameters from the tool's schema. Use exact tool names. If no tool can \
             accomplish the request, return null for the tool.",
            build_selection_prompt(text, intent, world, &candidates),
            selection_schema(&names),
        );

        let value = generate_checked(&self.provider, request).await?;

        let tool_name = match value.get("tool") {
            Some(Value::String(name)) => name.clone(),
            _ => {
                return Err(PipelineError::NoTool {
                    intent: intent.as_str().to_string(),
                    description: text.to_string(),
                })
            }
        };
        if !seen.contains(&tool_name) {
            tracing::warn!(tool = %tool_name, "provider proposed a tool outside the candidate set");
            return Err(PipelineError::NoTool {
                intent: intent.as_str().to_string(),
                description: text.to_string(),
            });
        }

        let params = value
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        let domain_match = in_any_domain(&tool_name, preferred_domains(intent));
        tracing::info!(
            tool = %tool_name,
            confidence = confidence,
            domain_match = domain_match,
            "utterance resolved to tool"
        );
        Ok(Resolution {
            tool_name,
            params,
            confidence,
            stage: if domain_match { 1 } else { 2 },
            domain_match,
        })
    }

    /// Registered capabilities inside the intent's preferred domains.
    fn stage1_pool(&self, intent: IntentKind) -> Vec<Capability> {
        preferred_domains(intent)
            .iter()
            .flat_map(|prefix| self.registry.list_by_prefix(prefix))
            .collect()
    }

    /// The Stage 2 candidate set: whitelist, then blacklist, then the
    /// action-class hard filter. An empty whitelist means the intent has no
    /// fallback at all.
    fn stage2_candidates(
        &self,
        intent: IntentKind,
        action: Option<&PlannedAction>,
    ) -> Result<Vec<Capability>, PipelineError> {
        let no_tool = |description: String| PipelineError::NoTool {
            intent: intent.as_str().to_string(),
            description,
        };

        let mut pool: Vec<Capability> = match allowed_domains(intent) {
            Some([]) => {
                tracing::warn!(intent = %intent, "intent has no allowed fallback domains");
                return Err(no_tool("fallback not permitted".to_string()));
            }
            Some(allowed) => allowed
                .iter()
                .flat_map(|prefix| self.registry.list_by_prefix(prefix))
                .collect(),
            None => self.registry.list_all(),
        };

        let disallowed = disallowed_domains(intent);
        pool.retain(|cap| !disallowed.iter().any(|d| cap.in_domain(d)));

        if let Some(action) = action {
            pool.retain(|cap| cap.action_class == action.action_class);
        }

        let mut seen = HashSet::new();
        pool.retain(|cap| seen.insert(cap.tool_name.clone()));

        if pool.is_empty() {
            return Err(no_tool(
                action
                    .map(|a| a.description.clone())
                    .unwrap_or_else(|| "no candidates".to_string()),
            ));
        }
        Ok(pool)
    }
}

fn in_any_domain(tool_name: &str, domains: &[&str]) -> bool {
    domains.iter().any(|prefix| {
        tool_name == *prefix
            || tool_name
                .strip_prefix(prefix)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
    })
}

/// Token-overlap similarity between a description and a capability.
fn similarity(description: &str, capability: &Capability) -> f64 {
    let desc_tokens = tokenize(description);
    if desc_tokens.is_empty() {
        return 0.0;
    }
    let mut cap_tokens = tokenize(&capability.tool_name);
    for effect in &capability.effects {
        cap_tokens.extend(tokenize(effect));
    }
    if cap_tokens.is_empty() {
        return 0.0;
    }
    let overlap = desc_tokens.intersection(&cap_tokens).count() as f64;
    overlap / desc_tokens.union(&cap_tokens).count() as f64
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn build_selection_prompt(
    text: &str,
    intent: IntentKind,
    world: &WorldState,
    candidates: &[Capability],
) -> String {
    let mut prompt = format!("Request: \"{text}\"\nIntent: {intent}\n\n");
    if !world.running_apps.is_empty() {
        prompt.push_str(&format!(
            "Running apps: {}\n\n",
            world.running_apps.join(", ")
        ));
    }
    prompt.push_str("Available tools:\n");
    for cap in candidates {
        prompt.push_str(&format!(
            "- {}: effects {} schema {}\n",
            cap.tool_name,
            cap.effects.join(", "),
            cap.schema
        ));
    }
    prompt.push_str(
        "\nPick the tool that best matches the request and provide params per its \
         schema. Rate confidence 0.0-1.0 honestly. Return JSON with tool, params, \
         and confidence.",
    );
    prompt
}

fn selection_schema(names: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "tool": { "type": ["string", "null"], "enum": names.iter().map(|n| json!(n)).chain([json!(null)]).collect::<Vec<_>>() },
            "params": { "type": "object" },
            "confidence": { "type": "number" }
        },
        "required": ["tool", "confidence"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Tool, ToolOutcome};
    use crate::provider::ProviderError;
    use crate::types::ActionClass;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticTool {
        capability: Capability,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn capability(&self) -> &Capability {
            &self.capability
        }

        async fn execute(
            &self,
            _args: &Params,
            _session: Option<&crate::capability::SessionHandle>,
        ) -> ToolOutcome {
            ToolOutcome::success()
        }
    }

    #[derive(Default)]
    struct MapRegistry {
        tools: HashMap<String, Arc<dyn Tool>>,
    }

    impl MapRegistry {
        fn with(mut self, capability: Capability) -> Self {
            self.tools.insert(
                capability.tool_name.clone(),
                Arc::new(StaticTool { capability }),
            );
            self
        }
    }

    impl ToolRegistry for MapRegistry {
        fn has(&self, name: &str) -> bool {
            self.tools.contains_key(name)
        }

        fn get(&self, name: &str) -> Option<Capability> {
            self.tools.get(name).map(|t| t.capability().clone())
        }

        fn list_by_prefix(&self, prefix: &str) -> Vec<Capability> {
            self.tools
                .values()
                .map(|t| t.capability().clone())
                .filter(|c| c.in_domain(prefix))
                .collect()
        }

        fn list_all(&self) -> Vec<Capability> {
            self.tools.values().map(|t| t.capability().clone()).collect()
        }

        fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
            self.tools.get(name).cloned()
        }
    }

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

    fn registry() -> Arc<dyn ToolRegistry> {
        Arc::new(
            MapRegistry::default()
                .with(
                    Capability::new("files.create_folder", ActionClass::Actuate)
                        .with_intents(vec![IntentKind::FileOperation])
                        .with_effects(vec!["folder created".to_string()]),
                )
                .with(
                    Capability::new("files.create_file", ActionClass::Actuate)
                        .with_intents(vec![IntentKind::FileOperation]),
                )
                .with(
                    Capability::new("browsers.navigate", ActionClass::Actuate)
                        .with_intents(vec![IntentKind::BrowserControl])
                        .with_session(),
                )
                .with(
                    Capability::new("system.input.mouse.click", ActionClass::Actuate)
                        .with_intents(vec![IntentKind::InputControl])
                        .with_effects(vec!["mouse click at coordinates".to_string()]),
                ),
        )
    }

    fn action(intent: IntentKind, description: &str, args: Params) -> PlannedAction {
        PlannedAction::new("g0_a1", intent, description, args, ActionClass::Actuate)
    }

    fn offline_resolver() -> ToolResolver<FixedProvider> {
        ToolResolver::new(registry(), FixedProvider { output: None })
    }

    #[test]
    fn test_stage1_direct_lookup_passes_args_through() {
        let mut args = Params::new();
        args.insert("path".to_string(), json!("D:/alex"));
        args.insert("object_type".to_string(), json!("folder"));
        let action = action(IntentKind::FileOperation, "create:folder:D:/alex", args.clone());

        let resolution = offline_resolver().resolve(&action).unwrap();
        assert_eq!(resolution.tool_name, "files.create_folder");
        assert_eq!(resolution.stage, 1);
        // Planner authority: the invocation params are exactly the args.
        assert_eq!(resolution.params, args);
    }

    #[test]
    fn test_input_domain_locked_away_from_browser_control() {
        let mut args = Params::new();
        args.insert("x".to_string(), json!(500));
        args.insert("y".to_string(), json!(300));
        let click = action(IntentKind::BrowserControl, "click at 500, 300", args.clone());

        let err = offline_resolver().resolve(&click).unwrap_err();
        assert!(matches!(err, PipelineError::NoTool { .. }));

        // The same description under input_control resolves.
        let click = action(IntentKind::InputControl, "click at 500, 300", args);
        let resolution = offline_resolver().resolve(&click).unwrap();
        assert_eq!(resolution.tool_name, "system.input.mouse.click");
    }

    #[test]
    fn test_resolved_tool_is_always_inside_intent_domains() {
        let intents = [
            IntentKind::FileOperation,
            IntentKind::BrowserControl,
            IntentKind::InputControl,
        ];
        let descriptions = [
            "create:folder:D:/alex",
            "navigate:https://example.com",
            "click at 10, 10",
        ];
        for (intent, description) in intents.iter().zip(descriptions) {
            let action = action(*intent, description, Params::new());
            if let Ok(resolution) = offline_resolver().resolve(&action) {
                let preferred = preferred_domains(*intent);
                let allowed = allowed_domains(*intent).unwrap_or(&[]);
                assert!(
                    in_any_domain(&resolution.tool_name, preferred)
                        || in_any_domain(&resolution.tool_name, allowed),
                    "{} outside domains for {}",
                    resolution.tool_name,
                    intent
                );
                let disallowed = disallowed_domains(*intent);
                assert!(!in_any_domain(&resolution.tool_name, disallowed));
            }
        }
    }

    #[test]
    fn test_utterance_resolution_rejects_out_of_set_tool() {
        tokio_test::block_on(async {
            let resolver = ToolResolver::new(
                registry(),
                FixedProvider {
                    output: Some(json!({
                        "tool": "system.input.mouse.click",
                        "params": {"x": 500, "y": 300},
                        "confidence": 0.9
                    })),
                },
            );
            // browser_control never reaches system.input.*, even when the
            // provider proposes it. The schema enum rejects it outright, and
            // the candidate check would too.
            let err = resolver
                .resolve_utterance(
                    IntentKind::BrowserControl,
                    "click at 500, 300",
                    &WorldState::empty(),
                )
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                PipelineError::NoTool { .. } | PipelineError::SchemaInvalid(_)
            ));
        });
    }

    #[test]
    fn test_utterance_resolution_fills_params_for_empty_args() {
        tokio_test::block_on(async {
            let resolver = ToolResolver::new(
                registry(),
                FixedProvider {
                    output: Some(json!({
                        "tool": "browsers.navigate",
                        "params": {"url": "https://www.youtube.com/results?search_query=nvidia"},
                        "confidence": 0.92
                    })),
                },
            );
            let resolution = resolver
                .resolve_utterance(
                    IntentKind::BrowserControl,
                    "open youtube and search nvidia",
                    &WorldState::empty(),
                )
                .await
                .unwrap();
            assert_eq!(resolution.tool_name, "browsers.navigate");
            assert_eq!(
                resolution.params["url"],
                json!("https://www.youtube.com/results?search_query=nvidia")
            );
        });
    }
}
