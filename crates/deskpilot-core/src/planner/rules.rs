//! Planner rules - declarative mapping from (domain, verb) to a planned action.
//!
//! Goals are semantic (WHAT); tools are procedural (HOW); this table maps
//! between them. It replaces per-domain planner methods: no branching, no
//! if/else chains over domain names, just table lookup. Adding behavior is
//! a data edit.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::PipelineError;
use crate::types::{ActionClass, IntentKind, Params};

/// Fill a missing planner param from an upstream context frame.
#[derive(Debug, Clone, Copy)]
pub struct ContextBinding {
    pub param: &'static str,
    pub domain: &'static str,
    pub key: &'static str,
}

/// Context frame emitted after successful validation.
#[derive(Debug, Clone, Copy)]
pub struct ContextProduction {
    pub domain: &'static str,
    pub keys: &'static [&'static str],
}

/// Declarative parameter derivations applied before validation.
///
/// These keep URL building and similar mechanics in rule data so the
/// planner body stays generic.
#[derive(Debug, Clone, Copy)]
pub enum ParamSynthesis {
    /// Build a search URL from `platform` + `query` into the named param.
    SearchUrl { into: &'static str },
    /// Prefix `https://` when the named param has no scheme.
    EnsureUrlScheme { param: &'static str },
}

/// One planner rule for a (domain, verb) pair.
#[derive(Debug, Clone, Copy)]
pub struct PlannerRule {
    pub intent: IntentKind,
    pub action_class: ActionClass,
    pub description_template: &'static str,
    pub required_params: &'static [&'static str],
    pub default_params: &'static [(&'static str, &'static str)],
    pub allowed_values: &'static [(&'static str, &'static [&'static str])],
    /// Accept the goal without all technical params; the planner then emits
    /// a context-producing action instead of a tool call.
    pub allow_semantic_only: bool,
    /// The verb's tool owns its execution context; no app launch is needed
    /// before it.
    pub session_bootstraps: bool,
    /// The action must attach to the plan-scoped session.
    pub requires_session: bool,
    /// The goal operates on a filesystem path that the orchestrator must
    /// have resolved to an absolute location.
    pub requires_resolved_path: bool,
    pub synthesize: &'static [ParamSynthesis],
    pub context_consumption: &'static [ContextBinding],
    pub context_production: Option<ContextProduction>,
}

const BASE: PlannerRule = PlannerRule {
    intent: IntentKind::Unknown,
    action_class: ActionClass::Actuate,
    description_template: "",
    required_params: &[],
    default_params: &[],
    allowed_values: &[],
    allow_semantic_only: false,
    session_bootstraps: false,
    requires_session: false,
    requires_resolved_path: false,
    synthesize: &[],
    context_consumption: &[],
    context_production: None,
};

/// Search-engine URL templates keyed by platform.
pub const SEARCH_ENGINES: &[(&str, &str)] = &[
    ("youtube", "https://www.youtube.com/results?search_query={query}"),
    ("google", "https://www.google.com/search?q={query}"),
    ("bing", "https://www.bing.com/search?q={query}"),
    ("duckduckgo", "https://duckduckgo.com/?q={query}"),
    ("github", "https://github.com/search?q={query}"),
    ("stackoverflow", "https://stackoverflow.com/search?q={query}"),
];

pub const DEFAULT_SEARCH_ENGINE: &str = "google";

/// User-language verb aliases normalized before table lookup.
const VERB_ALIASES: &[(&str, &str)] = &[
    ("make", "create"),
    ("new", "create"),
    ("add", "create"),
    ("mkdir", "create"),
    ("remove", "delete"),
    ("rm", "delete"),
    ("rmdir", "delete"),
    ("mv", "move"),
    ("cp", "copy"),
    ("duplicate", "copy"),
    ("ren", "rename"),
];

static RULES: Lazy<HashMap<String, PlannerRule>> = Lazy::new(|| {
    let entries: &[((&str, &str), PlannerRule)] = &[
        // browser
        (
            ("browser", "navigate"),
            PlannerRule {
                intent: IntentKind::BrowserControl,
                description_template: "navigate:{url}",
                required_params: &["url"],
                allow_semantic_only: true,
                session_bootstraps: true,
                requires_session: true,
                synthesize: &[ParamSynthesis::EnsureUrlScheme { param: "url" }],
                context_consumption: &[ContextBinding {
                    param: "platform",
                    domain: "browser",
                    key: "platform",
                }],
                context_production: Some(ContextProduction {
                    domain: "browser",
                    keys: &["platform"],
                }),
                ..BASE
            },
        ),
        (
            ("browser", "search"),
            PlannerRule {
                intent: IntentKind::BrowserControl,
                description_template: "search:{platform}:{query}",
                required_params: &["query"],
                default_params: &[("platform", DEFAULT_SEARCH_ENGINE)],
                allowed_values: &[(
                    "platform",
                    &["google", "youtube", "bing", "duckduckgo", "github", "stackoverflow"],
                )],
                session_bootstraps: true,
                requires_session: true,
                synthesize: &[ParamSynthesis::SearchUrl { into: "url" }],
                context_consumption: &[ContextBinding {
                    param: "platform",
                    domain: "browser",
                    key: "platform",
                }],
                context_production: Some(ContextProduction {
                    domain: "browser",
                    keys: &["platform"],
                }),
                ..BASE
            },
        ),
        (
            ("browser", "click"),
            PlannerRule {
                intent: IntentKind::BrowserControl,
                description_template: "click:{selector}",
                required_params: &["selector"],
                session_bootstraps: true,
                requires_session: true,
                ..BASE
            },
        ),
        (
            ("browser", "type"),
            PlannerRule {
                intent: IntentKind::BrowserControl,
                description_template: "type:{selector}:{text}",
                required_params: &["selector", "text"],
                session_bootstraps: true,
                requires_session: true,
                ..BASE
            },
        ),
        (
            ("browser", "read"),
            PlannerRule {
                intent: IntentKind::BrowserControl,
                action_class: ActionClass::Observe,
                description_template: "read:{target}",
                required_params: &["target"],
                allowed_values: &[("target", &["title", "url", "text"])],
                session_bootstraps: true,
                requires_session: true,
                ..BASE
            },
        ),
        (
            ("browser", "scroll"),
            PlannerRule {
                intent: IntentKind::BrowserControl,
                description_template: "scroll:{direction}",
                default_params: &[("direction", "down")],
                allowed_values: &[("direction", &["up", "down", "left", "right"])],
                session_bootstraps: true,
                requires_session: true,
                ..BASE
            },
        ),
        // file
        (
            ("file", "create"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                description_template: "create:{object_type}:{path}",
                required_params: &["object_type", "name"],
                allowed_values: &[("object_type", &["file", "folder"])],
                requires_resolved_path: true,
                ..BASE
            },
        ),
        (
            ("file", "delete"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                description_template: "delete:{object_type}:{path}",
                required_params: &["object_type", "name"],
                allowed_values: &[("object_type", &["file", "folder"])],
                requires_resolved_path: true,
                ..BASE
            },
        ),
        (
            ("file", "move"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                description_template: "move:{source}:{destination}",
                required_params: &["source", "destination"],
                ..BASE
            },
        ),
        (
            ("file", "copy"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                description_template: "copy:{source}:{destination}",
                required_params: &["source", "destination"],
                ..BASE
            },
        ),
        (
            ("file", "rename"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                description_template: "rename:{source}:{target}",
                required_params: &["source", "target"],
                ..BASE
            },
        ),
        (
            ("file", "read"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                action_class: ActionClass::Observe,
                description_template: "read:{path}",
                required_params: &["name"],
                requires_resolved_path: true,
                ..BASE
            },
        ),
        (
            ("file", "write"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                description_template: "write:{path}",
                required_params: &["name"],
                requires_resolved_path: true,
                ..BASE
            },
        ),
        (
            ("file", "list"),
            PlannerRule {
                intent: IntentKind::FileOperation,
                action_class: ActionClass::Observe,
                description_template: "list:{path}",
                requires_resolved_path: true,
                ..BASE
            },
        ),
        // app
        (
            ("app", "launch"),
            PlannerRule {
                intent: IntentKind::ApplicationLaunch,
                description_template: "launch:{app_name}",
                required_params: &["app_name"],
                ..BASE
            },
        ),
        (
            ("app", "focus"),
            PlannerRule {
                intent: IntentKind::ApplicationControl,
                description_template: "focus:{app_name}",
                required_params: &["app_name"],
                ..BASE
            },
        ),
        (
            ("app", "close"),
            PlannerRule {
                intent: IntentKind::ApplicationControl,
                description_template: "close:{app_name}",
                required_params: &["app_name"],
                ..BASE
            },
        ),
        // system
        (
            ("system", "set"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "set:{target}:{value}",
                required_params: &["target", "value"],
                allowed_values: &[("target", &["volume", "brightness"])],
                ..BASE
            },
        ),
        (
            ("system", "get"),
            PlannerRule {
                intent: IntentKind::SystemQuery,
                action_class: ActionClass::Observe,
                description_template: "get:{target}",
                required_params: &["target"],
                allowed_values: &[(
                    "target",
                    &["battery", "time", "screenshot", "wifi", "bluetooth"],
                )],
                ..BASE
            },
        ),
        (
            ("system", "toggle"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "toggle:{target}",
                required_params: &["target"],
                allowed_values: &[("target", &["mute", "wifi", "bluetooth", "airplane_mode"])],
                ..BASE
            },
        ),
        (
            ("system", "query"),
            PlannerRule {
                intent: IntentKind::SystemQuery,
                action_class: ActionClass::Observe,
                description_template: "query:{target}",
                required_params: &["target"],
                ..BASE
            },
        ),
        // media
        (
            ("media", "play"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "media:play",
                ..BASE
            },
        ),
        (
            ("media", "pause"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "media:pause",
                ..BASE
            },
        ),
        (
            ("media", "stop"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "media:stop",
                ..BASE
            },
        ),
        (
            ("media", "next"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "media:next",
                ..BASE
            },
        ),
        (
            ("media", "previous"),
            PlannerRule {
                intent: IntentKind::SystemControl,
                description_template: "media:previous",
                ..BASE
            },
        ),
        // memory
        (
            ("memory", "store"),
            PlannerRule {
                intent: IntentKind::MemoryRecall,
                description_template: "store:{key}:{value}",
                required_params: &["key", "value"],
                ..BASE
            },
        ),
        (
            ("memory", "recall"),
            PlannerRule {
                intent: IntentKind::MemoryRecall,
                action_class: ActionClass::Observe,
                description_template: "recall:{key}",
                ..BASE
            },
        ),
    ];
    entries
        .iter()
        .map(|((domain, verb), rule)| (format!("{domain}.{verb}"), *rule))
        .collect()
});

/// Normalize a user-language verb to its canonical table form.
pub fn canonical_verb(verb: &str) -> &str {
    VERB_ALIASES
        .iter()
        .find(|(alias, _)| *alias == verb)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(verb)
}

/// Look up the rule for a (domain, verb) pair, normalizing verb aliases.
pub fn rule_for(domain: &str, verb: &str) -> Option<&'static PlannerRule> {
    RULES.get(&format!("{domain}.{}", canonical_verb(verb)))
}

/// Search URL for a platform; unknown platforms fall back to the default
/// engine with the platform folded into the query.
pub fn search_url(platform: &str, query: &str) -> String {
    let template = SEARCH_ENGINES
        .iter()
        .find(|(name, _)| *name == platform)
        .map(|(_, template)| *template);
    match template {
        Some(template) => template.replace("{query}", &urlencoding::encode(query)),
        None => {
            tracing::warn!(platform = %platform, "unknown search platform, defaulting");
            let folded = format!("{platform} {query}");
            SEARCH_ENGINES[1].1.replace("{query}", &urlencoding::encode(&folded))
        }
    }
}

/// Format a description template over validated params.
///
/// Unknown placeholders are left intact rather than guessed.
pub fn format_description(template: &str, params: &Params) -> String {
    let mut result = template.to_string();
    for (key, value) in params {
        let placeholder = format!("{{{key}}}");
        if result.contains(&placeholder) {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            result = result.replace(&placeholder, &rendered);
        }
    }
    result
}

/// Validate params against the rule. Fail fast; never guess.
///
/// Defaults are merged first (explicit params win); required params must be
/// present and non-null; allowed values are a hard constraint.
pub fn validate_params(
    domain: &str,
    verb: &str,
    params: &Params,
    rule: &PlannerRule,
) -> Result<Params, PipelineError> {
    let mut merged = params.clone();
    for (key, default) in rule.default_params {
        merged
            .entry((*key).to_string())
            .or_insert_with(|| Value::String((*default).to_string()));
    }

    let missing: Vec<&str> = rule
        .required_params
        .iter()
        .copied()
        .filter(|key| merged.get(*key).map(Value::is_null).unwrap_or(true))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::ValidationFailed {
            domain: domain.to_string(),
            verb: verb.to_string(),
            reason: format!("missing required params: {}", missing.join(", ")),
        });
    }

    for (param, allowed) in rule.allowed_values {
        if let Some(value) = merged.get(*param) {
            let ok = value
                .as_str()
                .map(|s| allowed.contains(&s))
                .unwrap_or(false);
            if !ok {
                return Err(PipelineError::ValidationFailed {
                    domain: domain.to_string(),
                    verb: verb.to_string(),
                    reason: format!(
                        "invalid value {value} for '{param}', allowed: {}",
                        allowed.join(", ")
                    ),
                });
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_aliases_normalize_before_lookup() {
        assert!(rule_for("file", "mkdir").is_some());
        assert!(rule_for("file", "make").is_some());
        assert!(rule_for("file", "rm").is_some());
        assert_eq!(canonical_verb("mkdir"), "create");
        assert_eq!(canonical_verb("navigate"), "navigate");
    }

    #[test]
    fn test_unknown_pair_has_no_rule() {
        assert!(rule_for("system", "schedule_task").is_none());
        assert!(rule_for("teleport", "engage").is_none());
    }

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            search_url("youtube", "nvidia"),
            "https://www.youtube.com/results?search_query=nvidia"
        );
        assert_eq!(
            search_url("google", "rust language"),
            "https://www.google.com/search?q=rust%20language"
        );
    }

    #[test]
    fn test_unknown_platform_folds_into_default_engine() {
        let url = search_url("wikipedia", "rust");
        assert!(url.starts_with("https://www.google.com/search?q="));
        assert!(url.contains("wikipedia"));
    }

    #[test]
    fn test_validate_applies_defaults_without_overriding() {
        let rule = rule_for("browser", "search").unwrap();
        let mut params = Params::new();
        params.insert("query".to_string(), json!("nvidia"));
        let merged = validate_params("browser", "search", &params, rule).unwrap();
        assert_eq!(merged["platform"], json!("google"));

        params.insert("platform".to_string(), json!("youtube"));
        let merged = validate_params("browser", "search", &params, rule).unwrap();
        assert_eq!(merged["platform"], json!("youtube"));
    }

    #[test]
    fn test_missing_required_param_fails_fast() {
        let rule = rule_for("browser", "search").unwrap();
        let err = validate_params("browser", "search", &Params::new(), rule).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed { .. }));
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_allowed_values_are_hard_constraints() {
        let rule = rule_for("file", "create").unwrap();
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("symlink"));
        params.insert("name".to_string(), json!("x"));
        let err = validate_params("file", "create", &params, rule).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed { .. }));
    }

    #[test]
    fn test_format_description_leaves_unknown_placeholders() {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("folder"));
        assert_eq!(
            format_description("create:{object_type}:{path}", &params),
            "create:folder:{path}"
        );
    }
}
