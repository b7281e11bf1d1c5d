//! Goal, scope grammar, and MetaGoal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Params;

/// Symbolic root for path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseAnchor {
    Workspace,
    Desktop,
    Documents,
    Downloads,
    Home,
    Drive(char),
}

impl BaseAnchor {
    /// Canonical anchor name (e.g. `WORKSPACE`, `DRIVE_D`).
    pub fn name(&self) -> String {
        match self {
            BaseAnchor::Workspace => "WORKSPACE".to_string(),
            BaseAnchor::Desktop => "DESKTOP".to_string(),
            BaseAnchor::Documents => "DOCUMENTS".to_string(),
            BaseAnchor::Downloads => "DOWNLOADS".to_string(),
            BaseAnchor::Home => "HOME".to_string(),
            BaseAnchor::Drive(letter) => format!("DRIVE_{}", letter.to_ascii_uppercase()),
        }
    }
}

/// Scope annotation on a goal.
///
/// The grammar is small and fixed: independence, an ordering dependency, a
/// containment dependency, or a base anchor. Only the interpreter produces
/// scopes; only the orchestrator consumes the containment/anchor forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Independent goal.
    Root,
    /// Depends on the first earlier goal with this verb.
    AfterVerb(String),
    /// Depends on the goal with this id, if earlier.
    AfterGoal(String),
    /// Contained in the named target; implies dependency on its creator.
    Inside(String),
    /// Sets the base anchor; no dependency by itself.
    Anchor(BaseAnchor),
}

impl Scope {
    /// Parse a scope string from the interpreter grammar.
    ///
    /// `root` | `after:<verb-or-gid>` | `inside:<target>` | `drive:<letter>`
    /// | a named anchor token (`desktop`, `documents`, `downloads`, `home`,
    /// `workspace`). Anything unrecognized degrades to `Root`.
    pub fn parse(raw: &str) -> Scope {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();

        if lower.is_empty() || lower == "root" {
            return Scope::Root;
        }
        if let Some(rest) = lower.strip_prefix("after:") {
            let rest = rest.trim();
            // Goal ids are g<N>; everything else is a verb reference.
            let is_goal_id = rest.len() > 1
                && rest.starts_with('g')
                && rest[1..].chars().all(|c| c.is_ascii_digit());
            if is_goal_id {
                return Scope::AfterGoal(rest.to_string());
            }
            return Scope::AfterVerb(rest.to_string());
        }
        if lower.starts_with("inside:") {
            // Preserve the original casing of the target identity.
            return Scope::Inside(trimmed[7..].trim().to_string());
        }
        if let Some(rest) = lower.strip_prefix("drive:") {
            if let Some(letter) = rest.trim().chars().next() {
                if letter.is_ascii_alphabetic() {
                    return Scope::Anchor(BaseAnchor::Drive(letter.to_ascii_uppercase()));
                }
            }
            return Scope::Root;
        }
        match lower.as_str() {
            "workspace" => Scope::Anchor(BaseAnchor::Workspace),
            "desktop" => Scope::Anchor(BaseAnchor::Desktop),
            "documents" => Scope::Anchor(BaseAnchor::Documents),
            "downloads" => Scope::Anchor(BaseAnchor::Downloads),
            "home" => Scope::Anchor(BaseAnchor::Home),
            _ => Scope::Root,
        }
    }

    /// Anchor carried by this scope, if any.
    pub fn anchor(&self) -> Option<&BaseAnchor> {
        match self {
            Scope::Anchor(anchor) => Some(anchor),
            _ => None,
        }
    }
}

/// A single parametric goal.
///
/// `domain` and `verb` are open strings; validity is enforced at planning
/// time against the rules table, not here. `resolved_path` is written only
/// by the orchestrator for file-domain goals; until then, any raw path in
/// `params` is an identity name, not a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub domain: String,
    pub verb: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub object: Option<String>,
    pub scope: Scope,
    /// Positional id assigned by the interpreter (`g0`, `g1`, ...).
    pub goal_id: String,
    /// Authoritative absolute path, set by the orchestrator's PathResolver.
    #[serde(default)]
    pub resolved_path: Option<String>,
}

impl Goal {
    /// Create a goal with an empty parameter map and root scope.
    pub fn new(domain: impl Into<String>, verb: impl Into<String>, goal_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            verb: verb.into(),
            params: Params::new(),
            object: None,
            scope: Scope::Root,
            goal_id: goal_id.into(),
            resolved_path: None,
        }
    }

    /// Set parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set the object identity.
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// String parameter accessor.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// The identity this goal creates or manipulates, for containment
    /// matching: explicit object, else `target`/`name`/`path` param.
    pub fn identity(&self) -> Option<&str> {
        self.object
            .as_deref()
            .or_else(|| self.param_str("target"))
            .or_else(|| self.param_str("name"))
            .or_else(|| self.param_str("path"))
    }
}

/// Structure of a multi-goal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaType {
    Single,
    IndependentMulti,
    DependentMulti,
}

/// Invariant violations rejected by the `MetaGoal` constructor.
#[derive(Debug, Error)]
pub enum MetaGoalViolation {
    #[error("meta goal must contain at least one goal")]
    Empty,
    #[error("goal {0} depends on itself")]
    SelfDependency(usize),
    #[error("goal {child} depends on later goal {parent}")]
    ForwardReference { child: usize, parent: usize },
    #[error("goal {child} depends on unknown goal {parent}")]
    UnknownParent { child: usize, parent: usize },
}

/// An ordered tuple of goals plus a dependency DAG over their indices.
///
/// Because forward references are rejected, goal index order is always a
/// valid topological order.
#[derive(Debug, Clone)]
pub struct MetaGoal {
    pub meta_type: MetaType,
    goals: Vec<Goal>,
    dependencies: BTreeMap<usize, Vec<usize>>,
}

impl MetaGoal {
    /// Construct a meta goal, deriving `meta_type` and enforcing the DAG
    /// invariants: acyclic, no self-dependency, no forward reference.
    pub fn new(
        goals: Vec<Goal>,
        dependencies: BTreeMap<usize, Vec<usize>>,
    ) -> Result<Self, MetaGoalViolation> {
        if goals.is_empty() {
            return Err(MetaGoalViolation::Empty);
        }
        for (&child, parents) in &dependencies {
            if child >= goals.len() {
                return Err(MetaGoalViolation::UnknownParent {
                    child,
                    parent: child,
                });
            }
            for &parent in parents {
                if parent == child {
                    return Err(MetaGoalViolation::SelfDependency(child));
                }
                if parent > child {
                    return Err(MetaGoalViolation::ForwardReference { child, parent });
                }
                if parent >= goals.len() {
                    return Err(MetaGoalViolation::UnknownParent { child, parent });
                }
            }
        }

        let has_deps = dependencies.values().any(|parents| !parents.is_empty());
        let meta_type = if goals.len() == 1 && !has_deps {
            MetaType::Single
        } else if !has_deps {
            MetaType::IndependentMulti
        } else {
            MetaType::DependentMulti
        };

        Ok(Self {
            meta_type,
            goals,
            dependencies,
        })
    }

    /// A single-goal meta goal.
    pub fn single(goal: Goal) -> Self {
        Self {
            meta_type: MetaType::Single,
            goals: vec![goal],
            dependencies: BTreeMap::new(),
        }
    }

    /// The goals, in interpreter order.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Parent indices for a goal.
    pub fn parents_of(&self, index: usize) -> &[usize] {
        self.dependencies
            .get(&index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The full dependency map.
    pub fn dependencies(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.dependencies
    }
}
