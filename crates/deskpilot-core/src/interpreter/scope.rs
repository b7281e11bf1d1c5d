//! Scope-based dependency derivation.
//!
//! Dependencies are derived locally and deterministically from each goal's
//! scope annotation; the provider never emits graph structure directly.
//! For file-domain goals with anaphoric containment ("inside it"), a stack
//! of recently-opened containers binds each child to the MOST RECENT
//! container, not the first. Folders push onto the stack; files never do.
//! A user-originated linguistic anchor resets the stack; provider-generated
//! absolute path strings never establish structure.

use std::collections::BTreeMap;

use crate::types::{BaseAnchor, Goal, Scope};

/// Anaphoric containment targets that refer to "whatever was just opened".
fn is_anaphoric(target: &str) -> bool {
    matches!(target.to_lowercase().as_str(), "it" | "that" | "this")
}

/// Whether the goal is a container that later children can bind to.
///
/// Folders push onto the container stack; files never do. With no explicit
/// object type, an identity without an extension counts as a folder.
fn is_container(goal: &Goal) -> bool {
    if goal.domain != "file" {
        return false;
    }
    match goal.param_str("object_type") {
        Some("folder") => true,
        Some(_) => false,
        None => goal
            .identity()
            .map(|name| !last_segment(name).contains('.'))
            .unwrap_or(false),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Whether the user text carries a linguistic cue for this anchor.
///
/// The single source of truth for anchor detection: an anchor scope on a
/// goal survives interpretation only when this check passes, so provider
/// echoes of absolute paths never establish a location.
pub fn anchor_mentioned_in_text(anchor: &BaseAnchor, text: &str) -> bool {
    let lower = text.to_lowercase();
    match anchor {
        BaseAnchor::Drive(letter) => {
            let l = letter.to_ascii_lowercase();
            lower.contains(&format!("{l} drive"))
                || lower.contains(&format!("drive {l}"))
                || lower.contains(&format!("{l}:"))
        }
        BaseAnchor::Desktop => lower.contains("desktop"),
        BaseAnchor::Documents => lower.contains("documents"),
        BaseAnchor::Downloads => lower.contains("downloads"),
        BaseAnchor::Home => lower.contains("home"),
        BaseAnchor::Workspace => {
            lower.contains("workspace") || lower.contains("root folder") || lower.contains("here")
        }
    }
}

/// Derive the dependency map for an ordered goal list.
///
/// Self references and forward references are dropped with a warning; the
/// result is always a valid DAG over goal indices.
pub fn derive_dependencies(goals: &[Goal]) -> BTreeMap<usize, Vec<usize>> {
    let mut dependencies: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    // Indices of containers opened so far, innermost last.
    let mut container_stack: Vec<usize> = Vec::new();

    for (index, goal) in goals.iter().enumerate() {
        let parent = match &goal.scope {
            Scope::Root => None,
            Scope::Anchor(_) => {
                // An explicit anchor opens a fresh location scope.
                container_stack.clear();
                None
            }
            Scope::AfterVerb(verb) => {
                let found = goals[..index].iter().position(|g| &g.verb == verb);
                if found.is_none() {
                    tracing::warn!(
                        goal_id = %goal.goal_id,
                        verb = %verb,
                        "after-verb scope matches no earlier goal, dropping dependency"
                    );
                }
                found
            }
            Scope::AfterGoal(gid) => {
                let found = goals[..index].iter().position(|g| &g.goal_id == gid);
                if found.is_none() {
                    tracing::warn!(
                        goal_id = %goal.goal_id,
                        target = %gid,
                        "after-goal scope names no earlier goal, dropping dependency"
                    );
                }
                found
            }
            Scope::Inside(target) => {
                if is_anaphoric(target) {
                    // Bind to the most recent container.
                    let top = container_stack.last().copied();
                    if top.is_none() {
                        tracing::warn!(
                            goal_id = %goal.goal_id,
                            "anaphoric containment with no open container, dropping dependency"
                        );
                    }
                    top
                } else {
                    let found = goals[..index].iter().position(|g| {
                        g.domain == "file"
                            && g.identity()
                                .map(|id| {
                                    last_segment(id).eq_ignore_ascii_case(last_segment(target))
                                })
                                .unwrap_or(false)
                    });
                    if found.is_none() {
                        tracing::warn!(
                            goal_id = %goal.goal_id,
                            target = %target,
                            "containment target matches no earlier file goal, dropping dependency"
                        );
                    }
                    found
                }
            }
        };

        if let Some(parent) = parent {
            if parent != index {
                dependencies.entry(index).or_default().push(parent);
            }
        }

        if is_container(goal) {
            container_stack.push(index);
        }
    }

    dependencies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Params;
    use serde_json::json;

    fn folder(id: &str, name: &str, scope: Scope) -> Goal {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("folder"));
        params.insert("name".to_string(), json!(name));
        Goal::new("file", "create", id)
            .with_params(params)
            .with_object(name)
            .with_scope(scope)
    }

    fn file(id: &str, name: &str, scope: Scope) -> Goal {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("file"));
        params.insert("name".to_string(), json!(name));
        Goal::new("file", "create", id)
            .with_params(params)
            .with_object(name)
            .with_scope(scope)
    }

    #[test]
    fn test_deep_nesting_binds_to_most_recent_container() {
        // space -> galaxy -> milkyway: each anaphoric child binds to the
        // container just above it, not the first one.
        let goals = vec![
            folder("g0", "space", Scope::Root),
            folder("g1", "galaxy", Scope::Inside("it".to_string())),
            file("g2", "milkyway.txt", Scope::Inside("it".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert_eq!(deps.get(&1), Some(&vec![0]));
        assert_eq!(deps.get(&2), Some(&vec![1]));
    }

    #[test]
    fn test_explicit_containment_target_preserved() {
        // folder A, folder B, file X inside B: the explicit target wins even
        // though B is not the only container.
        let goals = vec![
            folder("g0", "A", Scope::Root),
            folder("g1", "B", Scope::Root),
            file("g2", "X.txt", Scope::Inside("B".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert_eq!(deps.get(&2), Some(&vec![1]));
    }

    #[test]
    fn test_files_do_not_push_to_container_stack() {
        // folder A, file X inside it, folder B inside it, file Y inside it:
        // after X the stack is still [A]; after B it is [A, B]; Y binds to B.
        let goals = vec![
            folder("g0", "A", Scope::Root),
            file("g1", "X.txt", Scope::Inside("it".to_string())),
            folder("g2", "B", Scope::Inside("it".to_string())),
            file("g3", "Y.txt", Scope::Inside("it".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert_eq!(deps.get(&1), Some(&vec![0]));
        assert_eq!(deps.get(&2), Some(&vec![0]));
        assert_eq!(deps.get(&3), Some(&vec![2]));
    }

    #[test]
    fn test_five_level_nesting() {
        let goals = vec![
            folder("g0", "universe", Scope::Root),
            folder("g1", "galaxy", Scope::Inside("it".to_string())),
            folder("g2", "milkyway", Scope::Inside("it".to_string())),
            folder("g3", "solar", Scope::Inside("it".to_string())),
            file("g4", "earth.txt", Scope::Inside("it".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert_eq!(deps.get(&1), Some(&vec![0]));
        assert_eq!(deps.get(&2), Some(&vec![1]));
        assert_eq!(deps.get(&3), Some(&vec![2]));
        assert_eq!(deps.get(&4), Some(&vec![3]));
    }

    #[test]
    fn test_anchor_scope_resets_container_stack() {
        // A new explicit location scope means "inside it" cannot bind to the
        // containers of the previous scope by accident.
        let goals = vec![
            folder("g0", "alpha", Scope::Root),
            folder("g1", "beta", Scope::Anchor(BaseAnchor::Desktop)),
            file("g2", "notes.txt", Scope::Inside("it".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert_eq!(deps.get(&1), None);
        assert_eq!(deps.get(&2), Some(&vec![1]));
    }

    #[test]
    fn test_after_verb_binds_first_matching_goal() {
        let goals = vec![
            Goal::new("app", "launch", "g0").with_object("notepad"),
            Goal::new("input", "type", "g1")
                .with_scope(Scope::AfterVerb("launch".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert_eq!(deps.get(&1), Some(&vec![0]));
    }

    #[test]
    fn test_unmatched_references_are_dropped_not_fabricated() {
        let goals = vec![
            Goal::new("file", "create", "g0")
                .with_scope(Scope::AfterGoal("g9".to_string())),
            Goal::new("file", "create", "g1")
                .with_scope(Scope::Inside("nonexistent".to_string())),
        ];
        let deps = derive_dependencies(&goals);
        assert!(deps.is_empty());
    }

    #[test]
    fn test_anchor_cue_detection() {
        let drive = BaseAnchor::Drive('D');
        assert!(anchor_mentioned_in_text(&drive, "create folder alex on D drive"));
        assert!(anchor_mentioned_in_text(&drive, "put it on drive d"));
        assert!(!anchor_mentioned_in_text(&drive, "create folder alex"));
        assert!(anchor_mentioned_in_text(
            &BaseAnchor::Desktop,
            "save it on the desktop"
        ));
        assert!(anchor_mentioned_in_text(
            &BaseAnchor::Workspace,
            "in the root folder"
        ));
    }
}
