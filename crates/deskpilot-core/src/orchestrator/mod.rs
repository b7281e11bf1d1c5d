//! GoalOrchestrator - multi-goal coordination via per-goal planning.
//!
//! Accepts a MetaGoal, resolves filesystem paths authoritatively, calls the
//! planner once per goal in dependency order, threads context frames
//! between planner invocations, and assembles the per-goal plans into one
//! acyclic PlanGraph with a stable topological execution order.
//!
//! Partial success is first-class: a goal that cannot be planned fails
//! together with its transitive descendants, and everything else proceeds.

pub mod path;

use std::collections::{BTreeMap, HashSet};

use crate::planner::GoalPlanner;
use crate::types::{
    ContextFrames, FailedGoal, Goal, MetaGoal, OrchestrationResult, OrchestrationStatus,
    PlanGraph, PlannedAction, RequestContext, Scope, WorldState,
};

pub use path::{PathResolver, ResolvedPath};

/// Multi-goal coordination over the table-driven planner.
#[derive(Debug, Default)]
pub struct GoalOrchestrator {
    planner: GoalPlanner,
}

impl GoalOrchestrator {
    pub fn new() -> Self {
        Self {
            planner: GoalPlanner::new(),
        }
    }

    /// Orchestrate planning for a MetaGoal.
    ///
    /// Goal index order is a valid topological order because the MetaGoal
    /// constructor rejects forward references; the execution order produced
    /// here keeps that order, breaking ties by goal index then by action
    /// index within each goal.
    pub fn orchestrate(
        &self,
        meta_goal: &MetaGoal,
        world: &WorldState,
        request: &RequestContext,
    ) -> OrchestrationResult {
        let resolver = PathResolver::new(request.workspace.to_string_lossy().into_owned());

        let mut frames = ContextFrames::new();
        let mut failed: Vec<FailedGoal> = Vec::new();
        let mut failed_set: HashSet<usize> = HashSet::new();
        let mut resolved_paths: BTreeMap<usize, String> = BTreeMap::new();
        let mut planned_goals: Vec<Goal> = Vec::new();

        let mut nodes: BTreeMap<String, PlannedAction> = BTreeMap::new();
        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut execution_order: Vec<String> = Vec::new();
        let mut goal_map: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        let mut goal_last_action: BTreeMap<usize, String> = BTreeMap::new();

        for (index, goal) in meta_goal.goals().iter().enumerate() {
            let parents = meta_goal.parents_of(index);

            if let Some(&failed_parent) = parents.iter().find(|p| failed_set.contains(p)) {
                tracing::warn!(
                    goal_id = %goal.goal_id,
                    parent = failed_parent,
                    "goal skipped, dependency failed"
                );
                failed.push(FailedGoal {
                    goal_index: index,
                    goal_id: goal.goal_id.clone(),
                    reason: format!("dependency g{failed_parent} failed"),
                });
                failed_set.insert(index);
                planned_goals.push(goal.clone());
                continue;
            }

            let mut goal = goal.clone();
            if goal.domain == "file" {
                // Only a containment dependency inherits the parent's
                // location; ordering dependencies keep the default base.
                let parent_path = if matches!(goal.scope, Scope::Inside(_)) {
                    parents
                        .iter()
                        .find_map(|p| resolved_paths.get(p))
                        .map(String::as_str)
                } else {
                    None
                };
                let identity = goal.identity().unwrap_or("").to_string();
                let resolved =
                    resolver.resolve(&identity, goal.scope.anchor(), parent_path);
                tracing::info!(
                    goal_id = %goal.goal_id,
                    path = %resolved.absolute,
                    anchor = resolved.base_anchor.as_deref().unwrap_or("USER"),
                    "path resolved"
                );
                resolved_paths.insert(index, resolved.absolute.clone());
                goal.resolved_path = Some(resolved.absolute);
            }

            match self.planner.plan(&goal, world, &frames) {
                Ok(planned) => {
                    let action_ids: Vec<String> = planned
                        .plan
                        .actions()
                        .iter()
                        .map(|a| a.action_id.clone())
                        .collect();

                    for (pos, action) in planned.plan.actions().iter().enumerate() {
                        let mut action_parents: Vec<String> = Vec::new();
                        if pos == 0 {
                            // Cross-goal edges: first action of this goal
                            // waits on the last action of each parent goal.
                            for parent in parents {
                                if let Some(last) = goal_last_action.get(parent) {
                                    action_parents.push(last.clone());
                                }
                            }
                        } else {
                            action_parents.push(action_ids[pos - 1].clone());
                        }
                        if !action_parents.is_empty() {
                            edges.insert(action.action_id.clone(), action_parents);
                        }
                        nodes.insert(action.action_id.clone(), action.clone());
                        execution_order.push(action.action_id.clone());
                    }

                    goal_last_action
                        .insert(index, planned.plan.goal_achieved_by().to_string());
                    goal_map.insert(index, action_ids);
                    for frame in planned.produced {
                        frames.push(frame);
                    }
                }
                Err(err) => {
                    tracing::warn!(goal_id = %goal.goal_id, error = %err, "goal planning failed");
                    failed.push(FailedGoal {
                        goal_index: index,
                        goal_id: goal.goal_id.clone(),
                        reason: err.to_string(),
                    });
                    failed_set.insert(index);
                }
            }
            planned_goals.push(goal);
        }

        if nodes.is_empty() {
            return OrchestrationResult {
                status: OrchestrationStatus::Blocked,
                graph: None,
                failed_goals: failed,
                planned_goals,
            };
        }

        let graph = match PlanGraph::new(nodes, edges, execution_order, goal_map) {
            Ok(graph) => graph,
            Err(violation) => {
                // Assembly above only creates backward edges; reaching this
                // arm is a logic error, surfaced as a blocked result.
                tracing::error!(error = %violation, "plan graph assembly violated invariants");
                return OrchestrationResult {
                    status: OrchestrationStatus::Blocked,
                    graph: None,
                    failed_goals: failed,
                    planned_goals,
                };
            }
        };

        let status = if failed.is_empty() {
            OrchestrationStatus::Success
        } else {
            OrchestrationStatus::Partial
        };
        tracing::info!(
            status = ?status,
            actions = graph.total_actions(),
            failed = failed.len(),
            "orchestration complete"
        );

        OrchestrationResult {
            status,
            graph: Some(graph),
            failed_goals: failed,
            planned_goals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetaType, Params, Scope};
    use serde_json::json;
    use std::collections::BTreeMap as Deps;

    fn request() -> RequestContext {
        RequestContext::new("/work/session")
    }

    fn launch_goal(id: &str, app: &str) -> Goal {
        let mut params = Params::new();
        params.insert("app_name".to_string(), json!(app));
        Goal::new("app", "launch", id).with_params(params)
    }

    fn folder_goal(id: &str, name: &str, scope: Scope) -> Goal {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("folder"));
        params.insert("name".to_string(), json!(name));
        Goal::new("file", "create", id)
            .with_params(params)
            .with_object(name)
            .with_scope(scope)
    }

    fn file_goal(id: &str, name: &str, scope: Scope) -> Goal {
        let mut params = Params::new();
        params.insert("object_type".to_string(), json!("file"));
        params.insert("name".to_string(), json!(name));
        Goal::new("file", "create", id)
            .with_params(params)
            .with_object(name)
            .with_scope(scope)
    }

    #[test]
    fn test_independent_goals_produce_two_nodes_no_edges() {
        let meta = MetaGoal::new(
            vec![launch_goal("g0", "chrome"), launch_goal("g1", "spotify")],
            Deps::new(),
        )
        .unwrap();
        assert_eq!(meta.meta_type, MetaType::IndependentMulti);

        let result =
            GoalOrchestrator::new().orchestrate(&meta, &WorldState::empty(), &request());
        assert_eq!(result.status, OrchestrationStatus::Success);
        let graph = result.graph.unwrap();
        assert_eq!(graph.total_actions(), 2);
        assert!(graph.edges().is_empty());
        assert_eq!(graph.execution_order(), ["g0_a1", "g1_a1"]);
    }

    #[test]
    fn test_dependent_file_goals_resolve_paths_and_chain() {
        let mut deps = Deps::new();
        deps.insert(1, vec![0]);
        let meta = MetaGoal::new(
            vec![
                folder_goal("g0", "alex", Scope::Anchor(crate::types::BaseAnchor::Drive('D'))),
                file_goal("g1", "presentation.pptx", Scope::Inside("it".to_string())),
            ],
            deps,
        )
        .unwrap();

        let result =
            GoalOrchestrator::new().orchestrate(&meta, &WorldState::empty(), &request());
        assert_eq!(result.status, OrchestrationStatus::Success);

        let graph = result.graph.unwrap();
        assert_eq!(graph.execution_order(), ["g0_a1", "g1_a1"]);
        assert_eq!(graph.parents_of("g1_a1"), ["g0_a1".to_string()]);

        let folder = graph.node("g0_a1").unwrap();
        assert_eq!(folder.args["path"], json!("D:/alex"));
        let file = graph.node("g1_a1").unwrap();
        assert_eq!(file.args["path"], json!("D:/alex/presentation.pptx"));
        assert_eq!(folder.description, "create:folder:D:/alex");
        assert_eq!(file.description, "create:file:D:/alex/presentation.pptx");

        // The recorded goals carry the authoritative paths.
        assert_eq!(
            result.planned_goals[1].resolved_path.as_deref(),
            Some("D:/alex/presentation.pptx")
        );
    }

    #[test]
    fn test_ordering_dependency_does_not_inherit_parent_path() {
        // g1 runs after g0 but is not contained in it: the delete target
        // resolves against WORKSPACE, not inside D:/taxes.
        let mut delete_params = Params::new();
        delete_params.insert("object_type".to_string(), json!("file"));
        delete_params.insert("name".to_string(), json!("old_invoice.txt"));
        let delete = Goal::new("file", "delete", "g1")
            .with_params(delete_params)
            .with_object("old_invoice.txt")
            .with_scope(Scope::AfterVerb("create".to_string()));

        let mut deps = Deps::new();
        deps.insert(1, vec![0]);
        let meta = MetaGoal::new(
            vec![
                folder_goal(
                    "g0",
                    "taxes",
                    Scope::Anchor(crate::types::BaseAnchor::Drive('D')),
                ),
                delete,
            ],
            deps,
        )
        .unwrap();

        let result =
            GoalOrchestrator::new().orchestrate(&meta, &WorldState::empty(), &request());
        assert_eq!(result.status, OrchestrationStatus::Success);

        let graph = result.graph.unwrap();
        // The ordering edge survives.
        assert_eq!(graph.parents_of("g1_a1"), ["g0_a1".to_string()]);
        // The path does not.
        assert_eq!(
            graph.node("g0_a1").unwrap().args["path"],
            json!("D:/taxes")
        );
        assert_eq!(
            graph.node("g1_a1").unwrap().args["path"],
            json!("/work/session/old_invoice.txt")
        );
    }

    #[test]
    fn test_unplannable_goal_blocks_descendants_only() {
        let mut deps = Deps::new();
        deps.insert(1, vec![0]);
        let meta = MetaGoal::new(
            vec![
                Goal::new("system", "schedule_task", "g0"),
                file_goal("g1", "notes.txt", Scope::Inside("it".to_string())),
                launch_goal("g2", "chrome"),
            ],
            deps,
        )
        .unwrap();

        let result =
            GoalOrchestrator::new().orchestrate(&meta, &WorldState::empty(), &request());
        assert_eq!(result.status, OrchestrationStatus::Partial);
        assert_eq!(result.failed_goals.len(), 2);
        assert!(result.failed_goals[1].reason.contains("dependency"));

        let graph = result.graph.unwrap();
        assert_eq!(graph.total_actions(), 1);
        assert!(graph.node("g2_a1").is_some());
    }

    #[test]
    fn test_all_goals_unplannable_is_blocked() {
        let meta = MetaGoal::new(
            vec![Goal::new("system", "schedule_task", "g0")],
            Deps::new(),
        )
        .unwrap();
        let result =
            GoalOrchestrator::new().orchestrate(&meta, &WorldState::empty(), &request());
        assert_eq!(result.status, OrchestrationStatus::Blocked);
        assert!(result.graph.is_none());
        assert_eq!(result.failed_goals.len(), 1);
    }

    #[test]
    fn test_context_frames_flow_between_goals() {
        // Goal 0: semantic-only navigate producing a browser platform frame.
        // Goal 1: search with no platform, filled from the frame.
        let mut nav_params = Params::new();
        nav_params.insert("platform".to_string(), json!("youtube"));
        let nav = Goal::new("browser", "navigate", "g0").with_params(nav_params);

        let mut search_params = Params::new();
        search_params.insert("query".to_string(), json!("nvidia"));
        let search = Goal::new("browser", "search", "g1")
            .with_params(search_params)
            .with_scope(Scope::AfterVerb("navigate".to_string()));

        let mut deps = Deps::new();
        deps.insert(1, vec![0]);
        let meta = MetaGoal::new(vec![nav, search], deps).unwrap();

        let result =
            GoalOrchestrator::new().orchestrate(&meta, &WorldState::empty(), &request());
        assert_eq!(result.status, OrchestrationStatus::Success);
        let graph = result.graph.unwrap();
        let search_action = graph.node("g1_a1").unwrap();
        assert_eq!(search_action.args["platform"], json!("youtube"));
        assert_eq!(search_action.description, "search:youtube:nvidia");
    }
}
