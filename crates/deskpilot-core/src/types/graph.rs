//! PlanGraph - the assembled action DAG across a MetaGoal.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{Goal, PlannedAction};

/// Invariant violations rejected by the `PlanGraph` constructor.
#[derive(Debug, Error)]
pub enum GraphViolation {
    #[error("edge endpoint '{0}' does not exist in the graph")]
    UnknownEndpoint(String),
    #[error("execution order does not cover node '{0}'")]
    OrderMissingNode(String),
    #[error("execution order lists unknown node '{0}'")]
    OrderUnknownNode(String),
    #[error("execution order places '{child}' before its parent '{parent}'")]
    OrderViolation { child: String, parent: String },
}

/// Acyclic graph of planned actions with a precomputed topological order.
///
/// Edges map a child action id to its parent action ids. The execution order
/// is stable: ties are broken by goal index, then by action index within the
/// goal, which is the insertion order used by the orchestrator.
#[derive(Debug, Clone)]
pub struct PlanGraph {
    nodes: BTreeMap<String, PlannedAction>,
    edges: BTreeMap<String, Vec<String>>,
    execution_order: Vec<String>,
    goal_map: BTreeMap<usize, Vec<String>>,
}

impl PlanGraph {
    /// Construct a graph, verifying that every edge endpoint exists and that
    /// the execution order is a valid topological sort covering every node.
    ///
    /// Acyclicity follows from order validity: a cycle admits no order in
    /// which every parent precedes its child.
    pub fn new(
        nodes: BTreeMap<String, PlannedAction>,
        edges: BTreeMap<String, Vec<String>>,
        execution_order: Vec<String>,
        goal_map: BTreeMap<usize, Vec<String>>,
    ) -> Result<Self, GraphViolation> {
        for (child, parents) in &edges {
            if !nodes.contains_key(child) {
                return Err(GraphViolation::UnknownEndpoint(child.clone()));
            }
            for parent in parents {
                if !nodes.contains_key(parent) {
                    return Err(GraphViolation::UnknownEndpoint(parent.clone()));
                }
            }
        }

        let mut position: BTreeMap<&str, usize> = BTreeMap::new();
        for (idx, id) in execution_order.iter().enumerate() {
            if !nodes.contains_key(id) {
                return Err(GraphViolation::OrderUnknownNode(id.clone()));
            }
            position.insert(id.as_str(), idx);
        }
        for id in nodes.keys() {
            if !position.contains_key(id.as_str()) {
                return Err(GraphViolation::OrderMissingNode(id.clone()));
            }
        }
        for (child, parents) in &edges {
            let child_pos = position[child.as_str()];
            for parent in parents {
                if position[parent.as_str()] >= child_pos {
                    return Err(GraphViolation::OrderViolation {
                        child: child.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        Ok(Self {
            nodes,
            edges,
            execution_order,
            goal_map,
        })
    }

    pub fn node(&self, action_id: &str) -> Option<&PlannedAction> {
        self.nodes.get(action_id)
    }

    pub fn nodes(&self) -> &BTreeMap<String, PlannedAction> {
        &self.nodes
    }

    /// Parent action ids of the given action.
    pub fn parents_of(&self, action_id: &str) -> &[String] {
        self.edges
            .get(action_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn edges(&self) -> &BTreeMap<String, Vec<String>> {
        &self.edges
    }

    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    pub fn goal_map(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.goal_map
    }

    pub fn total_actions(&self) -> usize {
        self.nodes.len()
    }

    /// The goal index an action belongs to.
    pub fn goal_of(&self, action_id: &str) -> Option<usize> {
        self.goal_map
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == action_id))
            .map(|(idx, _)| *idx)
    }
}

/// A goal that could not be planned, with the reason.
#[derive(Debug, Clone)]
pub struct FailedGoal {
    pub goal_index: usize,
    pub goal_id: String,
    pub reason: String,
}

/// Terminal status of the orchestration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationStatus {
    /// Every goal planned.
    Success,
    /// Some goals planned, some failed.
    Partial,
    /// No goal planned.
    Blocked,
}

/// Output of the goal orchestrator.
#[derive(Debug)]
pub struct OrchestrationResult {
    pub status: OrchestrationStatus,
    pub graph: Option<PlanGraph>,
    pub failed_goals: Vec<FailedGoal>,
    /// Goals as planned, with resolved paths filled in (read-only record).
    pub planned_goals: Vec<Goal>,
}
