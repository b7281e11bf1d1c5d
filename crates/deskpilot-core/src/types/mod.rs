//! Core type definitions for DeskPilot
//!
//! This module contains the value types that cross stage boundaries:
//! - Utterance: one user request plus its frozen world snapshot
//! - Classification / IntentKind: routing tags
//! - Goal / MetaGoal: semantic goal descriptors and their dependency DAG
//! - PlannedAction / Plan / PlanGraph: validated, parameter-authoritative steps
//! - ContextFrame: typed semantic continuity between planner invocations
//!
//! Everything here is immutable after construction. Constructors enforce the
//! structural invariants; violating them is a programmer error, not a runtime
//! condition.

mod context;
mod goal;
mod graph;
mod intent;
mod plan;
mod utterance;
mod world;

pub use context::{ContextFrame, ContextFrames};
pub use goal::{BaseAnchor, Goal, MetaGoal, MetaGoalViolation, MetaType, Scope};
pub use graph::{FailedGoal, GraphViolation, OrchestrationResult, OrchestrationStatus, PlanGraph};
pub use intent::{Classification, IntentClassification, IntentDecision, IntentKind};
pub use plan::{ActionClass, Plan, PlanViolation, PlannedAction};
pub use utterance::{RequestContext, Utterance};
pub use world::{FocusedWindow, WorldState};

/// Parameter map attached to goals, actions, and tool invocations.
pub type Params = serde_json::Map<String, serde_json::Value>;
