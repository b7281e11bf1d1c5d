//! PlanExecutor - plan-scoped, precondition-enforcing graph execution.
//!
//! The executor drives a PlanGraph against resolved tools:
//! - one executor instance per plan execution, enforced by consuming `self`
//! - a session is acquired at most once, at plan start, when any resolved
//!   tool declares `requires_session`; tools never create sessions mid-plan
//! - preconditions come from capability records and are checked here, not
//!   in prompts
//! - an action starts only after every parent reported success; a failed
//!   parent skips the action with `DependencyFailed`
//! - pressed modifier keys are registered and force-released on failure,
//!   cancellation, and teardown
//!
//! Independent ready actions may run concurrently up to `max_parallel`;
//! dependency edges are always honored.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::capability::{
    Capability, SessionHandle, SessionManager, Tool, ToolRegistry,
};
use crate::resolver::Resolution;
use crate::types::{Params, PlanGraph, PlannedAction, RequestContext, WorldState};

const DEFAULT_MAX_PARALLEL: usize = 4;
const DEFAULT_DESTRUCTIVE_COOLDOWN: Duration = Duration::from_millis(500);

/// Terminal status of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Success,
    Failed,
    /// Skipped because a parent did not succeed.
    DependencyFailed,
    /// A declared precondition did not hold.
    PreconditionUnmet,
    /// Not started because the request was cancelled.
    Cancelled,
}

/// Recorded outcome of one action, keyed by action id in the report.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub action_id: String,
    pub tool_name: Option<String>,
    pub status: ActionStatus,
    pub data: Params,
    pub error: Option<String>,
}

impl ActionOutcome {
    fn new(action_id: impl Into<String>, status: ActionStatus) -> Self {
        Self {
            action_id: action_id.into(),
            tool_name: None,
            status,
            data: Params::new(),
            error: None,
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Terminal status of the whole plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Success,
    Partial,
    Failed,
    Blocked,
}

/// Aggregated result of one plan execution.
#[derive(Debug)]
pub struct ExecutionReport {
    pub final_status: FinalStatus,
    pub outcomes: BTreeMap<String, ActionOutcome>,
    pub session_id: Option<String>,
}

impl ExecutionReport {
    /// Ids of actions that completed successfully, in graph order.
    pub fn completed_ids(&self) -> Vec<&str> {
        self.outcomes
            .values()
            .filter(|o| o.status == ActionStatus::Success)
            .map(|o| o.action_id.as_str())
            .collect()
    }
}

/// Explicit confirmation channel for destructive tools.
#[async_trait]
pub trait DestructiveGate: Send + Sync {
    async fn confirm(&self, action: &PlannedAction, tool_name: &str) -> bool;
}

/// Deferred goal-satisfaction pre-check hook.
///
/// The default executor carries no check and always executes; wiring a real
/// check in is an extension point, deliberately not pre-implemented.
#[async_trait]
pub trait SatisfactionCheck: Send + Sync {
    async fn already_satisfied(&self, action: &PlannedAction, world: &WorldState) -> bool;
}

/// Tracks modifier keys pressed by tools so a failure or cancel can
/// guarantee their release.
struct ModifierGuard {
    pressed: Mutex<Vec<String>>,
}

impl ModifierGuard {
    fn new() -> Self {
        Self {
            pressed: Mutex::new(Vec::new()),
        }
    }

    async fn register_from(&self, data: &Params) {
        if let Some(keys) = data.get("modifiers_pressed").and_then(Value::as_array) {
            let mut pressed = self.pressed.lock().await;
            for key in keys.iter().filter_map(Value::as_str) {
                if !pressed.iter().any(|k| k == key) {
                    pressed.push(key.to_string());
                }
            }
        }
    }

    async fn release_all(&self, registry: &Arc<dyn ToolRegistry>) {
        let keys: Vec<String> = {
            let mut pressed = self.pressed.lock().await;
            std::mem::take(&mut *pressed)
        };
        if keys.is_empty() {
            return;
        }
        match registry.tool("system.input.keyboard.release") {
            Some(tool) => {
                let mut args = Params::new();
                args.insert("keys".to_string(), Value::Array(
                    keys.iter().map(|k| Value::String(k.clone())).collect(),
                ));
                let outcome = tool.execute(&args, None).await;
                if !outcome.is_success() {
                    tracing::error!(keys = ?keys, "modifier release tool failed");
                }
            }
            None => {
                tracing::error!(keys = ?keys, "no release tool registered, modifiers may be stuck");
            }
        }
    }
}

/// Drives one plan graph to completion. Consumed by `execute`; a new plan
/// execution requires a new executor.
pub struct PlanExecutor {
    registry: Arc<dyn ToolRegistry>,
    sessions: Option<Arc<dyn SessionManager>>,
    destructive_gate: Option<Arc<dyn DestructiveGate>>,
    satisfaction: Option<Arc<dyn SatisfactionCheck>>,
    max_parallel: usize,
    destructive_cooldown: Duration,
}

impl PlanExecutor {
    pub fn new(registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            registry,
            sessions: None,
            destructive_gate: None,
            satisfaction: None,
            max_parallel: DEFAULT_MAX_PARALLEL,
            destructive_cooldown: DEFAULT_DESTRUCTIVE_COOLDOWN,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionManager>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_destructive_gate(mut self, gate: Arc<dyn DestructiveGate>) -> Self {
        self.destructive_gate = Some(gate);
        self
    }

    pub fn with_satisfaction_check(mut self, check: Arc<dyn SatisfactionCheck>) -> Self {
        self.satisfaction = Some(check);
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_destructive_cooldown(mut self, cooldown: Duration) -> Self {
        self.destructive_cooldown = cooldown;
        self
    }

    /// Execute the graph. Consumes the executor: instances are plan-scoped
    /// and never reused.
    pub async fn execute(
        self,
        graph: &PlanGraph,
        resolutions: &BTreeMap<String, Resolution>,
        world: &WorldState,
        request: &RequestContext,
    ) -> ExecutionReport {
        if graph.total_actions() == 0 {
            return ExecutionReport {
                final_status: FinalStatus::Blocked,
                outcomes: BTreeMap::new(),
                session_id: None,
            };
        }

        // Session pre-scan: acquire once at plan start when any resolved
        // tool needs one.
        let session = self.acquire_session_if_needed(resolutions).await;
        let session_id = session.as_ref().map(|s| s.session_id.clone());
        if let Some(id) = &session_id {
            tracing::info!(session_id = %id, "plan acquired session");
        }

        let modifiers = ModifierGuard::new();
        let mut outcomes: BTreeMap<String, ActionOutcome> = BTreeMap::new();
        let mut destructive_ran = false;

        loop {
            if request.is_cancelled() || deadline_exceeded(request) {
                self.cancel_remaining(graph, &mut outcomes);
                modifiers.release_all(&self.registry).await;
                break;
            }

            let ready = self.ready_actions(graph, &mut outcomes);
            if ready.is_empty() {
                break;
            }

            let this = &self;
            let mut in_flight = FuturesUnordered::new();
            for action_id in ready.into_iter().take(self.max_parallel) {
                let Some(action) = graph.node(&action_id).cloned() else {
                    continue;
                };
                let resolution = resolutions.get(&action_id).cloned();
                let session_ref = session.clone();
                let apply_cooldown = destructive_ran;
                in_flight.push(async move {
                    let outcome = this
                        .run_action(&action, resolution, session_ref, world, request, apply_cooldown)
                        .await;
                    (action_id, outcome)
                });
            }

            while let Some((action_id, outcome)) = in_flight.next().await {
                modifiers.register_from(&outcome.data).await;
                if outcome.status != ActionStatus::Success {
                    modifiers.release_all(&self.registry).await;
                }
                if outcome.status == ActionStatus::Success {
                    if let Some(resolution) = resolutions.get(&action_id) {
                        if self
                            .registry
                            .get(&resolution.tool_name)
                            .map(|cap| cap.preconditions.is_destructive)
                            .unwrap_or(false)
                        {
                            destructive_ran = true;
                        }
                    }
                }
                outcomes.insert(action_id, outcome);
            }
        }

        // Anything still unvisited had a failed ancestor.
        for action_id in graph.execution_order() {
            if !outcomes.contains_key(action_id) {
                outcomes.insert(
                    action_id.clone(),
                    ActionOutcome::new(action_id.clone(), ActionStatus::DependencyFailed)
                        .with_error("upstream action did not succeed"),
                );
            }
        }

        if let (Some(manager), Some(handle)) = (&self.sessions, session) {
            manager.release(handle).await;
        }

        let final_status = aggregate_status(&outcomes);
        tracing::info!(
            final_status = ?final_status,
            actions = outcomes.len(),
            "plan execution finished"
        );
        ExecutionReport {
            final_status,
            outcomes,
            session_id,
        }
    }

    async fn acquire_session_if_needed(
        &self,
        resolutions: &BTreeMap<String, Resolution>,
    ) -> Option<SessionHandle> {
        let needed = resolutions.values().any(|r| {
            self.registry
                .get(&r.tool_name)
                .map(|cap| cap.requires_session)
                .unwrap_or(false)
        });
        if !needed {
            return None;
        }
        match &self.sessions {
            Some(manager) => match manager.acquire().await {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::error!(error = %err, "session acquisition failed");
                    None
                }
            },
            None => {
                tracing::warn!("plan needs a session but no session manager is wired in");
                None
            }
        }
    }

    /// Actions whose parents all succeeded and which have no outcome yet.
    ///
    /// Actions with a failed, skipped, or cancelled parent are marked
    /// `DependencyFailed` as a side effect, so the main loop terminates.
    fn ready_actions(
        &self,
        graph: &PlanGraph,
        outcomes: &mut BTreeMap<String, ActionOutcome>,
    ) -> Vec<String> {
        let mut ready = Vec::new();
        let mut newly_skipped: Vec<String> = Vec::new();
        for action_id in graph.execution_order() {
            if outcomes.contains_key(action_id) {
                continue;
            }
            let parents = graph.parents_of(action_id);
            let all_success = parents.iter().all(|p| {
                outcomes
                    .get(p)
                    .map(|o| o.status == ActionStatus::Success)
                    .unwrap_or(false)
            });
            if all_success {
                ready.push(action_id.clone());
                continue;
            }
            let any_failed = parents.iter().any(|p| {
                outcomes
                    .get(p)
                    .map(|o| o.status != ActionStatus::Success)
                    .unwrap_or(false)
            });
            if any_failed {
                newly_skipped.push(action_id.clone());
            }
        }
        for action_id in newly_skipped {
            tracing::warn!(action_id = %action_id, "action skipped, dependency failed");
            outcomes.insert(
                action_id.clone(),
                ActionOutcome::new(action_id, ActionStatus::DependencyFailed)
                    .with_error("upstream action did not succeed"),
            );
        }
        ready
    }

    async fn run_action(
        &self,
        action: &PlannedAction,
        resolution: Option<Resolution>,
        session: Option<SessionHandle>,
        world: &WorldState,
        request: &RequestContext,
        apply_cooldown: bool,
    ) -> ActionOutcome {
        if request.is_cancelled() {
            return ActionOutcome::new(&action.action_id, ActionStatus::Cancelled);
        }

        // Context-only actions carry their payload in the frame; nothing to
        // invoke.
        if action.is_context_only() {
            tracing::debug!(action_id = %action.action_id, "context-only action completed");
            return ActionOutcome::new(&action.action_id, ActionStatus::Success);
        }

        let Some(resolution) = resolution else {
            return ActionOutcome::new(&action.action_id, ActionStatus::Failed)
                .with_error("no tool resolution for action");
        };

        let Some(capability) = self.registry.get(&resolution.tool_name) else {
            return ActionOutcome::new(&action.action_id, ActionStatus::Failed)
                .with_error(format!("tool '{}' not registered", resolution.tool_name));
        };

        if let Some(check) = &self.satisfaction {
            if check.already_satisfied(action, world).await {
                tracing::info!(action_id = %action.action_id, "effect already true, skipping invocation");
                let mut outcome =
                    ActionOutcome::new(&action.action_id, ActionStatus::Success);
                outcome.tool_name = Some(resolution.tool_name.clone());
                outcome
                    .data
                    .insert("already_satisfied".to_string(), Value::Bool(true));
                return outcome;
            }
        }

        if let Some(unmet) = self
            .unmet_precondition(action, &capability, world)
            .await
        {
            tracing::warn!(
                action_id = %action.action_id,
                tool = %capability.tool_name,
                precondition = %unmet,
                "precondition unmet"
            );
            let mut outcome =
                ActionOutcome::new(&action.action_id, ActionStatus::PreconditionUnmet)
                    .with_error(format!("precondition '{unmet}' unmet"));
            outcome.tool_name = Some(resolution.tool_name.clone());
            return outcome;
        }

        let Some(tool) = self.registry.tool(&resolution.tool_name) else {
            return ActionOutcome::new(&action.action_id, ActionStatus::Failed)
                .with_error(format!("tool '{}' not invocable", resolution.tool_name));
        };

        if apply_cooldown && capability.preconditions.is_destructive {
            sleep(self.destructive_cooldown).await;
        }

        tracing::info!(
            action_id = %action.action_id,
            tool = %resolution.tool_name,
            "action started"
        );
        let session_ref = if capability.requires_session {
            session.as_ref()
        } else {
            None
        };
        let result = tool.execute(&resolution.params, session_ref).await;

        let mut outcome = if result.is_success() {
            tracing::info!(action_id = %action.action_id, tool = %resolution.tool_name, "action completed");
            ActionOutcome::new(&action.action_id, ActionStatus::Success)
        } else {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "tool reported error".to_string());
            tracing::error!(
                action_id = %action.action_id,
                tool = %resolution.tool_name,
                error = %message,
                "action failed"
            );
            ActionOutcome::new(&action.action_id, ActionStatus::Failed).with_error(message)
        };
        outcome.tool_name = Some(resolution.tool_name.clone());
        outcome.data = result.data;
        outcome
    }

    async fn unmet_precondition(
        &self,
        action: &PlannedAction,
        capability: &Capability,
        world: &WorldState,
    ) -> Option<String> {
        let pre = &capability.preconditions;
        if pre.requires_unlocked_screen && world.screen_locked {
            return Some("requires_unlocked_screen".to_string());
        }
        if pre.requires_focus && world.focused_window.is_none() {
            return Some("requires_focus".to_string());
        }
        if pre.requires_active_app {
            if let Some(app) = action.args.get("app_name").and_then(Value::as_str) {
                if !world.is_running(app) {
                    return Some("requires_active_app".to_string());
                }
            }
        }
        if pre.is_destructive {
            match &self.destructive_gate {
                Some(gate) => {
                    if !gate.confirm(action, &capability.tool_name).await {
                        return Some("destructive_confirmation".to_string());
                    }
                }
                None => return Some("destructive_confirmation".to_string()),
            }
        }
        None
    }

    fn cancel_remaining(&self, graph: &PlanGraph, outcomes: &mut BTreeMap<String, ActionOutcome>) {
        for action_id in graph.execution_order() {
            if !outcomes.contains_key(action_id) {
                outcomes.insert(
                    action_id.clone(),
                    ActionOutcome::new(action_id.clone(), ActionStatus::Cancelled),
                );
            }
        }
    }
}

fn deadline_exceeded(request: &RequestContext) -> bool {
    match request.deadline {
        Some(deadline) => {
            let elapsed = chrono::Utc::now() - request.started_at;
            elapsed.to_std().map(|e| e >= deadline).unwrap_or(false)
        }
        None => false,
    }
}

fn aggregate_status(outcomes: &BTreeMap<String, ActionOutcome>) -> FinalStatus {
    let total = outcomes.len();
    let successes = outcomes
        .values()
        .filter(|o| o.status == ActionStatus::Success)
        .count();
    if total == 0 {
        FinalStatus::Blocked
    } else if successes == total {
        FinalStatus::Success
    } else if successes > 0 {
        FinalStatus::Partial
    } else {
        FinalStatus::Failed
    }
}
