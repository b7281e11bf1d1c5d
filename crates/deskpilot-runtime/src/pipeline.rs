//! Top-level request pipeline.
//!
//! One `process` call runs the full chain: world snapshot, single/multi
//! routing, intent classification or goal interpretation, planning and
//! orchestration, domain-locked tool resolution, and plan-scoped execution.
//! Stages communicate only through immutable value types; this module owns
//! the wiring and the final aggregation, nothing else.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use deskpilot_core::capability::{SessionManager, ToolRegistry};
use deskpilot_core::classifier::{IntentClassifier, QueryClassifier};
use deskpilot_core::error::PipelineError;
use deskpilot_core::executor::{ActionStatus, DestructiveGate, FinalStatus, PlanExecutor};
use deskpilot_core::interpreter::GoalInterpreter;
use deskpilot_core::orchestrator::GoalOrchestrator;
use deskpilot_core::provider::{generate_checked, GenerateRequest, Provider};
use deskpilot_core::resolver::{Resolution, ToolResolver};
use deskpilot_core::types::{
    Classification, IntentDecision, IntentKind, PlanGraph, PlannedAction, RequestContext,
    Utterance, WorldState,
};

use crate::formatter::ResponseFormatter;

/// Confidence floor below which a single-path request falls back to a
/// free-form answer instead of tool execution.
const CONFIDENCE_FLOOR: f64 = 0.35;

/// Ambient state collection, called exactly once per request.
pub trait WorldProbe: Send + Sync {
    fn snapshot(&self) -> WorldState;
}

/// Probe returning a fixed snapshot; useful for tests and headless runs.
pub struct StaticWorldProbe {
    world: WorldState,
}

impl StaticWorldProbe {
    pub fn new(world: WorldState) -> Self {
        Self { world }
    }

    pub fn empty() -> Self {
        Self::new(WorldState::empty())
    }
}

impl WorldProbe for StaticWorldProbe {
    fn snapshot(&self) -> WorldState {
        self.world.clone()
    }
}

/// Role-based provider assignment.
#[derive(Clone)]
pub struct ProviderRoles {
    pub classifier: Arc<dyn Provider>,
    pub intent: Arc<dyn Provider>,
    pub interpreter: Arc<dyn Provider>,
    pub resolver: Arc<dyn Provider>,
    pub responder: Arc<dyn Provider>,
}

impl ProviderRoles {
    /// One provider serving every role.
    pub fn uniform(provider: Arc<dyn Provider>) -> Self {
        Self {
            classifier: provider.clone(),
            intent: provider.clone(),
            interpreter: provider.clone(),
            resolver: provider.clone(),
            responder: provider,
        }
    }
}

/// What kind of result a request produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The pipeline needs clarification before acting.
    Clarification,
    /// A text answer with no tool execution.
    Answer,
    /// Tool execution, successful or not.
    Execution,
}

/// Per-action summary in the final result.
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub action_id: String,
    pub description: String,
    pub tool: Option<String>,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Machine-readable result of one request.
#[derive(Debug)]
pub struct RequestOutcome {
    pub request_id: String,
    pub kind: RequestKind,
    pub final_status: FinalStatus,
    /// Human-readable summary produced by the response formatter.
    pub message: String,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub actions: Vec<ActionReport>,
    /// Reasons for goals that could not be planned.
    pub failed_goals: Vec<String>,
}

/// The assembled pipeline.
pub struct Pipeline {
    classifier: QueryClassifier<Arc<dyn Provider>>,
    intents: IntentClassifier<Arc<dyn Provider>>,
    interpreter: GoalInterpreter<Arc<dyn Provider>>,
    orchestrator: GoalOrchestrator,
    resolver: ToolResolver<Arc<dyn Provider>>,
    responder: Arc<dyn Provider>,
    registry: Arc<dyn ToolRegistry>,
    sessions: Arc<dyn SessionManager>,
    destructive_gate: Option<Arc<dyn DestructiveGate>>,
    probe: Arc<dyn WorldProbe>,
    formatter: ResponseFormatter,
    workspace: PathBuf,
    max_parallel: usize,
    destructive_cooldown: Duration,
}

impl Pipeline {
    pub fn new(
        roles: ProviderRoles,
        registry: Arc<dyn ToolRegistry>,
        sessions: Arc<dyn SessionManager>,
        probe: Arc<dyn WorldProbe>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            classifier: QueryClassifier::new(roles.classifier),
            intents: IntentClassifier::new(roles.intent),
            interpreter: GoalInterpreter::new(roles.interpreter),
            orchestrator: GoalOrchestrator::new(),
            resolver: ToolResolver::new(registry.clone(), roles.resolver),
            responder: roles.responder,
            registry,
            sessions,
            destructive_gate: None,
            probe,
            formatter: ResponseFormatter::new(),
            workspace: workspace.into(),
            max_parallel: 4,
            destructive_cooldown: Duration::from_millis(500),
        }
    }

    pub fn with_destructive_gate(mut self, gate: Arc<dyn DestructiveGate>) -> Self {
        self.destructive_gate = Some(gate);
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

    /// Process one utterance end to end.
    pub async fn process(&self, text: &str, session_id: Option<&str>) -> RequestOutcome {
        let world = self.probe.snapshot();
        let mut utterance = Utterance::new(text, world.clone());
        if let Some(session_id) = session_id {
            utterance = utterance.with_session(session_id);
        }
        let request = RequestContext::new(&self.workspace);

        tracing::info!(request_id = %request.request_id, "request started");
        let classification = self.classifier.classify(text).await;
        tracing::info!(request_id = %request.request_id, classification = ?classification, "query classified");

        let mut outcome = match classification {
            Classification::Single => self.process_single(&utterance, &request).await,
            Classification::Multi => self.process_multi(&utterance, &request).await,
        };

        outcome.request_id = request.request_id.clone();
        outcome.message = self.formatter.render(&outcome);
        tracing::info!(
            request_id = %request.request_id,
            kind = ?outcome.kind,
            final_status = ?outcome.final_status,
            "request finished"
        );
        outcome
    }

    /// Single path: intent classification, act/ask, direct tool resolution.
    async fn process_single(
        &self,
        utterance: &Utterance,
        request: &RequestContext,
    ) -> RequestOutcome {
        let classification = self.intents.classify(&utterance.text, &utterance.world).await;

        if classification.decision == IntentDecision::Ask {
            return RequestOutcome {
                request_id: String::new(),
                kind: RequestKind::Clarification,
                final_status: FinalStatus::Blocked,
                message: String::new(),
                question: classification.question,
                answer: None,
                actions: Vec::new(),
                failed_goals: Vec::new(),
            };
        }

        // Pure LLM paths: no tool resolution at all.
        if classification.intent == IntentKind::InformationQuery {
            return self.answer_outcome(&utterance.text).await;
        }
        if classification.intent == IntentKind::Unknown
            || classification.confidence < CONFIDENCE_FLOOR
        {
            tracing::info!(
                intent = %classification.intent,
                confidence = classification.confidence,
                "low-confidence single request, using fallback answer"
            );
            return self.answer_outcome(&utterance.text).await;
        }

        let resolution = match self
            .resolver
            .resolve_utterance(classification.intent, &utterance.text, &utterance.world)
            .await
        {
            Ok(resolution) => resolution,
            Err(err) => {
                tracing::warn!(error = %err, "single-path resolution failed, using fallback answer");
                return self.answer_outcome(&utterance.text).await;
            }
        };

        let action_class = self
            .registry
            .get(&resolution.tool_name)
            .map(|cap| cap.action_class)
            .unwrap_or(deskpilot_core::types::ActionClass::Actuate);
        let action = PlannedAction::new(
            "g0_a1",
            classification.intent,
            utterance.text.clone(),
            resolution.params.clone(),
            action_class,
        );

        let mut nodes = BTreeMap::new();
        nodes.insert(action.action_id.clone(), action.clone());
        let mut goal_map = BTreeMap::new();
        goal_map.insert(0, vec![action.action_id.clone()]);
        let graph = match PlanGraph::new(
            nodes,
            BTreeMap::new(),
            vec![action.action_id.clone()],
            goal_map,
        ) {
            Ok(graph) => graph,
            Err(violation) => {
                tracing::error!(error = %violation, "single-action graph construction failed");
                return self.answer_outcome(&utterance.text).await;
            }
        };
        let mut resolutions = BTreeMap::new();
        resolutions.insert(action.action_id.clone(), resolution);

        let report = self
            .executor()
            .execute(&graph, &resolutions, &utterance.world, request)
            .await;
        self.execution_outcome(&graph, &resolutions, report, Vec::new())
    }

    /// Multi path: interpretation, orchestration, resolution, execution.
    async fn process_multi(
        &self,
        utterance: &Utterance,
        request: &RequestContext,
    ) -> RequestOutcome {
        let interpretation = self.interpreter.interpret(utterance, &utterance.world).await;
        if interpretation.degraded {
            // Legacy decomposition path: treat the request as single.
            tracing::warn!("interpretation degraded, routing to single path");
            return self.process_single(utterance, request).await;
        }

        let orchestration =
            self.orchestrator
                .orchestrate(&interpretation.meta_goal, &utterance.world, request);
        let failed_goals: Vec<String> = orchestration
            .failed_goals
            .iter()
            .map(|f| format!("{}: {}", f.goal_id, f.reason))
            .collect();

        let Some(graph) = orchestration.graph else {
            return RequestOutcome {
                request_id: String::new(),
                kind: RequestKind::Execution,
                final_status: FinalStatus::Blocked,
                message: String::new(),
                question: None,
                answer: None,
                actions: Vec::new(),
                failed_goals,
            };
        };

        let mut resolutions: BTreeMap<String, Resolution> = BTreeMap::new();
        for (action_id, action) in graph.nodes() {
            if action.is_context_only() {
                continue;
            }
            match self.resolver.resolve(action) {
                Ok(resolution) => {
                    resolutions.insert(action_id.clone(), resolution);
                }
                Err(err) => {
                    tracing::warn!(action_id = %action_id, error = %err, "action resolution failed");
                }
            }
        }

        let report = self
            .executor()
            .execute(&graph, &resolutions, &utterance.world, request)
            .await;
        self.execution_outcome(&graph, &resolutions, report, failed_goals)
    }

    fn executor(&self) -> PlanExecutor {
        let mut executor = PlanExecutor::new(self.registry.clone())
            .with_sessions(self.sessions.clone())
            .with_max_parallel(self.max_parallel)
            .with_destructive_cooldown(self.destructive_cooldown);
        if let Some(gate) = &self.destructive_gate {
            executor = executor.with_destructive_gate(gate.clone());
        }
        executor
    }

    fn execution_outcome(
        &self,
        graph: &PlanGraph,
        resolutions: &BTreeMap<String, Resolution>,
        report: deskpilot_core::executor::ExecutionReport,
        failed_goals: Vec<String>,
    ) -> RequestOutcome {
        let actions: Vec<ActionReport> = graph
            .execution_order()
            .iter()
            .map(|action_id| {
                let description = graph
                    .node(action_id)
                    .map(|a| a.description.clone())
                    .unwrap_or_default();
                let outcome = report.outcomes.get(action_id);
                ActionReport {
                    action_id: action_id.clone(),
                    description,
                    tool: outcome
                        .and_then(|o| o.tool_name.clone())
                        .or_else(|| resolutions.get(action_id).map(|r| r.tool_name.clone())),
                    succeeded: outcome
                        .map(|o| o.status == ActionStatus::Success)
                        .unwrap_or(false),
                    error: outcome.and_then(|o| o.error.clone()),
                }
            })
            .collect();

        let mut final_status = report.final_status;
        if final_status == FinalStatus::Success && !failed_goals.is_empty() {
            final_status = FinalStatus::Partial;
        }

        RequestOutcome {
            request_id: String::new(),
            kind: RequestKind::Execution,
            final_status,
            message: String::new(),
            question: None,
            answer: None,
            actions,
            failed_goals,
        }
    }

    async fn answer_outcome(&self, text: &str) -> RequestOutcome {
        let answer = self.free_answer(text).await;
        RequestOutcome {
            request_id: String::new(),
            kind: RequestKind::Answer,
            final_status: FinalStatus::Success,
            message: String::new(),
            question: None,
            answer: Some(answer),
            actions: Vec::new(),
            failed_goals: Vec::new(),
        }
    }

    async fn free_answer(&self, text: &str) -> String {
        let request = GenerateRequest::new(
            "You are a helpful desktop assistant. Answer the user's question in one or \
             two sentences. Do not pretend to have executed anything.",
            format!("Answer the user:\n\"{text}\"\n\nReturn JSON with a single `answer` field."),
            json!({
                "type": "object",
                "properties": { "answer": { "type": "string" } },
                "required": ["answer"]
            }),
        );
        match generate_checked(&self.responder, request).await {
            Ok(value) => value
                .get("answer")
                .and_then(Value::as_str)
                .unwrap_or("I could not produce an answer.")
                .to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "responder failed");
                match err {
                    PipelineError::ProviderUnavailable(_) => {
                        "The language model is currently unavailable.".to_string()
                    }
                    _ => "I could not produce an answer.".to_string(),
                }
            }
        }
    }
}
