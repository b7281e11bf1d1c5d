//! Routing tags: query classification and the closed intent set.

use serde::{Deserialize, Serialize};

/// Result of the single-vs-multi routing decision. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// One atomic goal, even if phrased with multiple verbs.
    Single,
    /// Multiple goals, independent or dependent.
    Multi,
}

/// Closed set of intent categories.
///
/// Declared once per classification and never re-derived downstream. Adding
/// a variant is a deliberate design change; every consumer matches
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ApplicationLaunch,
    ApplicationControl,
    WindowManagement,
    SystemQuery,
    SystemControl,
    ScreenCapture,
    ScreenPerception,
    InputControl,
    ClipboardOperation,
    MemoryRecall,
    FileOperation,
    BrowserControl,
    OfficeOperation,
    InformationQuery,
    Unknown,
}

impl IntentKind {
    /// All intent tags, in declaration order. Used to build provider schemas.
    pub fn all() -> &'static [IntentKind] {
        &[
            IntentKind::ApplicationLaunch,
            IntentKind::ApplicationControl,
            IntentKind::WindowManagement,
            IntentKind::SystemQuery,
            IntentKind::SystemControl,
            IntentKind::ScreenCapture,
            IntentKind::ScreenPerception,
            IntentKind::InputControl,
            IntentKind::ClipboardOperation,
            IntentKind::MemoryRecall,
            IntentKind::FileOperation,
            IntentKind::BrowserControl,
            IntentKind::OfficeOperation,
            IntentKind::InformationQuery,
            IntentKind::Unknown,
        ]
    }

    /// Wire tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::ApplicationLaunch => "application_launch",
            IntentKind::ApplicationControl => "application_control",
            IntentKind::WindowManagement => "window_management",
            IntentKind::SystemQuery => "system_query",
            IntentKind::SystemControl => "system_control",
            IntentKind::ScreenCapture => "screen_capture",
            IntentKind::ScreenPerception => "screen_perception",
            IntentKind::InputControl => "input_control",
            IntentKind::ClipboardOperation => "clipboard_operation",
            IntentKind::MemoryRecall => "memory_recall",
            IntentKind::FileOperation => "file_operation",
            IntentKind::BrowserControl => "browser_control",
            IntentKind::OfficeOperation => "office_operation",
            IntentKind::InformationQuery => "information_query",
            IntentKind::Unknown => "unknown",
        }
    }

    /// Parse a wire tag. Unrecognized tags map to `Unknown`.
    pub fn parse(tag: &str) -> IntentKind {
        IntentKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == tag)
            .unwrap_or(IntentKind::Unknown)
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the classifier decided to act or to ask for clarification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDecision {
    Act,
    Ask,
}

/// Output of the intent classifier for a single-routed utterance.
#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub decision: IntentDecision,
    pub intent: IntentKind,
    /// Confidence in [0, 1]; clamped at construction.
    pub confidence: f64,
    /// Clarification question, present iff decision is `Ask`.
    pub question: Option<String>,
}

impl IntentClassification {
    /// Create an act decision with clamped confidence.
    pub fn act(intent: IntentKind, confidence: f64) -> Self {
        Self {
            decision: IntentDecision::Act,
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            question: None,
        }
    }

    /// Create an ask decision carrying a clarification question.
    pub fn ask(intent: IntentKind, confidence: f64, question: impl Into<String>) -> Self {
        Self {
            decision: IntentDecision::Ask,
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            question: Some(question.into()),
        }
    }

    /// The degraded classification used when the provider output is unusable.
    pub fn unknown() -> Self {
        Self::act(IntentKind::Unknown, 0.0)
    }
}
