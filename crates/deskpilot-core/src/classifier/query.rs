//! QueryClassifier - semantic routing for single vs multi-goal queries.
//!
//! Answers exactly one question: does this request contain ONE semantic goal
//! or MULTIPLE goals? It is a router, not a planner. It never extracts
//! actions, verbs, or substrings; the output is one tag.
//!
//! Two phases: deterministic pattern scan first (dependency markers and
//! independent-multi shapes force `Multi` immediately), then a few-shot
//! provider call for the ambiguous remainder. A single semantic action with
//! multiple verbs ("open youtube and search nvidia") is `Single`; two
//! launch clauses or any anaphoric reference is `Multi`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::provider::{generate_checked, GenerateRequest, Provider};
use crate::types::Classification;

/// Syntactic markers of a dependent sequence.
static DEPENDENCY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Pronoun references to a prior entity
        r"\b(inside|into|in)\s+(it|that|the)\b",
        r"\b(to|from)\s+(it|that|the)\b",
        r"\b(with|using)\s+(it|that)\b",
        // Explicit sequence markers
        r"\bthen\b",
        r"\bafter\s+that\b",
        r"\bonce\s+(it|that|done)\b",
        // Object creation followed by usage
        r"\bcreate\b.*\b(and|then)\b.*\b(inside|in|into)\b",
        r"\bmake\b.*\b(and|then)\b.*\b(inside|in|into)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("classifier pattern"))
    .collect()
});

/// Shapes of independent multi-goal requests.
static INDEPENDENT_MULTI_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Two distinct launches joined by "and"
        r"\b(open|launch|start)\s+\w+\s+and\s+(open|launch|start)\s+\w+\b",
        // Paired system controls
        r"\b(mute|unmute|increase|decrease|set)\b.*\band\b.*\b(mute|unmute|increase|decrease|set|take|capture)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("classifier pattern"))
    .collect()
});

const CLASSIFIER_SYSTEM: &str = "You are a semantic goal classifier for a desktop assistant. \
Determine whether a request contains ONE atomic goal or MULTIPLE goals. \
Count semantic goals, not verbs.";

const FEW_SHOT_EXAMPLES: &str = r#"### single (one atomic objective)
"open youtube and search nvidia" -> single (search IS the goal; youtube is context)
"open spotify and play my playlist" -> single
"launch chrome and go to google.com" -> single
"take a screenshot" -> single
"what time is it" -> single

### multi, independent (unrelated objectives)
"open chrome and open spotify" -> multi (two launches)
"increase volume and take a screenshot" -> multi
"set brightness to 50 and mute the audio" -> multi

### multi, dependent (B needs A)
"create a folder called projects and put a readme inside it" -> multi
"open notepad then type hello world" -> multi
"create a spreadsheet and add data to it" -> multi

Rules:
- "open X and do Y in X" where Y is the purpose = single
- "open X and open Y" = multi
- any pronoun reference to a prior entity = multi
- if unsure and the request has multiple steps, answer multi"#;

/// How the classification was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    /// Deterministic pattern scan.
    Syntactic,
    /// Provider few-shot fallback.
    Provider,
}

/// Classification plus the authority-contract metadata.
///
/// Syntactic detections carry high confidence; downstream interpretation
/// may treat them as authoritative topology.
#[derive(Debug, Clone)]
pub struct ClassifierReport {
    pub classification: Classification,
    pub confidence: f64,
    pub method: DetectionMethod,
}

/// Lightweight semantic classifier for query routing.
pub struct QueryClassifier<P> {
    provider: P,
}

impl<P: Provider> QueryClassifier<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Classify the utterance. Never fails: a provider failure degrades to
    /// `Multi`, which the richer pipeline handles for both shapes.
    pub async fn classify(&self, text: &str) -> Classification {
        self.classify_with_confidence(text).await.classification
    }

    /// Classify with confidence and detection method.
    pub async fn classify_with_confidence(&self, text: &str) -> ClassifierReport {
        let lower = text.to_lowercase();

        if DEPENDENCY_PATTERNS.iter().any(|p| p.is_match(&lower)) {
            tracing::info!(method = "syntactic", "query classified as multi (dependency marker)");
            return ClassifierReport {
                classification: Classification::Multi,
                confidence: 0.95,
                method: DetectionMethod::Syntactic,
            };
        }
        if INDEPENDENT_MULTI_PATTERNS.iter().any(|p| p.is_match(&lower)) {
            tracing::info!(method = "syntactic", "query classified as multi (independent pattern)");
            return ClassifierReport {
                classification: Classification::Multi,
                confidence: 0.90,
                method: DetectionMethod::Syntactic,
            };
        }

        let classification = self.classify_with_provider(text).await;
        ClassifierReport {
            classification,
            confidence: 0.75,
            method: DetectionMethod::Provider,
        }
    }

    async fn classify_with_provider(&self, text: &str) -> Classification {
        let request = GenerateRequest::new(
            CLASSIFIER_SYSTEM,
            format!(
                "{FEW_SHOT_EXAMPLES}\n\nClassify this input:\n\"{text}\"\n\n\
                 Return JSON with a single field `classification`: \"single\" or \"multi\"."
            ),
            classifier_schema(),
        );

        match generate_checked(&self.provider, request).await {
            Ok(value) => match value.get("classification").and_then(Value::as_str) {
                Some("single") => Classification::Single,
                _ => Classification::Multi,
            },
            Err(err) => {
                // The multi pipeline handles both shapes; single would drop goals.
                tracing::warn!(error = %err, "query classifier provider failed, defaulting to multi");
                Classification::Multi
            }
        }
    }
}

fn classifier_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "classification": { "type": "string", "enum": ["single", "multi"] }
        },
        "required": ["classification"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use async_trait::async_trait;

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

    fn single_provider() -> FixedProvider {
        FixedProvider {
            output: Some(json!({"classification": "single"})),
        }
    }

    #[test]
    fn test_dependency_markers_force_multi_without_provider() {
        tokio_test::block_on(async {
            // Provider says single; the deterministic phase must win.
            let classifier = QueryClassifier::new(single_provider());
            let report = classifier
                .classify_with_confidence(
                    "create folder alex on D drive and create presentation.pptx inside it",
                )
                .await;
            assert_eq!(report.classification, Classification::Multi);
            assert_eq!(report.method, DetectionMethod::Syntactic);
            assert!(report.confidence >= 0.95);
        });
    }

    #[test]
    fn test_dual_launch_is_multi() {
        tokio_test::block_on(async {
            let classifier = QueryClassifier::new(single_provider());
            let report = classifier
                .classify_with_confidence("open chrome and open spotify")
                .await;
            assert_eq!(report.classification, Classification::Multi);
            assert_eq!(report.method, DetectionMethod::Syntactic);
        });
    }

    #[test]
    fn test_single_semantic_action_falls_through_to_provider() {
        tokio_test::block_on(async {
            let classifier = QueryClassifier::new(single_provider());
            let report = classifier
                .classify_with_confidence("open youtube and search nvidia")
                .await;
            assert_eq!(report.classification, Classification::Single);
            assert_eq!(report.method, DetectionMethod::Provider);
        });
    }

    #[test]
    fn test_provider_failure_defaults_to_multi() {
        tokio_test::block_on(async {
            let classifier = QueryClassifier::new(FixedProvider { output: None });
            let classification = classifier.classify("open youtube and search nvidia").await;
            assert_eq!(classification, Classification::Multi);
        });
    }

    #[test]
    fn test_classification_is_stable_across_calls() {
        tokio_test::block_on(async {
            let classifier = QueryClassifier::new(single_provider());
            let first = classifier.classify("what time is it").await;
            let second = classifier.classify("what time is it").await;
            assert_eq!(first, second);
        });
    }
}
