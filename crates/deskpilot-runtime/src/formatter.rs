//! Response formatter - the single place user-facing text is produced.
//!
//! Every other stage returns structured values; this module turns the
//! aggregated request outcome into one human-readable summary line.

use deskpilot_core::executor::FinalStatus;

use crate::pipeline::{ActionReport, RequestKind, RequestOutcome};

/// Renders request outcomes into user-facing text.
#[derive(Debug, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Produce the summary for an outcome.
    pub fn render(&self, outcome: &RequestOutcome) -> String {
        match outcome.kind {
            RequestKind::Clarification => outcome
                .question
                .clone()
                .unwrap_or_else(|| "Could you clarify what you would like me to do?".to_string()),
            RequestKind::Answer => outcome
                .answer
                .clone()
                .unwrap_or_else(|| "I could not produce an answer.".to_string()),
            RequestKind::Execution => self.render_execution(outcome),
        }
    }

    fn render_execution(&self, outcome: &RequestOutcome) -> String {
        let total = outcome.actions.len();
        let completed = outcome
            .actions
            .iter()
            .filter(|a| a.succeeded)
            .count();

        let mut summary = match outcome.final_status {
            FinalStatus::Success => format!("Completed all {total} action(s)"),
            FinalStatus::Partial => format!("Completed {completed} of {total} action(s)"),
            FinalStatus::Failed => "All actions failed".to_string(),
            FinalStatus::Blocked => "Nothing could be planned for this request".to_string(),
        };

        if !outcome.failed_goals.is_empty() {
            summary.push_str(&format!(
                " ({} goal(s) could not be planned)",
                outcome.failed_goals.len()
            ));
        }

        if let Some(first_error) = first_error(&outcome.actions) {
            if outcome.final_status != FinalStatus::Success {
                summary.push_str(&format!(": {first_error}"));
            }
        } else if outcome.final_status == FinalStatus::Blocked {
            if let Some(reason) = outcome.failed_goals.first() {
                summary.push_str(&format!(": {reason}"));
            }
        }

        summary
    }
}

fn first_error(actions: &[ActionReport]) -> Option<&str> {
    actions
        .iter()
        .filter(|a| !a.succeeded)
        .find_map(|a| a.error.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_outcome(kind: RequestKind, final_status: FinalStatus) -> RequestOutcome {
        RequestOutcome {
            request_id: "r0".to_string(),
            kind,
            final_status,
            message: String::new(),
            question: None,
            answer: None,
            actions: Vec::new(),
            failed_goals: Vec::new(),
        }
    }

    #[test]
    fn test_clarification_renders_question() {
        let mut outcome = base_outcome(RequestKind::Clarification, FinalStatus::Blocked);
        outcome.question = Some("Which folder?".to_string());
        assert_eq!(ResponseFormatter::new().render(&outcome), "Which folder?");
    }

    #[test]
    fn test_partial_execution_counts_and_failed_goals() {
        let mut outcome = base_outcome(RequestKind::Execution, FinalStatus::Partial);
        outcome.actions = vec![
            ActionReport {
                action_id: "g0_a1".to_string(),
                description: "launch:chrome".to_string(),
                tool: Some("system.apps.launch".to_string()),
                succeeded: true,
                error: None,
            },
            ActionReport {
                action_id: "g1_a1".to_string(),
                description: "launch:spotify".to_string(),
                tool: Some("system.apps.launch".to_string()),
                succeeded: false,
                error: Some("not installed".to_string()),
            },
        ];
        outcome.failed_goals = vec!["no planner rule for (system, schedule_task)".to_string()];
        let text = ResponseFormatter::new().render(&outcome);
        assert!(text.contains("Completed 1 of 2 action(s)"));
        assert!(text.contains("1 goal(s) could not be planned"));
        assert!(text.contains("not installed"));
    }
}
