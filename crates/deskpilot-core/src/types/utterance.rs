//! Utterance and per-request context.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::WorldState;

/// One user request: raw text, optional session identity, and the world
/// snapshot taken at request entry. Discarded when the final response is
/// returned.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Raw user text.
    pub text: String,
    /// Session identifier, when the caller maintains one.
    pub session_id: Option<String>,
    /// Frozen ambient state. Read-only for every stage.
    pub world: WorldState,
}

impl Utterance {
    /// Create an utterance with a world snapshot.
    pub fn new(text: impl Into<String>, world: WorldState) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            world,
        }
    }

    /// Attach a session identifier.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Request-scoped execution context.
///
/// The workspace directory is captured exactly once here; no stage reads a
/// live process cwd after this point.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    /// Optional overall deadline for the request.
    pub deadline: Option<Duration>,
    /// Cooperative cancel signal honored at suspension points.
    pub cancel: CancellationToken,
    /// Session cwd at request entry; the WORKSPACE base anchor.
    pub workspace: PathBuf,
}

impl RequestContext {
    /// Create a request context rooted at the given workspace directory.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            deadline: None,
            cancel: CancellationToken::new(),
            workspace: workspace.into(),
        }
    }

    /// Attach a deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
