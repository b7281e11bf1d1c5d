//! Plan-scoped browser session management.
//!
//! The executor acquires at most one session per plan execution; this
//! manager hands out identities and tracks which are live. Tool-side
//! browser state keyed by these ids lives behind the tools themselves.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use deskpilot_core::capability::{SessionHandle, SessionManager};
use deskpilot_core::error::PipelineError;

/// Hands out plan-scoped browser session identities.
#[derive(Default)]
pub struct BrowserSessionManager {
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    next_id: u64,
    active: HashSet<String>,
}

impl BrowserSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently live sessions.
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }
}

#[async_trait]
impl SessionManager for BrowserSessionManager {
    async fn acquire(&self) -> Result<SessionHandle, PipelineError> {
        let mut state = self.state.lock().await;
        let session_id = format!("browser-{}", state.next_id);
        state.next_id += 1;
        state.active.insert(session_id.clone());
        tracing::info!(session_id = %session_id, "browser session acquired");
        Ok(SessionHandle { session_id })
    }

    async fn release(&self, handle: SessionHandle) {
        let mut state = self.state.lock().await;
        if state.active.remove(&handle.session_id) {
            tracing::info!(session_id = %handle.session_id, "browser session released");
        } else {
            tracing::warn!(session_id = %handle.session_id, "release of unknown session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_lifecycle() {
        tokio_test::block_on(async {
            let manager = BrowserSessionManager::new();
            let first = manager.acquire().await.unwrap();
            let second = manager.acquire().await.unwrap();
            assert_ne!(first.session_id, second.session_id);
            assert_eq!(manager.active_count().await, 2);

            manager.release(first).await;
            assert_eq!(manager.active_count().await, 1);
        });
    }
}
