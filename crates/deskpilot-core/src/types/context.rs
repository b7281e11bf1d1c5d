//! ContextFrame - typed semantic continuity between planner invocations.
//!
//! Frames are NOT runtime state or environment probes. They are small,
//! domain-scoped semantic metadata produced by a planner after successful
//! parameter validation and consumed by later planners whose rule declares
//! a matching consumption contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Params;

/// Immutable semantic context frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFrame {
    /// Action or goal id that produced the frame.
    pub produced_by: String,
    /// Domain of the context (e.g. `browser`, `file`).
    pub domain: String,
    /// Small typed key/value payload.
    pub data: Params,
}

impl ContextFrame {
    pub fn new(produced_by: impl Into<String>, domain: impl Into<String>, data: Params) -> Self {
        Self {
            produced_by: produced_by.into(),
            domain: domain.into(),
            data,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Append-only collection of frames accumulated during planning.
///
/// Later stages read it; only the orchestrator appends.
#[derive(Debug, Clone, Default)]
pub struct ContextFrames {
    frames: Vec<ContextFrame>,
}

impl ContextFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: ContextFrame) {
        self.frames.push(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextFrame> {
        self.frames.iter()
    }

    /// Most recent value for `(domain, key)`, scanning newest first.
    pub fn latest(&self, domain: &str, key: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .filter(|f| f.domain == domain)
            .find_map(|f| f.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_prefers_newest_frame() {
        let mut frames = ContextFrames::new();
        let mut first = Params::new();
        first.insert("platform".to_string(), json!("google"));
        frames.push(ContextFrame::new("g0_a1", "browser", first));
        let mut second = Params::new();
        second.insert("platform".to_string(), json!("youtube"));
        frames.push(ContextFrame::new("g1_a1", "browser", second));

        assert_eq!(frames.latest("browser", "platform"), Some(&json!("youtube")));
        assert_eq!(frames.latest("file", "platform"), None);
    }
}
