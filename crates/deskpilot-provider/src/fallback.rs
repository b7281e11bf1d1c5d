//! Ordered provider chain: local-first, cloud-fallback.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use deskpilot_core::provider::{GenerateRequest, Provider, ProviderError};

/// Tries each backend in order; a transport or response failure moves on to
/// the next. The last backend's error surfaces when every one fails.
pub struct FallbackProvider {
    backends: Vec<(String, Arc<dyn Provider>)>,
}

impl FallbackProvider {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Append a named backend. Order of registration is order of use.
    pub fn with_backend(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.backends.push((name.into(), provider));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for FallbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Value, ProviderError> {
        let mut last_error = ProviderError::Response("no backends configured".to_string());
        for (name, backend) in &self.backends {
            match backend.generate(request.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(backend = %name, error = %err, "provider backend failed, trying next");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}
