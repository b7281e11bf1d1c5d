//! Bootstrap - build providers, registry, and pipeline from configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use deskpilot_core::provider::{Provider, ProviderError};
use deskpilot_provider::{
    GeminiConfig, GeminiProvider, OpenAiCompatConfig, OpenAiCompatProvider,
};
use deskpilot_tools::{default_catalog, BrowserSessionManager};

use crate::config::{BackendConfig, RuntimeConfig};
use crate::pipeline::{Pipeline, ProviderRoles, StaticWorldProbe};

/// Bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("provider setup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Build a ready pipeline from configuration.
///
/// The workspace defaults to the process cwd, captured here once; requests
/// never read a live cwd afterwards.
pub fn bootstrap(config: &RuntimeConfig) -> Result<Pipeline, BootstrapError> {
    let mut backends: HashMap<&str, Arc<dyn Provider>> = HashMap::new();
    for backend in &config.providers.backends {
        backends.insert(backend.name.as_str(), build_backend(backend)?);
    }

    let default = config
        .providers
        .backends
        .first()
        .map(|b| b.name.as_str())
        .ok_or_else(|| BootstrapError::Invalid("no provider backends".to_string()))?;

    let pick = |role: &Option<String>| -> Result<Arc<dyn Provider>, BootstrapError> {
        let name = role.as_deref().unwrap_or(default);
        backends
            .get(name)
            .cloned()
            .ok_or_else(|| BootstrapError::Invalid(format!("unknown backend '{name}'")))
    };

    let roles = &config.providers.roles;
    let provider_roles = ProviderRoles {
        classifier: pick(&roles.classifier)?,
        intent: pick(&roles.intent)?,
        interpreter: pick(&roles.interpreter)?,
        resolver: pick(&roles.resolver)?,
        responder: pick(&roles.responder)?,
    };

    let workspace: PathBuf = match &config.workspace {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir()
            .map_err(|e| BootstrapError::Invalid(format!("cannot determine workspace: {e}")))?,
    };

    let registry = Arc::new(default_catalog());
    let sessions = Arc::new(BrowserSessionManager::new());

    Ok(Pipeline::new(
        provider_roles,
        registry,
        sessions,
        Arc::new(StaticWorldProbe::empty()),
        workspace,
    )
    .with_max_parallel(config.executor.max_parallel)
    .with_destructive_cooldown(std::time::Duration::from_millis(
        config.executor.destructive_cooldown_ms,
    )))
}

fn build_backend(backend: &BackendConfig) -> Result<Arc<dyn Provider>, BootstrapError> {
    let api_key = backend
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .unwrap_or_default();

    match backend.kind.as_str() {
        "openai_compat" => {
            let mut config = OpenAiCompatConfig {
                api_key,
                model: backend.model.clone(),
                temperature: backend.temperature,
                timeout_secs: backend.timeout_secs,
                ..OpenAiCompatConfig::default()
            };
            if let Some(endpoint) = &backend.endpoint {
                config.endpoint = endpoint.clone();
            }
            Ok(Arc::new(OpenAiCompatProvider::new(config)?))
        }
        "gemini" => {
            let mut config = GeminiConfig {
                api_key,
                model: backend.model.clone(),
                temperature: backend.temperature,
                timeout_secs: backend.timeout_secs,
                ..GeminiConfig::default()
            };
            if let Some(endpoint) = &backend.endpoint {
                config.endpoint = endpoint.clone();
            }
            Ok(Arc::new(GeminiProvider::new(config)?))
        }
        other => Err(BootstrapError::Invalid(format!(
            "unknown backend kind '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutorConfig, ProvidersConfig, RolesConfig};

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            providers: ProvidersConfig {
                backends: vec![BackendConfig {
                    name: "local".to_string(),
                    kind: "openai_compat".to_string(),
                    endpoint: Some("http://127.0.0.1:8080/v1".to_string()),
                    api_key_env: None,
                    model: "qwen2.5-7b-instruct".to_string(),
                    temperature: 0.2,
                    timeout_secs: 5,
                }],
                roles: RolesConfig::default(),
            },
            executor: ExecutorConfig::default(),
            workspace: Some("/work/session".to_string()),
        }
    }

    #[test]
    fn test_bootstrap_builds_pipeline() {
        assert!(bootstrap(&config()).is_ok());
    }

    #[test]
    fn test_role_falls_back_to_first_backend() {
        let mut config = config();
        config.providers.roles.classifier = Some("local".to_string());
        assert!(bootstrap(&config).is_ok());
    }
}
