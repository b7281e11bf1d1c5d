//! Runtime configuration loading and validation.
//!
//! One YAML file describes provider backends, role-to-backend assignment,
//! and executor knobs. Validation is fail-fast at load time.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Workspace override; defaults to the caller's directory at bootstrap.
    #[serde(default)]
    pub workspace: Option<String>,
}

/// Provider backends and the pipeline-role assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub roles: RolesConfig,
}

/// One provider backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    /// `openai_compat` or `gemini`.
    pub kind: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Role-based backend selection: cheap models for classification, stronger
/// ones for interpretation. Unset roles fall back to the first backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub resolver: Option<String>,
    #[serde(default)]
    pub responder: Option<String>,
}

/// Executor knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_cooldown_ms")]
    pub destructive_cooldown_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            destructive_cooldown_ms: default_cooldown_ms(),
        }
    }
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_parallel() -> usize {
    4
}

fn default_cooldown_ms() -> u64 {
    500
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RuntimeConfig = serde_yaml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &RuntimeConfig) -> Result<(), ConfigError> {
    if config.providers.backends.is_empty() {
        return Err(ConfigError::Invalid(
            "providers.backends must not be empty".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for backend in &config.providers.backends {
        if backend.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "providers.backends[].name must not be empty".to_string(),
            ));
        }
        if !seen.insert(backend.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate backend name '{}'",
                backend.name
            )));
        }
        if !matches!(backend.kind.as_str(), "openai_compat" | "gemini") {
            return Err(ConfigError::Invalid(format!(
                "backend '{}' has unknown kind '{}'",
                backend.name, backend.kind
            )));
        }
        if backend.model.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "backend '{}' model must not be empty",
                backend.name
            )));
        }
    }

    let roles = &config.providers.roles;
    for (role, backend) in [
        ("classifier", &roles.classifier),
        ("intent", &roles.intent),
        ("interpreter", &roles.interpreter),
        ("resolver", &roles.resolver),
        ("responder", &roles.responder),
    ] {
        if let Some(name) = backend {
            if !seen.contains(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "role '{role}' references unknown backend '{name}'"
                )));
            }
        }
    }

    if config.executor.max_parallel == 0 {
        return Err(ConfigError::Invalid(
            "executor.max_parallel must be > 0".to_string(),
        ));
    }

    Ok(())
}
