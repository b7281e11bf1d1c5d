//! LLM provider contract.
//!
//! The core never issues free-form requests: every call carries a JSON
//! schema, and returned objects are validated against it before use. The
//! validation implements the pragmatic subset the pipeline's schemas use
//! (type, enum, const, required, properties, additionalProperties, items).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::PipelineError;

/// Provider transport errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One structured-output request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// System framing for the call.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// JSON schema the output must satisfy.
    pub schema: Value,
}

impl GenerateRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            schema,
        }
    }
}

/// Black-box structured-output generator.
///
/// Implementations are interchangeable behind this contract: local
/// inference, hosted APIs, or a local-first/cloud-fallback chain.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Value, ProviderError>;
}

#[async_trait]
impl Provider for std::sync::Arc<dyn Provider> {
    async fn generate(&self, request: GenerateRequest) -> Result<Value, ProviderError> {
        (**self).generate(request).await
    }
}

/// Call the provider and validate the output against the request schema.
///
/// A schema-invalid first answer is retried once with a stricter prompt;
/// a second failure surfaces as `SchemaInvalid`. Transport failures map to
/// `ProviderUnavailable`.
pub async fn generate_checked<P: Provider>(
    provider: &P,
    request: GenerateRequest,
) -> Result<Value, PipelineError> {
    let first = provider
        .generate(request.clone())
        .await
        .map_err(|e| PipelineError::ProviderUnavailable(e.to_string()))?;

    match validate_against_schema(&first, &request.schema, "$") {
        Ok(()) => Ok(first),
        Err(reason) => {
            tracing::warn!(reason = %reason, "provider output failed schema validation, retrying once");
            let mut strict = request.clone();
            strict.prompt.push_str(
                "\n\nYour previous answer was structurally invalid. \
                 Return ONLY a JSON object that matches the schema exactly.",
            );
            let second = provider
                .generate(strict)
                .await
                .map_err(|e| PipelineError::ProviderUnavailable(e.to_string()))?;
            validate_against_schema(&second, &request.schema, "$")
                .map_err(PipelineError::SchemaInvalid)?;
            Ok(second)
        }
    }
}

/// Validate a value against the supported JSON-schema subset.
pub fn validate_against_schema(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    if schema.is_null() {
        return Ok(());
    }
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| format!("schema at '{}' must be an object", path))?;

    if let Some(type_spec) = schema_obj.get("type") {
        validate_json_type(value, type_spec, path)?;
    }

    if let Some(constant) = schema_obj.get("const") {
        if value != constant {
            return Err(format!("{} expected const {}", path, constant));
        }
    }

    if let Some(variants) = schema_obj.get("enum").and_then(|v| v.as_array()) {
        if !variants.iter().any(|candidate| candidate == value) {
            return Err(format!("{} is not one of the allowed enum values", path));
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(|v| v.as_array()) {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{} must be an object for required fields", path))?;
        for key in required.iter().filter_map(|v| v.as_str()) {
            if !object.contains_key(key) {
                return Err(format!("{} missing required field '{}'", path, key));
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(|v| v.as_object()) {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{} must be an object for properties validation", path))?;
        for (key, property_schema) in properties {
            if let Some(child) = object.get(key) {
                let child_path = format!("{}.{}", path, key);
                validate_against_schema(child, property_schema, &child_path)?;
            }
        }
        if schema_obj
            .get("additionalProperties")
            .and_then(|v| v.as_bool())
            == Some(false)
        {
            for key in object.keys() {
                if !properties.contains_key(key) {
                    return Err(format!("{} contains unknown field '{}'", path, key));
                }
            }
        }
    }

    if let Some(item_schema) = schema_obj.get("items") {
        let array = value
            .as_array()
            .ok_or_else(|| format!("{} must be an array for items validation", path))?;
        for (idx, item) in array.iter().enumerate() {
            let item_path = format!("{}[{}]", path, idx);
            validate_against_schema(item, item_schema, &item_path)?;
        }
    }

    Ok(())
}

fn validate_json_type(value: &Value, type_spec: &Value, path: &str) -> Result<(), String> {
    let matches = |t: &str, v: &Value| match t {
        "object" => v.is_object(),
        "array" => v.is_array(),
        "string" => v.is_string(),
        "number" => v.is_number(),
        "integer" => v.as_i64().is_some() || v.as_u64().is_some(),
        "boolean" => v.is_boolean(),
        "null" => v.is_null(),
        _ => false,
    };

    match type_spec {
        Value::String(type_name) => {
            if matches(type_name, value) {
                Ok(())
            } else {
                Err(format!("{} expected type '{}'", path, type_name))
            }
        }
        Value::Array(types) => {
            if types
                .iter()
                .filter_map(|t| t.as_str())
                .any(|t| matches(t, value))
            {
                Ok(())
            } else {
                Err(format!("{} did not match any allowed types", path))
            }
        }
        _ => Err(format!("{} schema.type must be string or array", path)),
    }
}
