//! OpenAI-compatible chat-completions client.
//!
//! Works against hosted APIs and local inference servers (llama.cpp,
//! vLLM, Ollama's compat endpoint) that speak the same wire format.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use deskpilot_core::provider::{GenerateRequest, Provider, ProviderError};

use crate::extract_json;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Base endpoint, e.g. `https://api.openai.com/v1` or a local server.
    pub endpoint: String,
    /// API key; empty for unauthenticated local servers.
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            timeout_secs: 30,
        }
    }
}

/// OpenAI-compatible structured-output provider.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ChatErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatErrorDetail {
    message: String,
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<Value, ProviderError> {
        let url = format!("{}/chat/completions", self.config.endpoint);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.config.api_key.is_empty() {
            let bearer = format!("Bearer {}", self.config.api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&bearer).map_err(|e| ProviderError::Http(e.to_string()))?,
            );
        }

        // The schema travels in the prompt; JSON mode keeps the output
        // parseable, and the core validates structure after extraction.
        let user = format!(
            "{}\n\nThe answer MUST be one JSON object matching this schema:\n{}",
            request.prompt, request.schema
        );
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        tracing::debug!(model = %self.config.model, endpoint = %self.config.endpoint, "provider request");
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Response(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Serialization(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::Response(error.message));
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Response("no content in response".to_string()))?;

        let json_str = extract_json(&content)
            .ok_or_else(|| ProviderError::Response("output contained no JSON object".to_string()))?;
        serde_json::from_str(&json_str).map_err(|e| ProviderError::Serialization(e.to_string()))
    }
}
