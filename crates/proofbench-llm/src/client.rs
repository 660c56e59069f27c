//! Chat-completion client interface and OpenAI-compatible HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::ChatError;
use crate::Result;

/// Longest response-body excerpt kept in a [`ChatError::Status`].
const ERROR_BODY_EXCERPT: usize = 512;

/// A single-turn chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Optional system message sent before the prompt.
    pub system: Option<String>,
    /// User message.
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// Create a request with the default sampling parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    /// Attach a system message.
    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    /// Override `max_tokens`.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the OpenAI-compatible request body for `model`.
    pub fn to_payload(&self, model: &str) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": self.prompt}));
        json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// Assistant reply plus the raw response document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub raw: Value,
}

/// Anything that can answer a [`ChatRequest`].
///
/// Implementations must be usable from a single sequential runner; they do
/// not need to be internally concurrent.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one request and return the assistant's text.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Endpoint identifier recorded in run manifests.
    fn endpoint(&self) -> &str;

    /// Model identifier recorded in run manifests.
    fn model(&self) -> &str;
}

/// HTTP client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    config: EndpointConfig,
    http_client: reqwest::Client,
}

impl OpenAiChatClient {
    /// Create a client. Fails when no endpoint URL is configured.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(ChatError::NotConfigured);
        }
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("proofbench/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create a client from environment variables, if an endpoint is set.
    pub fn from_env() -> Option<Self> {
        Self::new(EndpointConfig::from_env()).ok()
    }

    /// Settings this client was built with.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let payload = request.to_payload(&self.config.model);
        let mut builder = self.http_client.post(&self.config.url).json(&payload);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(url = %self.config.url, model = %self.config.model, "sending chat request");
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(ChatError::Status {
                url: self.config.url.clone(),
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_EXCERPT).collect(),
            });
        }

        let raw: Value = serde_json::from_str(&body)?;
        Ok(ChatResponse {
            text: extract_text(&raw),
            raw,
        })
    }

    fn endpoint(&self) -> &str {
        &self.config.url
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl OpenAiChatClient {
    fn transport_error(&self, err: reqwest::Error) -> ChatError {
        if err.is_timeout() {
            ChatError::Timeout {
                url: self.config.url.clone(),
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            ChatError::from(err)
        }
    }
}

/// Pull the assistant text out of a response document.
///
/// Prefers `choices[0].message.content`; non-conforming services are read
/// from a top-level `output` or `text` string, and anything else is returned
/// as the serialized document so the grader still sees something.
pub fn extract_text(data: &Value) -> String {
    let content = data
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|v| v.as_str());
    if let Some(content) = content {
        return content.trim().to_string();
    }

    ["output", "text"]
        .iter()
        .filter_map(|key| data.get(*key).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_includes_system_message_first() {
        let req = ChatRequest::new("2+2?").with_system(Some("be terse".to_string()));
        let payload = req.to_payload("gpt-4o");
        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["messages"][1]["content"], "2+2?");
        assert_eq!(payload["max_tokens"], 256);
    }

    #[test]
    fn payload_without_system_has_single_message() {
        let payload = ChatRequest::new("hi").to_payload("m");
        assert_eq!(payload["messages"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn extract_text_prefers_choices() {
        let data = json!({
            "choices": [{"message": {"content": "  four \n"}}],
            "output": "ignored"
        });
        assert_eq!(extract_text(&data), "four");
    }

    #[test]
    fn extract_text_falls_back_to_output_then_text() {
        assert_eq!(extract_text(&json!({"output": "o"})), "o");
        assert_eq!(extract_text(&json!({"text": "t"})), "t");
        assert_eq!(extract_text(&json!({"output": "", "text": "t"})), "t");
    }

    #[test]
    fn extract_text_serializes_unknown_shape() {
        let data = json!({"result": 1});
        assert_eq!(extract_text(&data), r#"{"result":1}"#);
    }

    #[test]
    fn unconfigured_client_is_rejected() {
        let err = OpenAiChatClient::new(EndpointConfig::default()).unwrap_err();
        assert!(matches!(err, ChatError::NotConfigured));
    }
}
