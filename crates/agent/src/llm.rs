//! OpenAI-compatible chat-completions client (Groq, OpenAI, Ollama).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use tablebook_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm client is not configured: {0}")]
    Configuration(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
    #[error("llm response had no content")]
    EmptyResponse,
}

/// One completion call. `system` carries the prompt contract; `user` is the
/// raw utterance when there is one.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self { system: system.into(), user: None, temperature: 0.1, max_tokens: 150 }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// No retries: a failed call is reported and the caller degrades.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Configuration(format!("failed to build http client: {error}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }

    /// `None` when the provider is `offline`.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, LlmError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let base_url = config.endpoint_base().ok_or_else(|| {
            LlmError::Configuration(format!("no base url for provider `{}`", config.provider.as_str()))
        })?;
        Self::new(
            &base_url,
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut messages = vec![ChatMessage { role: "system", content: &request.system }];
        if let Some(user) = request.user.as_deref() {
            messages.push(ChatMessage { role: "user", content: user });
        }
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|error| {
            warn!(event_name = "llm.request.failed", endpoint = %self.endpoint, error = %error, "llm request failed");
            LlmError::Transport(error.to_string())
        })?;

        let status = response.status();
        debug!(event_name = "llm.response.received", status = %status, "llm response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(event_name = "llm.response.rejected", status = %status, "llm endpoint rejected request");
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: ChatResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        first_content(payload)
    }
}

fn first_content(payload: ChatResponse) -> Result<String, LlmError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(LlmError::EmptyResponse)
}

/// The first `{ ... }` span in a completion; models often wrap JSON in prose
/// or code fences.
pub fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tablebook_core::config::{LlmConfig, LlmProvider};

    use super::{first_content, json_object_span, ChatCompletionsClient, ChatResponse, LlmError};

    fn config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: Some("test-key".to_string().into()),
            base_url: None,
            model: "llama3-70b-8192".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn offline_provider_builds_no_client() {
        let client = ChatCompletionsClient::from_config(&config(LlmProvider::Offline)).expect("config");
        assert!(client.is_none());
    }

    #[test]
    fn provider_default_endpoint_is_used() {
        let client = ChatCompletionsClient::from_config(&config(LlmProvider::Groq))
            .expect("config")
            .expect("client");
        assert_eq!(client.endpoint(), "https://api.groq.com/openai/v1/chat/completions");

        let custom = ChatCompletionsClient::new("http://localhost:11434/v1/", "m", None, Duration::from_secs(1))
            .expect("client");
        assert_eq!(custom.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn first_choice_content_is_trimmed() {
        let payload: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  {\"intent\": \"booking\"}\n"}}]}"#,
        )
        .expect("payload");
        assert_eq!(first_content(payload).expect("content"), r#"{"intent": "booking"}"#);

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("payload");
        assert!(matches!(first_content(empty), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn json_span_ignores_surrounding_prose() {
        assert_eq!(
            json_object_span("Sure! ```json\n{\"intent\": \"cancellation\"}\n```"),
            Some("{\"intent\": \"cancellation\"}")
        );
        assert_eq!(json_object_span("no json here"), None);
        assert_eq!(json_object_span("} backwards {"), None);
    }
}
