//! OpenAI-compatible chat-completions client for worker-model invocation.
//!
//! Transient failures (rate limits, 5xx, network) retry with exponential
//! backoff; client errors surface immediately.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::ModelConfig;
use crate::domain::ports::{FieldRequest, FieldResponse, ModelClient};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

/// Shape the model is instructed to answer with.
#[derive(Debug, Deserialize)]
struct FieldAnswer {
    value: Option<serde_json::Value>,
    confidence: Option<f64>,
}

pub struct OpenAiCompatClient {
    http: ReqwestClient,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn new(config: &ModelConfig) -> anyhow::Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    pub async fn chat(&self, model: &str, system: &str, user: &str) -> Result<(String, u64), ApiError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system.to_string() },
                ChatMessage { role: "user".to_string(), content: user.to_string() },
            ],
            temperature: 0.0,
        };

        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(Some(Duration::from_secs(120) * (self.max_retries + 1)))
            .build();

        let mut attempts = 0u32;
        backoff::future::retry(backoff, || {
            attempts += 1;
            let request = &request;
            async move {
                match self.send(request).await {
                    Ok(result) => Ok(result),
                    Err(e) if e.is_transient() && attempts <= self.max_retries => {
                        warn!(attempt = attempts, error = %e, "transient model API error, retrying");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<(String, u64), ApiError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ApiError::Malformed("empty choices".to_string()))?;
        let tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);

        Ok((content, tokens))
    }
}

/// Extract the first JSON object embedded in a model reply. Models often wrap
/// answers in markdown fences or prose.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn field_prompt(request: &FieldRequest) -> (String, String) {
    let system = "You extract a single field from a document. Respond with only a JSON \
                  object: {\"value\": <extracted value or null>, \"confidence\": <0..1>}."
        .to_string();

    let mut user = format!(
        "Field: {}\nType: {}\n",
        request.field.name, request.field.field_type
    );
    if let Some(desc) = &request.field.description {
        user.push_str(&format!("Description: {desc}\n"));
    }
    if let Some(hint) = &request.field.extraction_hint {
        user.push_str(&format!("Hint: {hint}\n"));
    }
    if !request.field.examples.is_empty() {
        user.push_str(&format!("Examples: {}\n", request.field.examples.join(", ")));
    }
    for hint in &request.hints {
        user.push_str(&format!("Note: {hint}\n"));
    }
    user.push_str("\nDocument:\n");
    user.push_str(&request.document_text);

    (system, user)
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn extract_field(&self, request: &FieldRequest) -> DomainResult<FieldResponse> {
        let (system, user) = field_prompt(request);
        let (content, tokens) = self
            .chat(&request.model, &system, &user)
            .await
            .map_err(|e| DomainError::ModelInvocationFailed(e.to_string()))?;

        debug!(field = %request.field.name, model = %request.model, tokens, "model answered");

        // A reply that is not the requested JSON still carries a value: take
        // the raw text rather than failing the whole document.
        let answer = extract_json_object(&content)
            .and_then(|json| serde_json::from_str::<FieldAnswer>(json).ok())
            .unwrap_or(FieldAnswer {
                value: Some(serde_json::Value::String(content.trim().to_string())),
                confidence: None,
            });

        Ok(FieldResponse {
            value: answer.value.filter(|v| !v.is_null()),
            self_confidence: answer.confidence.map(|c| c.clamp(0.0, 1.0)),
            tokens,
        })
    }
}
