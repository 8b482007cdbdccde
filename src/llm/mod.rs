pub mod assistant;
pub mod handlers;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;

use crate::core::config::AiConfig;
use crate::core::shared::error::CrmError;

pub use handlers::configure_ai_routes;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("AI service is not configured")]
    NotConfigured,
    #[error("AI request timed out")]
    Timeout,
    #[error("AI request failed: {0}")]
    Network(String),
    #[error("AI API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("AI reply could not be understood: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for CrmError {
    fn from(err: LlmError) -> Self {
        warn!("AI assistance unavailable: {err}");
        CrmError::ServiceUnavailable("AI service unavailable".to_string())
    }
}

/// Text generation backend. `config` carries per-call knobs such as
/// `system`, `temperature` and `max_tokens`.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, prompt: &str, config: &Value) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::NotConfigured)?;
        Self::new(
            api_key,
            Some(config.base_url.clone()),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn generate(&self, prompt: &str, config: &Value) -> Result<String, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = config["system"].as_str() {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": messages,
                "temperature": config["temperature"].as_f64().unwrap_or(0.3),
                "max_tokens": config["max_tokens"].as_u64().unwrap_or(800),
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))?;

        debug!("AI completion received ({} chars)", content.len());
        Ok(content.to_string())
    }
}
