//! In-process doubles for the external integrations, shared by unit tests
//! and the HTTP tests under `tests/`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::config::AppConfig;
use crate::core::shared::state::AppState;
use crate::core::storage::MemoryStore;
use crate::llm::{LLMProvider, LlmError};
use crate::whatsapp::{NoThrottle, WhatsAppError, WhatsAppSender};

/// Replies with a fixed completion (or error) and records every prompt.
#[derive(Debug)]
pub struct MockLlm {
    reply: Result<String, LlmError>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LlmError) -> Self {
        Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for MockLlm {
    async fn generate(&self, prompt: &str, _config: &Value) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone()
    }
}

/// Accepts every send except to numbers marked as failing.
#[derive(Debug, Default)]
pub struct MockWhatsAppSender {
    failing: Vec<String>,
    sent: Mutex<Vec<(String, String)>>,
    counter: AtomicUsize,
}

impl MockWhatsAppSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, phone: impl Into<String>) -> Self {
        self.failing.push(phone.into());
        self
    }

    /// `(to, body)` pairs of accepted sends, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WhatsAppSender for MockWhatsAppSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, WhatsAppError> {
        if self.failing.iter().any(|p| p == to) {
            return Err(WhatsAppError::Api {
                status: 400,
                message: format!("Recipient {to} is not a valid WhatsApp user"),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), body.to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("wamid.mock{n}"))
    }
}

/// Defaults with auth off and a memory store.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.required = false;
    config.whatsapp.verify_token = Some("verify-me".to_string());
    config
}

/// Memory-backed state without integrations and without send pacing.
pub fn test_state() -> AppState {
    test_state_with_config(test_config())
}

pub fn test_state_with_config(config: AppConfig) -> AppState {
    AppState::from_config(Arc::new(MemoryStore::new()), config).with_throttle(Arc::new(NoThrottle))
}
