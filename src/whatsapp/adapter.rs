use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::config::WhatsAppConfig;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WhatsAppError {
    #[error("WhatsApp is not configured")]
    NotConfigured,
    #[error("Network error: {0}")]
    Network(String),
    #[error("WhatsApp API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Outbound text delivery. Returns the provider message id.
#[async_trait]
pub trait WhatsAppSender: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, WhatsAppError>;
}

#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessageId>,
}

#[derive(Debug, Deserialize)]
struct SentMessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// WhatsApp Business Cloud API client.
#[derive(Debug, Clone)]
pub struct WhatsAppAdapter {
    http_client: reqwest::Client,
    api_base: String,
    api_version: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppAdapter {
    pub fn new(
        api_base: impl Into<String>,
        api_version: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, WhatsAppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WhatsAppError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        })
    }

    /// `NotConfigured` when the token or phone number id is missing.
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, WhatsAppError> {
        let (token, phone_id) = config.credentials().ok_or(WhatsAppError::NotConfigured)?;
        Self::new(
            config.api_base.clone(),
            config.api_version.clone(),
            phone_id,
            token,
        )
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base, self.api_version, self.phone_number_id
        )
    }
}

#[async_trait]
impl WhatsAppSender for WhatsAppAdapter {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, WhatsAppError> {
        let payload = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: TextBody {
                preview_url: false,
                body,
            },
        };

        let response = self
            .http_client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WhatsAppError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorResponse>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("request failed with status {status}"));
            warn!("WhatsApp send to {to} failed: {message}");
            return Err(WhatsAppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| WhatsAppError::Parse(e.to_string()))?;
        let id = sent
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| WhatsAppError::Parse("response carried no message id".to_string()))?;

        debug!("WhatsApp message {id} accepted for {to}");
        Ok(id)
    }
}
