use log::{info, warn};
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::storage::CrmStore;
use crate::llm::{LLMProvider, OpenAIClient};
use crate::whatsapp::{
    throttle_from_config, Throttle, WhatsAppAdapter, WhatsAppError, WhatsAppSender,
};

/// Shared handler state. Integrations are optional; handlers answer 503 when
/// the one they need is absent.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CrmStore>,
    pub config: AppConfig,
    pub llm: Option<Arc<dyn LLMProvider>>,
    pub whatsapp: Option<Arc<dyn WhatsAppSender>>,
    pub throttle: Arc<dyn Throttle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("llm", &self.llm.is_some())
            .field("whatsapp", &self.whatsapp.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires integrations from configuration.
    pub fn from_config(store: Arc<dyn CrmStore>, config: AppConfig) -> Self {
        let llm: Option<Arc<dyn LLMProvider>> = if config.ai.is_enabled() {
            match OpenAIClient::from_config(&config.ai) {
                Ok(client) => {
                    info!("AI assistance enabled (model {})", config.ai.model);
                    Some(Arc::new(client))
                }
                Err(e) => {
                    warn!("AI assistance disabled: {e}");
                    None
                }
            }
        } else {
            info!("AI_API_KEY not set, AI assistance disabled");
            None
        };

        let whatsapp: Option<Arc<dyn WhatsAppSender>> =
            match WhatsAppAdapter::from_config(&config.whatsapp) {
                Ok(adapter) => {
                    info!("WhatsApp messaging enabled");
                    Some(Arc::new(adapter))
                }
                Err(WhatsAppError::NotConfigured) => {
                    info!("WhatsApp credentials not set, messaging disabled");
                    None
                }
                Err(e) => {
                    warn!("WhatsApp messaging disabled: {e}");
                    None
                }
            };

        let throttle: Arc<dyn Throttle> = Arc::from(throttle_from_config(&config.whatsapp));

        Self {
            store,
            config,
            llm,
            whatsapp,
            throttle,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_whatsapp(mut self, sender: Arc<dyn WhatsAppSender>) -> Self {
        self.whatsapp = Some(sender);
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }
}
