use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::adapter::{WhatsAppError, WhatsAppSender};
use super::messages::MessageContent;
use super::phone::normalize_phone;
use super::throttle::Throttle;
use crate::activities::{record_activity, ActivityType};
use crate::contacts::Contact;
use crate::core::storage::{CrmStore, StoreError};
use crate::templates::WhatsAppTemplate;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("contact not found")]
    ContactNotFound,
    #[error("contact has no phone number")]
    MissingPhone,
    #[error("phone number '{0}' is not dialable")]
    InvalidPhone(String),
    #[error("WhatsApp template not loaded")]
    TemplateMissing,
    #[error("{0}")]
    Send(#[from] WhatsAppError),
    #[error("storage error: {0}")]
    Store(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub message_id: String,
    pub to: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    pub contact_id: Uuid,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<BroadcastResult>,
}

impl BroadcastSummary {
    pub fn from_results(results: Vec<BroadcastResult>) -> Self {
        let sent = results
            .iter()
            .filter(|r| r.status == DeliveryStatus::Sent)
            .count();
        Self {
            total: results.len(),
            sent,
            failed: results.len() - sent,
            results,
        }
    }
}

/// Everything one outbound send needs.
pub struct Dispatcher<'a> {
    pub store: &'a dyn CrmStore,
    pub sender: &'a dyn WhatsAppSender,
    pub business_name: &'a str,
    pub country_code: &'a str,
}

impl Dispatcher<'_> {
    pub async fn send_to_contact(
        &self,
        contact: &Contact,
        content: &MessageContent,
        template: Option<&WhatsAppTemplate>,
    ) -> Result<Delivered, DeliveryError> {
        let to = self.recipient(contact)?;
        let body = content
            .compose(contact, self.business_name, template)
            .ok_or(DeliveryError::TemplateMissing)?;

        let message_id = self.sender.send_text(&to, &body).await?;
        self.note_delivery(contact, content, &body).await;

        Ok(Delivered {
            message_id,
            to,
            body,
        })
    }

    /// Sends to each contact in order. One result per id, failures included.
    pub async fn broadcast(
        &self,
        throttle: &dyn Throttle,
        contact_ids: &[Uuid],
        content: &MessageContent,
        template: Option<&WhatsAppTemplate>,
    ) -> Vec<BroadcastResult> {
        let mut results = Vec::with_capacity(contact_ids.len());
        let mut attempts = 0usize;

        for &contact_id in contact_ids {
            let contact = match self.store.get_contact(contact_id).await {
                Ok(contact) => contact,
                Err(StoreError::NotFound(_)) => {
                    results.push(failed(contact_id, None, DeliveryError::ContactNotFound));
                    continue;
                }
                Err(e) => {
                    results.push(failed(contact_id, None, DeliveryError::Store(e)));
                    continue;
                }
            };

            let phone = match self.recipient(&contact) {
                Ok(phone) => phone,
                Err(e) => {
                    results.push(failed(contact_id, contact.phone.clone(), e));
                    continue;
                }
            };

            throttle.wait(attempts).await;
            attempts += 1;

            match self.send_to_contact(&contact, content, template).await {
                Ok(delivered) => results.push(BroadcastResult {
                    contact_id,
                    status: DeliveryStatus::Sent,
                    phone: Some(delivered.to),
                    message_id: Some(delivered.message_id),
                    error: None,
                }),
                Err(e) => {
                    warn!("Broadcast send to contact {contact_id} failed: {e}");
                    results.push(failed(contact_id, Some(phone), e));
                }
            }
        }

        info!(
            "Broadcast finished: {} of {} sent",
            results
                .iter()
                .filter(|r| r.status == DeliveryStatus::Sent)
                .count(),
            results.len()
        );
        results
    }

    fn recipient(&self, contact: &Contact) -> Result<String, DeliveryError> {
        let raw = contact.phone.as_deref().ok_or(DeliveryError::MissingPhone)?;
        normalize_phone(raw, self.country_code)
            .ok_or_else(|| DeliveryError::InvalidPhone(raw.to_string()))
    }

    async fn note_delivery(&self, contact: &Contact, content: &MessageContent, body: &str) {
        record_activity(
            self.store,
            contact.id,
            ActivityType::Whatsapp,
            format!("WhatsApp {} sent", content.kind().replace('_', " ")),
            Some(body.to_string()),
        )
        .await;

        if let Err(e) = self.store.touch_last_contact(contact.id, Utc::now()).await {
            warn!(
                "Failed to update last contact date for {}: {e}",
                contact.id
            );
        }
    }
}

fn failed(contact_id: Uuid, phone: Option<String>, error: DeliveryError) -> BroadcastResult {
    BroadcastResult {
        contact_id,
        status: DeliveryStatus::Failed,
        phone,
        message_id: None,
        error: Some(error.to_string()),
    }
}
