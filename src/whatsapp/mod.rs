pub mod adapter;
pub mod broadcast;
pub mod messages;
pub mod phone;
pub mod throttle;
pub mod webhook;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::activities::{record_activity, ActivityType};
use crate::contacts::ContactFilter;
use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{Query, ValidatedJson};
use crate::templates::WhatsAppTemplate;

pub use adapter::{WhatsAppAdapter, WhatsAppError, WhatsAppSender};
pub use broadcast::{BroadcastResult, BroadcastSummary, DeliveryError, DeliveryStatus, Dispatcher};
pub use messages::{format_amount, MessageContent, OrderItem};
pub use phone::normalize_phone;
pub use throttle::{throttle_from_config, FixedDelay, NoThrottle, QuotaThrottle, Throttle};
pub use webhook::{WebhookVerifyQuery, WhatsAppWebhook};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub contact_id: Option<Uuid>,
    #[validate(length(min = 1, max = 32, message = "must be between 1 and 32 characters"))]
    pub to: Option<String>,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message_id: String,
    pub to: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    #[validate(length(min = 1, max = 1000, message = "must list between 1 and 1000 contacts"))]
    pub contact_ids: Vec<Uuid>,
    pub content: MessageContent,
}

pub fn configure_whatsapp_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/whatsapp/send", post(send_message))
        .route("/api/whatsapp/broadcast", post(broadcast_message))
        .route("/webhook/whatsapp", get(verify_webhook).post(handle_webhook))
}

fn sender(state: &AppState) -> CrmResult<&dyn WhatsAppSender> {
    state
        .whatsapp
        .as_deref()
        .ok_or_else(|| CrmError::ServiceUnavailable("WhatsApp messaging is not configured".into()))
}

fn dispatcher<'a>(state: &'a AppState, sender: &'a dyn WhatsAppSender) -> Dispatcher<'a> {
    Dispatcher {
        store: state.store.as_ref(),
        sender,
        business_name: &state.config.whatsapp.business_name,
        country_code: &state.config.whatsapp.country_code,
    }
}

fn ensure_sendable(content: &MessageContent) -> CrmResult<()> {
    if let Some(field) = content.invalid_amount() {
        return Err(CrmError::invalid(
            field,
            "must be a non-negative number no larger than 1e15",
        ));
    }
    match content {
        MessageContent::Text { body } if body.trim().is_empty() => {
            Err(CrmError::invalid("content.body", "must not be empty"))
        }
        _ => Ok(()),
    }
}

async fn load_template(
    state: &AppState,
    content: &MessageContent,
) -> CrmResult<Option<WhatsAppTemplate>> {
    match content.template_id() {
        Some(id) => Ok(Some(state.store.get_whatsapp_template(id).await?)),
        None => Ok(None),
    }
}

impl From<DeliveryError> for CrmError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::ContactNotFound => CrmError::not_found("Contact"),
            DeliveryError::MissingPhone | DeliveryError::InvalidPhone(_) => {
                CrmError::invalid("phone", err.to_string())
            }
            DeliveryError::TemplateMissing => CrmError::not_found("WhatsApp template"),
            DeliveryError::Send(e) => {
                warn!("WhatsApp delivery failed: {e}");
                CrmError::ServiceUnavailable("messaging unavailable".to_string())
            }
            DeliveryError::Store(e) => e.into(),
        }
    }
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> CrmResult<Json<SendMessageResponse>> {
    ensure_sendable(&request.content)?;
    let sender = sender(&state)?;

    if let Some(contact_id) = request.contact_id {
        let contact = state.store.get_contact(contact_id).await?;
        let template = load_template(&state, &request.content).await?;
        let delivered = dispatcher(&state, sender)
            .send_to_contact(&contact, &request.content, template.as_ref())
            .await?;
        info!("Sent WhatsApp {} to contact {contact_id}", request.content.kind());
        return Ok(Json(SendMessageResponse {
            message_id: delivered.message_id,
            to: delivered.to,
            body: delivered.body,
            contact_id: Some(contact_id),
        }));
    }

    let raw = request
        .to
        .as_deref()
        .ok_or_else(|| CrmError::invalid("contactId", "contactId or to is required"))?;
    let body = match &request.content {
        MessageContent::Text { body } => body.clone(),
        _ => {
            return Err(CrmError::invalid(
                "contactId",
                "is required for this message kind",
            ))
        }
    };
    let to = normalize_phone(raw, &state.config.whatsapp.country_code)
        .ok_or_else(|| CrmError::invalid("to", "is not a dialable phone number"))?;

    let message_id = sender
        .send_text(&to, &body)
        .await
        .map_err(|e| CrmError::from(DeliveryError::Send(e)))?;
    info!("Sent WhatsApp text to {to}");

    Ok(Json(SendMessageResponse {
        message_id,
        to,
        body,
        contact_id: None,
    }))
}

pub async fn broadcast_message(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BroadcastRequest>,
) -> CrmResult<Json<BroadcastSummary>> {
    ensure_sendable(&request.content)?;
    let sender = sender(&state)?;
    let template = load_template(&state, &request.content).await?;

    info!(
        "Starting WhatsApp {} broadcast to {} contacts",
        request.content.kind(),
        request.contact_ids.len()
    );
    let results = dispatcher(&state, sender)
        .broadcast(
            state.throttle.as_ref(),
            &request.contact_ids,
            &request.content,
            template.as_ref(),
        )
        .await;

    Ok(Json(BroadcastSummary::from_results(results)))
}

pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WebhookVerifyQuery>,
) -> impl IntoResponse {
    info!("WhatsApp webhook verification request received");

    match webhook::verify_subscription(&params, state.config.whatsapp.verify_token.as_deref()) {
        Ok(challenge) => {
            info!("Webhook verification successful");
            (StatusCode::OK, challenge)
        }
        Err(reason) => {
            warn!("Webhook verification rejected: {reason}");
            (StatusCode::FORBIDDEN, reason.to_string())
        }
    }
}

/// Inbound messages become `whatsapp` activities on the matching contact.
/// Always answers 200, including for bodies that fail to parse.
pub async fn handle_webhook(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let payload: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Discarding malformed WhatsApp webhook: {e}");
            return StatusCode::OK;
        }
    };
    if payload.object != "whatsapp_business_account" {
        debug!("Ignoring webhook for object {}", payload.object);
        return StatusCode::OK;
    }

    let inbound: Vec<(String, String, Option<String>)> = payload
        .entry
        .into_iter()
        .flat_map(|entry| entry.changes)
        .filter(|change| change.field == "messages")
        .flat_map(|change| {
            for status in &change.value.statuses {
                debug!(
                    "Message {} status: {} for {}",
                    status.id, status.status, status.recipient_id
                );
            }
            let sender_name = change.value.contacts.first().map(|c| c.profile.name.clone());
            change
                .value
                .messages
                .into_iter()
                .filter_map(|message| {
                    webhook::extract_message_text(&message)
                        .map(|text| (message.from, text, sender_name.clone()))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    if inbound.is_empty() {
        return StatusCode::OK;
    }

    let contacts = match state.store.list_contacts(&ContactFilter::default()).await {
        Ok(contacts) => contacts,
        Err(e) => {
            warn!("Could not load contacts for inbound WhatsApp messages: {e}");
            return StatusCode::OK;
        }
    };

    let country_code = &state.config.whatsapp.country_code;
    for (from, text, sender_name) in inbound {
        let matched = contacts.iter().find(|c| {
            c.phone
                .as_deref()
                .is_some_and(|p| phone::same_phone(p, &from, country_code))
        });
        match matched {
            Some(contact) => {
                record_activity(
                    state.store.as_ref(),
                    contact.id,
                    ActivityType::Whatsapp,
                    "WhatsApp message received",
                    Some(text),
                )
                .await;
                info!("Recorded inbound WhatsApp message for contact {}", contact.id);
            }
            None => debug!(
                "Inbound WhatsApp message from unknown number {from} ({})",
                sender_name.as_deref().unwrap_or("no profile name")
            ),
        }
    }

    StatusCode::OK
}
