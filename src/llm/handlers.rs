use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::assistant::{
    analyze_sentiment, draft_email, score_lead, EmailDraft, LeadScoreResult, LeadSignals,
    SentimentResult,
};
use super::{LLMProvider, LlmError};
use crate::core::shared::error::CrmResult;
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{Path, ValidatedJson};
use crate::deals::DealFilters;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SentimentRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 5000, message = "must be between 1 and 5000 characters")
    )]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateEmailRequest {
    #[validate(required(message = "is required"))]
    pub contact_id: Option<Uuid>,
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 500, message = "must be between 1 and 500 characters")
    )]
    pub purpose: Option<String>,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub tone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScoreResponse {
    pub contact_id: Uuid,
    pub previous_score: i32,
    #[serde(flatten)]
    pub result: LeadScoreResult,
}

#[derive(Debug, Serialize)]
pub struct AiStatus {
    pub available: bool,
}

pub fn configure_ai_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ai/status", get(handle_ai_status))
        .route("/api/ai/lead-score/:contact_id", post(handle_lead_score))
        .route("/api/ai/sentiment", post(handle_sentiment))
        .route("/api/ai/generate-email", post(handle_generate_email))
}

fn provider(state: &AppState) -> CrmResult<&dyn LLMProvider> {
    state
        .llm
        .as_deref()
        .ok_or_else(|| LlmError::NotConfigured.into())
}

pub async fn handle_ai_status(State(state): State<Arc<AppState>>) -> Json<AiStatus> {
    Json(AiStatus {
        available: state.llm.is_some(),
    })
}

/// Scores a lead and stores the new score on the contact.
pub async fn handle_lead_score(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> CrmResult<Json<LeadScoreResponse>> {
    let llm = provider(&state)?;
    let contact = state.store.get_contact(contact_id).await?;

    let deal_filters = DealFilters::for_contact(contact_id);
    let (activities, deals) = tokio::try_join!(
        state.store.list_activities(Some(contact_id)),
        state.store.list_deals(&deal_filters),
    )?;
    let signals = LeadSignals {
        activity_count: activities.len(),
        open_deal_value: deals
            .iter()
            .filter(|d| !d.stage.is_closed())
            .map(|d| d.value)
            .sum(),
    };

    let result = score_lead(llm, &contact, signals).await?;

    let previous_score = contact.lead_score;
    state
        .store
        .set_lead_score(contact_id, result.score, Utc::now())
        .await?;
    info!(
        "AI lead score for contact {contact_id}: {previous_score} -> {}",
        result.score
    );

    Ok(Json(LeadScoreResponse {
        contact_id,
        previous_score,
        result,
    }))
}

pub async fn handle_sentiment(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<SentimentRequest>,
) -> CrmResult<Json<SentimentResult>> {
    let llm = provider(&state)?;
    let text = request.text.unwrap_or_default();
    let result = analyze_sentiment(llm, text.trim()).await?;
    Ok(Json(result))
}

pub async fn handle_generate_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<GenerateEmailRequest>,
) -> CrmResult<Json<EmailDraft>> {
    let llm = provider(&state)?;
    let contact_id = request.contact_id.unwrap_or_default();
    let contact = state.store.get_contact(contact_id).await?;
    let tone = request
        .tone
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("professional");

    let draft = draft_email(
        llm,
        &contact,
        request.purpose.as_deref().unwrap_or_default().trim(),
        tone,
    )
    .await?;
    Ok(Json(draft))
}
