//! Prompt builders and reply parsers for the CRM assistant features.
//!
//! Every prompt asks for a bare JSON object. Replies are accepted with or
//! without markdown fences or surrounding chatter.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LLMProvider, LlmError};
use crate::contacts::{Contact, LeadTier};
use crate::whatsapp::format_amount;

const SYSTEM_PROMPT: &str =
    "You are a sales assistant inside a CRM. Answer with a single JSON object and nothing else.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScoreResult {
    pub score: i32,
    pub tier: LeadTier,
    pub rationale: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLeadScore {
    score: f64,
    #[serde(default, alias = "reasoning")]
    rationale: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    /// -1.0 (very negative) to 1.0 (very positive).
    pub score: f64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Signals beyond the contact row itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadSignals {
    pub activity_count: usize,
    pub open_deal_value: f64,
}

fn generation_config(max_tokens: u64) -> Value {
    serde_json::json!({
        "system": SYSTEM_PROMPT,
        "temperature": 0.2,
        "max_tokens": max_tokens,
    })
}

pub fn lead_score_prompt(contact: &Contact, signals: LeadSignals) -> String {
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
    format!(
        "Score this sales lead from 0 (no chance) to 100 (ready to buy).\n\
         Name: {}\nCompany: {}\nPosition: {}\nLead status: {}\nSource: {}\nTags: {}\n\
         Current score: {}\nLogged activities: {}\nOpen deal value: {}\nNotes: {}\n\n\
         Reply as {{\"score\": number, \"rationale\": string, \"recommendations\": [string]}}.",
        contact.full_name(),
        or_unknown(&contact.company),
        or_unknown(&contact.position),
        contact.lead_status,
        or_unknown(&contact.source),
        if contact.tags.is_empty() {
            "none".to_string()
        } else {
            contact.tags.join(", ")
        },
        contact.lead_score,
        signals.activity_count,
        format_amount(signals.open_deal_value),
        or_unknown(&contact.notes),
    )
}

pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "Classify the sentiment of this customer message.\n\nMessage:\n\"\"\"\n{text}\n\"\"\"\n\n\
         Reply as {{\"sentiment\": \"positive\"|\"neutral\"|\"negative\", \"score\": number from -1 to 1, \"summary\": string}}."
    )
}

pub fn email_prompt(contact: &Contact, purpose: &str, tone: &str) -> String {
    format!(
        "Write a short sales email to {} ({}{}).\nPurpose: {purpose}\nTone: {tone}\n\n\
         Reply as {{\"subject\": string, \"body\": string}}.",
        contact.full_name(),
        contact.position.as_deref().unwrap_or("contact"),
        contact
            .company
            .as_deref()
            .map(|c| format!(" at {c}"))
            .unwrap_or_default(),
    )
}

/// Pulls the first JSON object out of a model reply.
pub fn extract_json<T: DeserializeOwned>(reply: &str) -> Result<T, LlmError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(LlmError::InvalidResponse("no JSON object in reply".to_string())),
    };
    serde_json::from_str(candidate).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

pub fn parse_lead_score(reply: &str) -> Result<LeadScoreResult, LlmError> {
    let raw: RawLeadScore = extract_json(reply)?;
    if !raw.score.is_finite() {
        return Err(LlmError::InvalidResponse("score is not a number".to_string()));
    }
    let score = raw.score.round().clamp(0.0, 100.0) as i32;
    Ok(LeadScoreResult {
        score,
        tier: LeadTier::from_score(score),
        rationale: raw.rationale.trim().to_string(),
        recommendations: raw
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect(),
    })
}

pub fn parse_sentiment(reply: &str) -> Result<SentimentResult, LlmError> {
    let mut result: SentimentResult = extract_json(reply)?;
    if !result.score.is_finite() {
        return Err(LlmError::InvalidResponse("score is not a number".to_string()));
    }
    result.score = result.score.clamp(-1.0, 1.0);
    Ok(result)
}

pub fn parse_email(reply: &str) -> Result<EmailDraft, LlmError> {
    let draft: EmailDraft = extract_json(reply)?;
    if draft.subject.trim().is_empty() || draft.body.trim().is_empty() {
        return Err(LlmError::InvalidResponse("email draft is empty".to_string()));
    }
    Ok(draft)
}

pub async fn score_lead(
    llm: &dyn LLMProvider,
    contact: &Contact,
    signals: LeadSignals,
) -> Result<LeadScoreResult, LlmError> {
    let reply = llm
        .generate(&lead_score_prompt(contact, signals), &generation_config(600))
        .await?;
    parse_lead_score(&reply)
}

pub async fn analyze_sentiment(
    llm: &dyn LLMProvider,
    text: &str,
) -> Result<SentimentResult, LlmError> {
    let reply = llm
        .generate(&sentiment_prompt(text), &generation_config(300))
        .await?;
    parse_sentiment(&reply)
}

pub async fn draft_email(
    llm: &dyn LLMProvider,
    contact: &Contact,
    purpose: &str,
    tone: &str,
) -> Result<EmailDraft, LlmError> {
    let reply = llm
        .generate(&email_prompt(contact, purpose, tone), &generation_config(900))
        .await?;
    parse_email(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::CreateContactRequest;
    use crate::core::shared::test_utils::MockLlm;
    use chrono::Utc;

    fn contact() -> Contact {
        Contact::from_request(
            CreateContactRequest {
                first_name: Some("Rina".into()),
                last_name: Some("Wijaya".into()),
                email: Some("rina@example.com".into()),
                company: Some("Kopi Nusantara".into()),
                tags: vec!["wholesale".into()],
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_score_is_clamped() {
        let result = parse_lead_score(
            r#"{"score": 140, "rationale": "eager", "recommendations": ["call"]}"#,
        )
        .unwrap();
        assert_eq!(result.score, 100);
        assert_eq!(result.tier, LeadTier::Hot);

        let result = parse_lead_score(r#"{"score": -12.6}"#).unwrap();
        assert_eq!(result.score, 0);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_fenced_reply_is_accepted() {
        let reply = "Sure! Here you go:\n```json\n{\"score\": 64.4, \"reasoning\": \"steady interest\"}\n```";
        let result = parse_lead_score(reply).unwrap();
        assert_eq!(result.score, 64);
        assert_eq!(result.tier, LeadTier::Warm);
        assert_eq!(result.rationale, "steady interest");
    }

    #[test]
    fn test_unparseable_reply() {
        assert!(matches!(
            parse_lead_score("I cannot score this lead."),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(parse_email(r#"{"subject": "", "body": "x"}"#).is_err());
    }

    #[test]
    fn test_sentiment_parsing() {
        let result = parse_sentiment(
            r#"{"sentiment": "negative", "score": -3, "summary": "Upset about late delivery"}"#,
        )
        .unwrap();
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert_eq!(result.score, -1.0);
    }

    #[test]
    fn test_lead_prompt_mentions_signals() {
        let prompt = lead_score_prompt(
            &contact(),
            LeadSignals {
                activity_count: 4,
                open_deal_value: 12_500_000.0,
            },
        );
        assert!(prompt.contains("Rina Wijaya"));
        assert!(prompt.contains("Kopi Nusantara"));
        assert!(prompt.contains("Logged activities: 4"));
        assert!(prompt.contains("Rp 12.500.000"));
        assert!(prompt.contains("Tags: wholesale"));
    }

    #[tokio::test]
    async fn test_draft_email_uses_provider() {
        let llm = MockLlm::replying(r#"{"subject": "Restock offer", "body": "Hi Rina, ..."}"#);
        let draft = draft_email(&llm, &contact(), "restock offer", "friendly")
            .await
            .unwrap();
        assert_eq!(draft.subject, "Restock offer");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Purpose: restock offer"));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let llm = MockLlm::failing(LlmError::Timeout);
        let err = analyze_sentiment(&llm, "great service").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout));
    }
}
