use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppWebhook {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WhatsAppEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppEntry {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WhatsAppChange>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppChange {
    pub field: String,
    pub value: WhatsAppValue,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppValue {
    pub messaging_product: String,
    #[serde(default)]
    pub contacts: Vec<WhatsAppProfileContact>,
    #[serde(default)]
    pub messages: Vec<WhatsAppMessage>,
    #[serde(default)]
    pub statuses: Vec<WhatsAppStatus>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppProfileContact {
    pub wa_id: String,
    pub profile: WhatsAppProfile,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppProfile {
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppMessage {
    pub id: String,
    pub from: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<WhatsAppText>,
    #[serde(default)]
    pub interactive: Option<WhatsAppInteractive>,
    #[serde(default)]
    pub button: Option<WhatsAppButton>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppText {
    pub body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppInteractive {
    #[serde(rename = "type")]
    pub interactive_type: String,
    #[serde(default)]
    pub button_reply: Option<WhatsAppReply>,
    #[serde(default)]
    pub list_reply: Option<WhatsAppReply>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppReply {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppButton {
    pub payload: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WhatsAppStatus {
    pub id: String,
    pub status: String,
    pub timestamp: String,
    pub recipient_id: String,
}

/// Text a customer typed or picked. Media and other kinds yield `None`.
pub fn extract_message_text(message: &WhatsAppMessage) -> Option<String> {
    let text = match message.message_type.as_str() {
        "text" => message.text.as_ref().map(|t| t.body.clone()),
        "interactive" => message.interactive.as_ref().and_then(|i| {
            match i.interactive_type.as_str() {
                "button_reply" => i.button_reply.as_ref(),
                "list_reply" => i.list_reply.as_ref(),
                _ => None,
            }
            .map(|r| r.title.clone())
        }),
        "button" => message.button.as_ref().map(|b| b.text.clone()),
        _ => None,
    };
    text.filter(|t| !t.trim().is_empty())
}

/// Outcome of the `hub.*` verification handshake.
pub fn verify_subscription(
    query: &WebhookVerifyQuery,
    expected: Option<&str>,
) -> Result<String, &'static str> {
    if query.mode.as_deref() != Some("subscribe") {
        return Err("Invalid mode");
    }
    match (expected, query.verify_token.as_deref()) {
        (Some(expected), Some(token)) if expected == token => {
            Ok(query.challenge.clone().unwrap_or_default())
        }
        _ => Err("Invalid verify token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> WhatsAppMessage {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_extract_text_and_replies() {
        let text = message(serde_json::json!({
            "id": "wamid.1", "from": "628123", "timestamp": "1700000000",
            "type": "text", "text": {"body": "Masih ada stok?"}
        }));
        assert_eq!(extract_message_text(&text).as_deref(), Some("Masih ada stok?"));

        let reply = message(serde_json::json!({
            "id": "wamid.2", "from": "628123", "timestamp": "1700000000",
            "type": "interactive",
            "interactive": {"type": "button_reply", "button_reply": {"id": "yes", "title": "Yes please"}}
        }));
        assert_eq!(extract_message_text(&reply).as_deref(), Some("Yes please"));

        let image = message(serde_json::json!({
            "id": "wamid.3", "from": "628123", "timestamp": "1700000000", "type": "image"
        }));
        assert_eq!(extract_message_text(&image), None);
    }

    #[test]
    fn test_verify_subscription() {
        let query = WebhookVerifyQuery {
            mode: Some("subscribe".into()),
            verify_token: Some("s3cret".into()),
            challenge: Some("1158201444".into()),
        };
        assert_eq!(verify_subscription(&query, Some("s3cret")), Ok("1158201444".into()));
        assert_eq!(
            verify_subscription(&query, Some("other")),
            Err("Invalid verify token")
        );
        assert_eq!(verify_subscription(&query, None), Err("Invalid verify token"));

        let bad_mode = WebhookVerifyQuery {
            mode: Some("unsubscribe".into()),
            ..query
        };
        assert_eq!(verify_subscription(&bad_mode, Some("s3cret")), Err("Invalid mode"));
    }

    #[test]
    fn test_webhook_payload_parses() {
        let payload: WhatsAppWebhook = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"phone_number_id": "999"},
                        "contacts": [{"wa_id": "628123", "profile": {"name": "Budi"}}],
                        "messages": [{"id": "wamid.1", "from": "628123", "timestamp": "1", "type": "text", "text": {"body": "hi"}}]
                    }
                }]
            }]
        }))
        .unwrap();
        let value = &payload.entry[0].changes[0].value;
        assert_eq!(value.contacts[0].profile.name, "Budi");
        assert_eq!(value.messages.len(), 1);
        assert!(value.statuses.is_empty());
    }
}
