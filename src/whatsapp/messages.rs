use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::contacts::Contact;
use crate::templates::render::{merged_variables, render};
use crate::templates::WhatsAppTemplate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// Upper bound for money fields; keeps rounding well inside `i64`.
pub const MAX_AMOUNT: f64 = 1e15;

/// What to send. Tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MessageContent {
    OrderConfirmation {
        order_id: String,
        #[serde(default)]
        items: Vec<OrderItem>,
        total: f64,
    },
    PaymentReminder {
        invoice_id: String,
        amount: f64,
        due_date: NaiveDate,
    },
    FollowUp {
        #[serde(default)]
        topic: Option<String>,
    },
    Promotion {
        title: String,
        description: String,
        #[serde(default)]
        promo_code: Option<String>,
        #[serde(default)]
        valid_until: Option<NaiveDate>,
    },
    Template {
        template_id: Uuid,
        #[serde(default)]
        variables: HashMap<String, String>,
    },
    Text {
        body: String,
    },
}

impl MessageContent {
    pub fn template_id(&self) -> Option<Uuid> {
        match self {
            Self::Template { template_id, .. } => Some(*template_id),
            _ => None,
        }
    }

    /// Path of the first money field that is negative, non-finite or above
    /// [`MAX_AMOUNT`].
    pub fn invalid_amount(&self) -> Option<&'static str> {
        let valid = |v: f64| v.is_finite() && (0.0..=MAX_AMOUNT).contains(&v);
        match self {
            Self::OrderConfirmation { total, .. } if !valid(*total) => Some("content.total"),
            Self::OrderConfirmation { items, .. } if items.iter().any(|i| !valid(i.price)) => {
                Some("content.items.price")
            }
            Self::PaymentReminder { amount, .. } if !valid(*amount) => Some("content.amount"),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderConfirmation { .. } => "order_confirmation",
            Self::PaymentReminder { .. } => "payment_reminder",
            Self::FollowUp { .. } => "follow_up",
            Self::Promotion { .. } => "promotion",
            Self::Template { .. } => "template",
            Self::Text { .. } => "text",
        }
    }

    /// Builds the text body for one contact. `template` must be the loaded
    /// template when the content is `Template`; `None` is returned otherwise.
    pub fn compose(
        &self,
        contact: &Contact,
        business_name: &str,
        template: Option<&WhatsAppTemplate>,
    ) -> Option<String> {
        let name = &contact.first_name;
        let body = match self {
            Self::OrderConfirmation {
                order_id,
                items,
                total,
            } => {
                let mut lines = vec![
                    format!("Hi {name}, thank you for your order!"),
                    String::new(),
                    format!("Order ID: {order_id}"),
                ];
                for item in items {
                    lines.push(format!(
                        "- {} x{} @ {}",
                        item.name,
                        item.quantity,
                        format_amount(item.price)
                    ));
                }
                lines.push(format!("Total: {}", format_amount(*total)));
                lines.push(String::new());
                lines.push(format!("We will process it right away. - {business_name}"));
                lines.join("\n")
            }
            Self::PaymentReminder {
                invoice_id,
                amount,
                due_date,
            } => format!(
                "Hi {name}, this is a friendly reminder that invoice {invoice_id} for {} is due on {}.\n\nPlease ignore this message if you have already paid. - {business_name}",
                format_amount(*amount),
                due_date.format("%d %b %Y"),
            ),
            Self::FollowUp { topic } => match topic {
                Some(topic) => format!(
                    "Hi {name}, just following up on {topic}. Let us know if you have any questions! - {business_name}"
                ),
                None => format!(
                    "Hi {name}, just checking in. Is there anything we can help you with? - {business_name}"
                ),
            },
            Self::Promotion {
                title,
                description,
                promo_code,
                valid_until,
            } => {
                let mut text = format!("Hi {name}! {title}\n\n{description}");
                if let Some(code) = promo_code {
                    text.push_str(&format!("\n\nUse code: {code}"));
                }
                if let Some(until) = valid_until {
                    text.push_str(&format!("\nValid until {}", until.format("%d %b %Y")));
                }
                text.push_str(&format!("\n\n- {business_name}"));
                text
            }
            Self::Template { variables, .. } => {
                let template = template?;
                render(
                    &template.body,
                    &merged_variables(Some(contact), variables.clone()),
                )
            }
            Self::Text { body } => body.clone(),
        };
        Some(body)
    }
}

/// Rupiah with `.` thousands separators, no decimals.
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let sign = if rounded < 0 { "-" } else { "" };
    format!(
        "{sign}Rp {}",
        rounded.unsigned_abs().to_formatted_string(&Locale::id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::CreateContactRequest;
    use chrono::Utc;

    fn contact() -> Contact {
        Contact::from_request(
            CreateContactRequest {
                first_name: Some("Budi".into()),
                last_name: Some("Santoso".into()),
                email: Some("budi@example.com".into()),
                phone: Some("08123456789".into()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_250_000.0), "Rp 1.250.000");
        assert_eq!(format_amount(999.4), "Rp 999");
        assert_eq!(format_amount(0.0), "Rp 0");
        assert_eq!(format_amount(-1500.0), "-Rp 1.500");
        assert!(format_amount(-1e30).starts_with("-Rp "));
    }

    #[test]
    fn test_invalid_amounts_are_flagged() {
        let order = |total: f64, price: f64| MessageContent::OrderConfirmation {
            order_id: "A-1".into(),
            items: vec![OrderItem {
                name: "Teh".into(),
                quantity: 1,
                price,
            }],
            total,
        };
        assert_eq!(order(-1e30, 1.0).invalid_amount(), Some("content.total"));
        assert_eq!(order(f64::NAN, 1.0).invalid_amount(), Some("content.total"));
        assert_eq!(order(10.0, -5.0).invalid_amount(), Some("content.items.price"));
        assert_eq!(order(10.0, 10.0).invalid_amount(), None);

        let reminder = MessageContent::PaymentReminder {
            invoice_id: "INV-1".into(),
            amount: f64::INFINITY,
            due_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        };
        assert_eq!(reminder.invalid_amount(), Some("content.amount"));
        assert_eq!(MessageContent::FollowUp { topic: None }.invalid_amount(), None);
    }

    #[test]
    fn test_order_confirmation_lists_items() {
        let content = MessageContent::OrderConfirmation {
            order_id: "INV-001".into(),
            items: vec![OrderItem {
                name: "Kopi Gayo".into(),
                quantity: 2,
                price: 85_000.0,
            }],
            total: 170_000.0,
        };
        let body = content.compose(&contact(), "Toko Maju", None).unwrap();
        assert!(body.starts_with("Hi Budi"));
        assert!(body.contains("Order ID: INV-001"));
        assert!(body.contains("- Kopi Gayo x2 @ Rp 85.000"));
        assert!(body.contains("Total: Rp 170.000"));
        assert!(body.ends_with("Toko Maju"));
    }

    #[test]
    fn test_payment_reminder() {
        let content = MessageContent::PaymentReminder {
            invoice_id: "INV-7".into(),
            amount: 2_500_000.0,
            due_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        };
        let body = content.compose(&contact(), "Toko Maju", None).unwrap();
        assert!(body.contains("invoice INV-7 for Rp 2.500.000 is due on 01 Jul 2024"));
    }

    #[test]
    fn test_template_needs_loaded_template() {
        let content = MessageContent::Template {
            template_id: Uuid::new_v4(),
            variables: HashMap::from([("orderId".to_string(), "A-1".to_string())]),
        };
        assert_eq!(content.compose(&contact(), "Toko Maju", None), None);

        let now = Utc::now();
        let template = WhatsAppTemplate {
            id: Uuid::new_v4(),
            name: "shipping".into(),
            body: "Hi {{firstName}}, order {{orderId}} shipped. {{tracking}}".into(),
            category: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            content
                .compose(&contact(), "Toko Maju", Some(&template))
                .as_deref(),
            Some("Hi Budi, order A-1 shipped. {{tracking}}")
        );
    }

    #[test]
    fn test_deserialize_tagged_kind() {
        let content: MessageContent = serde_json::from_value(serde_json::json!({
            "kind": "promotion",
            "title": "Flash sale",
            "description": "20% off all items",
            "promoCode": "FLASH20"
        }))
        .unwrap();
        assert_eq!(content.kind(), "promotion");
        let body = content.compose(&contact(), "Toko Maju", None).unwrap();
        assert!(body.contains("Use code: FLASH20"));
        assert!(!body.contains("Valid until"));
    }
}
