use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::contacts::lead_tier::LeadTier;
use crate::core::shared::validation::{clean_optional, not_blank};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub lead_score: i32,
    pub lead_status: LeadStatus,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn tier(&self) -> LeadTier {
        LeadTier::from_score(self.lead_score)
    }

    /// Builds a new contact from an already validated request.
    pub fn from_request(request: CreateContactRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: request.first_name.unwrap_or_default().trim().to_string(),
            last_name: request.last_name.unwrap_or_default().trim().to_string(),
            email: request
                .email
                .unwrap_or_default()
                .trim()
                .to_lowercase(),
            phone: clean_optional(request.phone),
            company: clean_optional(request.company),
            position: clean_optional(request.position),
            lead_score: request.lead_score.unwrap_or(0),
            lead_status: request.lead_status.unwrap_or_default(),
            source: clean_optional(request.source),
            tags: normalize_tags(request.tags),
            notes: clean_optional(request.notes),
            last_contact_date: request.last_contact_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update. Empty strings clear optional fields.
    pub fn apply(&mut self, update: UpdateContactRequest, now: DateTime<Utc>) {
        if let Some(first_name) = update.first_name {
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_lowercase();
        }
        if update.phone.is_some() {
            self.phone = clean_optional(update.phone);
        }
        if update.company.is_some() {
            self.company = clean_optional(update.company);
        }
        if update.position.is_some() {
            self.position = clean_optional(update.position);
        }
        if let Some(score) = update.lead_score {
            self.lead_score = score;
        }
        if let Some(status) = update.lead_status {
            self.lead_status = status;
        }
        if update.source.is_some() {
            self.source = clean_optional(update.source);
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if update.notes.is_some() {
            self.notes = clean_optional(update.notes);
        }
        if update.last_contact_date.is_some() {
            self.last_contact_date = update.last_contact_date;
        }
        self.updated_at = now;
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [
            Some(self.first_name.as_str()),
            Some(self.last_name.as_str()),
            Some(self.email.as_str()),
            self.company.as_deref(),
            self.phone.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Hot,
    Warm,
    Cold,
    Customer,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
            Self::Customer => "customer",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "hot" => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            "customer" => Ok(Self::Customer),
            other => Err(format!("unknown lead status '{other}'")),
        }
    }
}

/// Contact as returned over HTTP, with its derived tier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    #[serde(flatten)]
    pub contact: Contact,
    pub tier: LeadTier,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        let tier = contact.tier();
        Self { contact, tier }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom = "not_blank"
    )]
    pub first_name: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom = "not_blank"
    )]
    pub last_name: Option<String>,
    #[validate(
        required(message = "is required"),
        email(message = "must be a valid email address")
    )]
    pub email: Option<String>,
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub company: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub position: Option<String>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub lead_score: Option<i32>,
    pub lead_status: Option<LeadStatus>,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub last_contact_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom = "not_blank"
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom = "not_blank"
    )]
    pub last_name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub company: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub position: Option<String>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub lead_score: Option<i32>,
    pub lead_status: Option<LeadStatus>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub last_contact_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListQuery {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub search: Option<String>,
    pub status: Option<LeadStatus>,
    pub tag: Option<String>,
}

impl From<ContactListQuery> for ContactFilter {
    fn from(query: ContactListQuery) -> Self {
        Self {
            search: clean_optional(query.search),
            status: query.status,
            tag: clean_optional(query.tag),
        }
    }
}

impl ContactFilter {
    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(ref term) = self.search {
            if !contact.matches_search(term) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if contact.lead_status != status {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !contact.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}
