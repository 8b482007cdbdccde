use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::shared::validation::clean_optional;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    pub contact_id: Uuid,
    pub value: f64,
    pub stage: DealStage,
    pub probability: i32,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    pub fn from_request(req: CreateDealRequest, now: DateTime<Utc>) -> Self {
        let stage = req.stage.unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            title: req.title.unwrap_or_default().trim().to_string(),
            contact_id: req.contact_id.unwrap_or_default(),
            value: req.value.unwrap_or(0.0),
            stage,
            probability: req
                .probability
                .unwrap_or_else(|| stage.default_probability()),
            expected_close_date: req.expected_close_date,
            actual_close_date: stage.is_closed().then(|| now.date_naive()),
            notes: clean_optional(req.notes),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: UpdateDealRequest, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title.trim().to_string();
        }
        if let Some(contact_id) = update.contact_id {
            self.contact_id = contact_id;
        }
        if let Some(value) = update.value {
            self.value = value;
        }
        if update.expected_close_date.is_some() {
            self.expected_close_date = update.expected_close_date;
        }
        if update.notes.is_some() {
            self.notes = clean_optional(update.notes);
        }
        if let Some(stage) = update.stage {
            self.move_to(stage, update.probability, now);
        } else if let Some(probability) = update.probability {
            self.probability = probability;
        }
        self.updated_at = now;
    }

    /// Moves the deal to `stage`. Probability falls back to the stage default;
    /// closing stamps the close date and reopening clears it.
    pub fn move_to(&mut self, stage: DealStage, probability: Option<i32>, now: DateTime<Utc>) {
        if stage != self.stage || probability.is_some() {
            self.probability = probability.unwrap_or_else(|| stage.default_probability());
        }
        if stage.is_closed() {
            if !self.stage.is_closed() || self.actual_close_date.is_none() {
                self.actual_close_date = Some(now.date_naive());
            }
        } else {
            self.actual_close_date = None;
        }
        self.stage = stage;
        self.updated_at = now;
    }

    /// Value weighted by win probability.
    pub fn weighted_value(&self) -> f64 {
        self.value * f64::from(self.probability) / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DealStage {
    #[default]
    Prospecting,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    /// Pipeline order.
    pub const ALL: [DealStage; 6] = [
        DealStage::Prospecting,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prospecting => "prospecting",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::ClosedWon => "closed-won",
            Self::ClosedLost => "closed-lost",
        }
    }

    pub fn default_probability(&self) -> i32 {
        match self {
            Self::Prospecting => 10,
            Self::Qualified => 25,
            Self::Proposal => 50,
            Self::Negotiation => 75,
            Self::ClosedWon => 100,
            Self::ClosedLost => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

impl std::fmt::Display for DealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DealStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown deal stage '{s}'"))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 200, message = "must be between 1 and 200 characters")
    )]
    pub title: Option<String>,
    #[validate(required(message = "is required"))]
    pub contact_id: Option<Uuid>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub value: Option<f64>,
    pub stage: Option<DealStage>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub title: Option<String>,
    pub contact_id: Option<Uuid>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub value: Option<f64>,
    pub stage: Option<DealStage>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoveStageRequest {
    #[validate(required(message = "is required"))]
    pub stage: Option<DealStage>,
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub probability: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealFilters {
    pub stage: Option<DealStage>,
    pub contact_id: Option<Uuid>,
}

impl DealFilters {
    pub fn for_contact(contact_id: Uuid) -> Self {
        Self {
            contact_id: Some(contact_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, deal: &Deal) -> bool {
        self.stage.map_or(true, |s| deal.stage == s)
            && self.contact_id.map_or(true, |c| deal.contact_id == c)
    }
}

/// One kanban column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineColumn {
    pub stage: DealStage,
    pub count: usize,
    pub total_value: f64,
    pub weighted_value: f64,
    pub deals: Vec<Deal>,
}

/// Groups deals into one column per stage, in pipeline order.
pub fn build_pipeline(deals: Vec<Deal>) -> Vec<PipelineColumn> {
    let mut columns: Vec<PipelineColumn> = DealStage::ALL
        .into_iter()
        .map(|stage| PipelineColumn {
            stage,
            count: 0,
            total_value: 0.0,
            weighted_value: 0.0,
            deals: Vec::new(),
        })
        .collect();

    for deal in deals {
        if let Some(column) = columns.iter_mut().find(|c| c.stage == deal.stage) {
            column.count += 1;
            column.total_value += deal.value;
            column.weighted_value += deal.weighted_value();
            column.deals.push(deal);
        }
    }
    columns
}
