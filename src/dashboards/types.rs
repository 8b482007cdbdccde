use serde::Serialize;

use crate::activities::Activity;
use crate::contacts::ContactResponse;
use crate::deals::DealStage;

pub const RECENT_ACTIVITY_LIMIT: usize = 10;
pub const TOP_LEADS_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_contacts: usize,
    pub active_leads: usize,
    pub total_revenue: f64,
    /// Closed-won deals per active lead, as a percentage with one decimal.
    pub conversion_rate: f64,
    pub pipeline_value: f64,
    pub lead_score_distribution: LeadScoreDistribution,
    pub deals_by_stage: Vec<StageCount>,
    pub recent_activities: Vec<Activity>,
    pub top_leads: Vec<ContactResponse>,
    pub pending_tasks: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeadScoreDistribution {
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    pub new: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCount {
    pub stage: DealStage,
    pub count: usize,
    pub value: f64,
}
