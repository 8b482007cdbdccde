use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::shared::error::{CrmError, CrmResult};
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{clean_optional, Path, Query, ValidatedJson};
use crate::core::storage::CrmStore;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;
pub const MAX_ACTIVITY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub contact_id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        contact_id: Uuid,
        activity_type: ActivityType,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contact_id,
            activity_type,
            title: title.into(),
            description,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Call,
    Email,
    Meeting,
    Note,
    Whatsapp,
    Task,
    Deal,
    Created,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Email => "email",
            Self::Meeting => "meeting",
            Self::Note => "note",
            Self::Whatsapp => "whatsapp",
            Self::Task => "task",
            Self::Deal => "deal",
            Self::Created => "created",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "email" => Ok(Self::Email),
            "meeting" => Ok(Self::Meeting),
            "note" => Ok(Self::Note),
            "whatsapp" => Ok(Self::Whatsapp),
            "task" => Ok(Self::Task),
            "deal" => Ok(Self::Deal),
            "created" => Ok(Self::Created),
            other => Err(format!("unknown activity type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[validate(required(message = "is required"))]
    pub contact_id: Option<Uuid>,
    #[serde(rename = "type")]
    #[validate(required(message = "is required"))]
    pub activity_type: Option<ActivityType>,
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 200, message = "must be between 1 and 200 characters")
    )]
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityListQuery {
    pub contact_id: Option<Uuid>,
    pub limit: Option<usize>,
}

pub fn configure_activity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/activities",
            get(handle_list_activities).post(handle_create_activity),
        )
        .route("/api/contacts/:id/activities", get(handle_contact_activities))
}

pub async fn handle_list_activities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActivityListQuery>,
) -> CrmResult<Json<Vec<Activity>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let mut activities = state.store.list_activities(query.contact_id).await?;
    activities.truncate(limit);
    Ok(Json(activities))
}

pub async fn handle_contact_activities(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> CrmResult<Json<Vec<Activity>>> {
    state.store.get_contact(contact_id).await?;
    let activities = state.store.list_activities(Some(contact_id)).await?;
    Ok(Json(activities))
}

pub async fn handle_create_activity(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateActivityRequest>,
) -> CrmResult<(StatusCode, Json<Activity>)> {
    let contact_id = req.contact_id.unwrap_or_default();
    ensure_contact_exists(state.store.as_ref(), contact_id).await?;

    let activity = Activity::new(
        contact_id,
        req.activity_type.unwrap_or(ActivityType::Note),
        req.title.unwrap_or_default().trim(),
        clean_optional(req.description),
    );
    let activity = state.store.create_activity(activity).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// Maps a missing contact to a field error on `contactId`.
pub async fn ensure_contact_exists(store: &dyn CrmStore, contact_id: Uuid) -> CrmResult<()> {
    match store.get_contact(contact_id).await {
        Ok(_) => Ok(()),
        Err(crate::core::storage::StoreError::NotFound(_)) => {
            Err(CrmError::invalid("contactId", "contact does not exist"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Records a side-effect activity. Failures are logged, never surfaced.
pub async fn record_activity(
    store: &dyn CrmStore,
    contact_id: Uuid,
    activity_type: ActivityType,
    title: impl Into<String>,
    description: Option<String>,
) {
    let activity = Activity::new(contact_id, activity_type, title, description);
    if let Err(e) = store.create_activity(activity).await {
        warn!("Failed to record {activity_type} activity for contact {contact_id}: {e}");
    }
}
