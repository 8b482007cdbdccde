pub mod types;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::activities::{ensure_contact_exists, record_activity, ActivityType};
use crate::core::shared::error::CrmResult;
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{Path, Query, ValidatedJson};

pub use types::*;

pub fn configure_task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tasks", get(handle_list_tasks).post(handle_create_task))
        .route(
            "/api/tasks/:id",
            get(handle_get_task)
                .patch(handle_update_task)
                .delete(handle_delete_task),
        )
        .route("/api/contacts/:id/tasks", get(handle_contact_tasks))
}

pub async fn handle_list_tasks(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<TaskFilters>,
) -> CrmResult<Json<Vec<Task>>> {
    let tasks = state.store.list_tasks(&filters).await?;
    Ok(Json(tasks))
}

pub async fn handle_contact_tasks(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> CrmResult<Json<Vec<Task>>> {
    state.store.get_contact(contact_id).await?;
    let tasks = state
        .store
        .list_tasks(&TaskFilters::for_contact(contact_id))
        .await?;
    Ok(Json(tasks))
}

pub async fn handle_get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<Json<Task>> {
    Ok(Json(state.store.get_task(id).await?))
}

pub async fn handle_create_task(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateTaskRequest>,
) -> CrmResult<(StatusCode, Json<Task>)> {
    if let Some(contact_id) = req.contact_id {
        ensure_contact_exists(state.store.as_ref(), contact_id).await?;
    }

    let task = Task::from_request(req, Utc::now());
    let task = state.store.create_task(task).await?;
    info!("Created task {} ({})", task.id, task.title);
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn handle_update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTaskRequest>,
) -> CrmResult<Json<Task>> {
    if let Some(contact_id) = req.contact_id {
        ensure_contact_exists(state.store.as_ref(), contact_id).await?;
    }

    let mut task = state.store.get_task(id).await?;
    let completed_now = task.apply(req, Utc::now());
    let task = state.store.update_task(task).await?;

    if completed_now {
        if let Some(contact_id) = task.contact_id {
            record_activity(
                state.store.as_ref(),
                contact_id,
                ActivityType::Task,
                format!("Task completed: {}", task.title),
                None,
            )
            .await;
        }
    }

    Ok(Json(task))
}

pub async fn handle_delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<StatusCode> {
    state.store.delete_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
