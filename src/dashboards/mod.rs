pub mod stats;
pub mod types;

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::contacts::ContactFilter;
use crate::core::shared::error::CrmResult;
use crate::core::shared::state::AppState;
use crate::deals::DealFilters;
use crate::tasks::TaskFilters;

pub use stats::compute_dashboard_stats;
pub use types::*;

pub fn configure_dashboards_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/dashboard/stats", get(handle_dashboard_stats))
}

/// Recomputed on every request from current rows.
pub async fn handle_dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> CrmResult<Json<DashboardStats>> {
    let contact_filter = ContactFilter::default();
    let deal_filters = DealFilters::default();
    let task_filters = TaskFilters::default();
    let (contacts, activities, deals, tasks) = tokio::try_join!(
        state.store.list_contacts(&contact_filter),
        state.store.list_activities(None),
        state.store.list_deals(&deal_filters),
        state.store.list_tasks(&task_filters),
    )?;

    Ok(Json(compute_dashboard_stats(
        &contacts,
        &activities,
        &deals,
        &tasks,
    )))
}
