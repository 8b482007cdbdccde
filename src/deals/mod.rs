//! Sales pipeline: deal CRUD, stage moves and the kanban board.

pub mod types;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
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

pub fn configure_deal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/deals", get(handle_list_deals).post(handle_create_deal))
        .route("/api/deals/pipeline", get(handle_pipeline))
        .route(
            "/api/deals/:id",
            get(handle_get_deal)
                .patch(handle_update_deal)
                .delete(handle_delete_deal),
        )
        .route("/api/deals/:id/stage", patch(handle_move_stage))
        .route("/api/contacts/:id/deals", get(handle_contact_deals))
}

pub async fn handle_list_deals(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<DealFilters>,
) -> CrmResult<Json<Vec<Deal>>> {
    Ok(Json(state.store.list_deals(&filters).await?))
}

pub async fn handle_contact_deals(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> CrmResult<Json<Vec<Deal>>> {
    state.store.get_contact(contact_id).await?;
    let deals = state
        .store
        .list_deals(&DealFilters::for_contact(contact_id))
        .await?;
    Ok(Json(deals))
}

pub async fn handle_pipeline(
    State(state): State<Arc<AppState>>,
) -> CrmResult<Json<Vec<PipelineColumn>>> {
    let deals = state.store.list_deals(&DealFilters::default()).await?;
    Ok(Json(build_pipeline(deals)))
}

pub async fn handle_get_deal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<Json<Deal>> {
    Ok(Json(state.store.get_deal(id).await?))
}

pub async fn handle_create_deal(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateDealRequest>,
) -> CrmResult<(StatusCode, Json<Deal>)> {
    ensure_contact_exists(state.store.as_ref(), req.contact_id.unwrap_or_default()).await?;

    let deal = state
        .store
        .create_deal(Deal::from_request(req, Utc::now()))
        .await?;
    info!(
        "Created deal {} ({}) at stage {}",
        deal.id, deal.title, deal.stage
    );

    record_activity(
        state.store.as_ref(),
        deal.contact_id,
        ActivityType::Deal,
        format!("Deal created: {}", deal.title),
        Some(format!("Stage: {}", deal.stage)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn handle_update_deal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateDealRequest>,
) -> CrmResult<Json<Deal>> {
    if let Some(contact_id) = req.contact_id {
        ensure_contact_exists(state.store.as_ref(), contact_id).await?;
    }

    let mut deal = state.store.get_deal(id).await?;
    let previous = deal.stage;
    deal.apply(req, Utc::now());
    let deal = state.store.update_deal(deal).await?;

    if deal.stage != previous {
        log_stage_change(&state, &deal, previous).await;
    }
    Ok(Json(deal))
}

pub async fn handle_move_stage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<MoveStageRequest>,
) -> CrmResult<Json<Deal>> {
    let mut deal = state.store.get_deal(id).await?;
    let previous = deal.stage;
    deal.move_to(req.stage.unwrap_or(previous), req.probability, Utc::now());
    let deal = state.store.update_deal(deal).await?;

    if deal.stage != previous {
        log_stage_change(&state, &deal, previous).await;
    }
    Ok(Json(deal))
}

pub async fn handle_delete_deal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<StatusCode> {
    state.store.delete_deal(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn log_stage_change(state: &AppState, deal: &Deal, previous: DealStage) {
    info!("Deal {} moved {} -> {}", deal.id, previous, deal.stage);
    record_activity(
        state.store.as_ref(),
        deal.contact_id,
        ActivityType::Deal,
        format!("Deal moved to {}: {}", deal.stage, deal.title),
        Some(format!("From {previous}")),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn deal(stage: DealStage, value: f64) -> Deal {
        Deal::from_request(
            CreateDealRequest {
                title: Some("Website redesign".into()),
                contact_id: Some(Uuid::new_v4()),
                value: Some(value),
                stage: Some(stage),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_stage_serializes_kebab_case() {
        let json = serde_json::to_value(DealStage::ClosedWon).unwrap();
        assert_eq!(json, "closed-won");
        assert_eq!("closed-lost".parse::<DealStage>(), Ok(DealStage::ClosedLost));
        assert!("won".parse::<DealStage>().is_err());
    }

    #[test]
    fn test_default_probability_follows_stage() {
        let d = deal(DealStage::Proposal, 1000.0);
        assert_eq!(d.probability, 50);
        assert!(d.actual_close_date.is_none());
    }

    #[test]
    fn test_closing_and_reopening() {
        let now = Utc::now();
        let mut d = deal(DealStage::Negotiation, 5000.0);

        d.move_to(DealStage::ClosedWon, None, now);
        assert_eq!(d.probability, 100);
        assert_eq!(d.actual_close_date, Some(now.date_naive()));

        d.move_to(DealStage::Proposal, None, now + Duration::days(2));
        assert_eq!(d.probability, 50);
        assert!(d.actual_close_date.is_none());
    }

    #[test]
    fn test_explicit_probability_wins() {
        let mut d = deal(DealStage::Prospecting, 100.0);
        d.move_to(DealStage::Qualified, Some(40), Utc::now());
        assert_eq!(d.probability, 40);
    }

    #[test]
    fn test_pipeline_has_every_stage_in_order() {
        let columns = build_pipeline(vec![
            deal(DealStage::ClosedWon, 2000.0),
            deal(DealStage::Prospecting, 500.0),
            deal(DealStage::Prospecting, 250.0),
        ]);
        let stages: Vec<DealStage> = columns.iter().map(|c| c.stage).collect();
        assert_eq!(stages, DealStage::ALL.to_vec());
        assert_eq!(columns[0].count, 2);
        assert_eq!(columns[0].total_value, 750.0);
        assert_eq!(columns[0].weighted_value, 75.0);
        assert_eq!(columns[4].total_value, 2000.0);
        assert_eq!(columns[2].count, 0);
    }

    #[test]
    fn test_negative_value_rejected() {
        use validator::Validate;
        let req = CreateDealRequest {
            title: Some("x".into()),
            contact_id: Some(Uuid::new_v4()),
            value: Some(-1.0),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
