use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::types::*;
use crate::activities::{record_activity, ActivityType};
use crate::core::shared::error::CrmResult;
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{Path, Query, ValidatedJson};

pub fn configure_contact_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/contacts",
            get(list_contacts_handler).post(create_contact_handler),
        )
        .route(
            "/api/contacts/:id",
            get(get_contact_handler)
                .patch(update_contact_handler)
                .delete(delete_contact_handler),
        )
}

pub async fn list_contacts_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContactListQuery>,
) -> CrmResult<Json<Vec<ContactResponse>>> {
    let contacts = state.store.list_contacts(&query.into()).await?;
    Ok(Json(contacts.into_iter().map(ContactResponse::from).collect()))
}

pub async fn create_contact_handler(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateContactRequest>,
) -> CrmResult<(StatusCode, Json<ContactResponse>)> {
    let contact = Contact::from_request(request, Utc::now());
    let contact = state.store.create_contact(contact).await?;
    info!("Created contact {} ({})", contact.id, contact.full_name());

    record_activity(
        state.store.as_ref(),
        contact.id,
        ActivityType::Created,
        "Contact created",
        contact.source.as_ref().map(|s| format!("Source: {s}")),
    )
    .await;

    Ok((StatusCode::CREATED, Json(contact.into())))
}

pub async fn get_contact_handler(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> CrmResult<Json<ContactResponse>> {
    let contact = state.store.get_contact(contact_id).await?;
    Ok(Json(contact.into()))
}

pub async fn update_contact_handler(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateContactRequest>,
) -> CrmResult<Json<ContactResponse>> {
    let mut contact = state.store.get_contact(contact_id).await?;
    contact.apply(request, Utc::now());
    let contact = state.store.update_contact(contact).await?;
    Ok(Json(contact.into()))
}

pub async fn delete_contact_handler(
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> CrmResult<StatusCode> {
    state.store.delete_contact(contact_id).await?;
    info!("Deleted contact {contact_id}");
    Ok(StatusCode::NO_CONTENT)
}
