pub mod render;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::shared::error::CrmResult;
use crate::core::shared::state::AppState;
use crate::core::shared::validation::{clean_optional, Path, ValidatedJson};

use self::render::{merged_variables, placeholders, render};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppTemplate {
    pub id: Uuid,
    pub name: String,
    pub body: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmailTemplateRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 100, message = "must be between 1 and 100 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 200, message = "must be between 1 and 200 characters")
    )]
    pub subject: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub body: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub body: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWhatsAppTemplateRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 100, message = "must be between 1 and 100 characters")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 4096, message = "must be between 1 and 4096 characters")
    )]
    pub body: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWhatsAppTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 4096, message = "must be between 1 and 4096 characters"))]
    pub body: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenderTemplateRequest {
    pub contact_id: Option<Uuid>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    pub placeholders: Vec<String>,
}

impl EmailTemplate {
    pub fn from_request(req: CreateEmailTemplateRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: req.name.unwrap_or_default().trim().to_string(),
            subject: req.subject.unwrap_or_default(),
            body: req.body.unwrap_or_default(),
            category: clean_optional(req.category),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: UpdateEmailTemplateRequest, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        if update.category.is_some() {
            self.category = clean_optional(update.category);
        }
        self.updated_at = now;
    }

    pub fn render(&self, vars: &HashMap<String, String>) -> RenderedTemplate {
        let mut names = placeholders(&self.subject);
        for name in placeholders(&self.body) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        RenderedTemplate {
            subject: Some(render(&self.subject, vars)),
            body: render(&self.body, vars),
            placeholders: names,
        }
    }
}

impl WhatsAppTemplate {
    pub fn from_request(req: CreateWhatsAppTemplateRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: req.name.unwrap_or_default().trim().to_string(),
            body: req.body.unwrap_or_default(),
            category: clean_optional(req.category),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: UpdateWhatsAppTemplateRequest, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(body) = update.body {
            self.body = body;
        }
        if update.category.is_some() {
            self.category = clean_optional(update.category);
        }
        self.updated_at = now;
    }

    pub fn render(&self, vars: &HashMap<String, String>) -> RenderedTemplate {
        RenderedTemplate {
            subject: None,
            body: render(&self.body, vars),
            placeholders: placeholders(&self.body),
        }
    }
}

pub fn configure_template_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/email-templates",
            get(handle_list_email_templates).post(handle_create_email_template),
        )
        .route(
            "/api/email-templates/:id",
            get(handle_get_email_template)
                .patch(handle_update_email_template)
                .delete(handle_delete_email_template),
        )
        .route(
            "/api/email-templates/:id/render",
            post(handle_render_email_template),
        )
        .route(
            "/api/whatsapp-templates",
            get(handle_list_whatsapp_templates).post(handle_create_whatsapp_template),
        )
        .route(
            "/api/whatsapp-templates/:id",
            get(handle_get_whatsapp_template)
                .patch(handle_update_whatsapp_template)
                .delete(handle_delete_whatsapp_template),
        )
        .route(
            "/api/whatsapp-templates/:id/render",
            post(handle_render_whatsapp_template),
        )
}

async fn render_variables(
    state: &AppState,
    req: RenderTemplateRequest,
) -> CrmResult<HashMap<String, String>> {
    let contact = match req.contact_id {
        Some(id) => Some(state.store.get_contact(id).await?),
        None => None,
    };
    Ok(merged_variables(contact.as_ref(), req.variables))
}

pub async fn handle_list_email_templates(
    State(state): State<Arc<AppState>>,
) -> CrmResult<Json<Vec<EmailTemplate>>> {
    Ok(Json(state.store.list_email_templates().await?))
}

pub async fn handle_get_email_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<Json<EmailTemplate>> {
    Ok(Json(state.store.get_email_template(id).await?))
}

pub async fn handle_create_email_template(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateEmailTemplateRequest>,
) -> CrmResult<(StatusCode, Json<EmailTemplate>)> {
    let template = state
        .store
        .create_email_template(EmailTemplate::from_request(req, Utc::now()))
        .await?;
    info!("Created email template {} ({})", template.id, template.name);
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn handle_update_email_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateEmailTemplateRequest>,
) -> CrmResult<Json<EmailTemplate>> {
    let mut template = state.store.get_email_template(id).await?;
    template.apply(req, Utc::now());
    Ok(Json(state.store.update_email_template(template).await?))
}

pub async fn handle_delete_email_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<StatusCode> {
    state.store.delete_email_template(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_render_email_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RenderTemplateRequest>,
) -> CrmResult<Json<RenderedTemplate>> {
    let template = state.store.get_email_template(id).await?;
    let vars = render_variables(&state, req).await?;
    Ok(Json(template.render(&vars)))
}

pub async fn handle_list_whatsapp_templates(
    State(state): State<Arc<AppState>>,
) -> CrmResult<Json<Vec<WhatsAppTemplate>>> {
    Ok(Json(state.store.list_whatsapp_templates().await?))
}

pub async fn handle_get_whatsapp_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<Json<WhatsAppTemplate>> {
    Ok(Json(state.store.get_whatsapp_template(id).await?))
}

pub async fn handle_create_whatsapp_template(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateWhatsAppTemplateRequest>,
) -> CrmResult<(StatusCode, Json<WhatsAppTemplate>)> {
    let template = state
        .store
        .create_whatsapp_template(WhatsAppTemplate::from_request(req, Utc::now()))
        .await?;
    info!("Created WhatsApp template {} ({})", template.id, template.name);
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn handle_update_whatsapp_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateWhatsAppTemplateRequest>,
) -> CrmResult<Json<WhatsAppTemplate>> {
    let mut template = state.store.get_whatsapp_template(id).await?;
    template.apply(req, Utc::now());
    Ok(Json(state.store.update_whatsapp_template(template).await?))
}

pub async fn handle_delete_whatsapp_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> CrmResult<StatusCode> {
    state.store.delete_whatsapp_template(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_render_whatsapp_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RenderTemplateRequest>,
) -> CrmResult<Json<RenderedTemplate>> {
    let template = state.store.get_whatsapp_template(id).await?;
    let vars = render_variables(&state, req).await?;
    Ok(Json(template.render(&vars)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_template_render_collects_placeholders() {
        let template = EmailTemplate::from_request(
            CreateEmailTemplateRequest {
                name: Some(" Welcome ".into()),
                subject: Some("Welcome, {{firstName}}".into()),
                body: Some("Dear {{fullName}}, thanks from {{senderName}}.".into()),
                category: Some("onboarding".into()),
            },
            Utc::now(),
        );
        assert_eq!(template.name, "Welcome");

        let mut vars = HashMap::new();
        vars.insert("firstName".to_string(), "Budi".to_string());
        let rendered = template.render(&vars);
        assert_eq!(rendered.subject.as_deref(), Some("Welcome, Budi"));
        assert_eq!(rendered.body, "Dear {{fullName}}, thanks from {{senderName}}.");
        assert_eq!(
            rendered.placeholders,
            vec!["firstName", "fullName", "senderName"]
        );
    }

    #[test]
    fn test_update_clears_category() {
        let mut template = WhatsAppTemplate::from_request(
            CreateWhatsAppTemplateRequest {
                name: Some("Promo".into()),
                body: Some("Halo {{firstName}}".into()),
                category: Some("marketing".into()),
            },
            Utc::now(),
        );
        template.apply(
            UpdateWhatsAppTemplateRequest {
                category: Some(String::new()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(template.category.is_none());
        assert_eq!(template.body, "Halo {{firstName}}");
    }

    #[test]
    fn test_create_requires_body() {
        let req = CreateEmailTemplateRequest {
            name: Some("x".into()),
            subject: Some("y".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
