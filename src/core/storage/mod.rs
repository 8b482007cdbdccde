//! Persistence seam. Handlers only see `dyn CrmStore`; `PgStore` backs the
//! server and `MemoryStore` backs tests and `CRM_STORAGE=memory` runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::activities::Activity;
use crate::auth::{Session, User};
use crate::contacts::{Contact, ContactFilter};
use crate::deals::{Deal, DealFilters};
use crate::invitations::Invitation;
use crate::tasks::{Task, TaskFilters};
use crate::templates::{EmailTemplate, WhatsAppTemplate};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CrmStore: Send + Sync {
    // Contacts, newest first.
    async fn list_contacts(&self, filter: &ContactFilter) -> StoreResult<Vec<Contact>>;
    async fn get_contact(&self, id: Uuid) -> StoreResult<Contact>;
    async fn create_contact(&self, contact: Contact) -> StoreResult<Contact>;
    async fn update_contact(&self, contact: Contact) -> StoreResult<Contact>;
    /// Writes only `lead_score` and `updated_at`, leaving concurrent edits intact.
    async fn set_lead_score(&self, id: Uuid, score: i32, at: DateTime<Utc>)
        -> StoreResult<Contact>;
    /// Writes only `last_contact_date` and `updated_at`.
    async fn touch_last_contact(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
    /// Removes the contact with its activities and deals; its tasks are detached.
    async fn delete_contact(&self, id: Uuid) -> StoreResult<()>;

    // Activities, newest first.
    async fn list_activities(&self, contact_id: Option<Uuid>) -> StoreResult<Vec<Activity>>;
    async fn create_activity(&self, activity: Activity) -> StoreResult<Activity>;

    // Tasks, by due date (undated last), then newest first.
    async fn list_tasks(&self, filters: &TaskFilters) -> StoreResult<Vec<Task>>;
    async fn get_task(&self, id: Uuid) -> StoreResult<Task>;
    async fn create_task(&self, task: Task) -> StoreResult<Task>;
    async fn update_task(&self, task: Task) -> StoreResult<Task>;
    async fn delete_task(&self, id: Uuid) -> StoreResult<()>;

    // Deals, newest first.
    async fn list_deals(&self, filters: &DealFilters) -> StoreResult<Vec<Deal>>;
    async fn get_deal(&self, id: Uuid) -> StoreResult<Deal>;
    async fn create_deal(&self, deal: Deal) -> StoreResult<Deal>;
    async fn update_deal(&self, deal: Deal) -> StoreResult<Deal>;
    async fn delete_deal(&self, id: Uuid) -> StoreResult<()>;

    // Templates, by name.
    async fn list_email_templates(&self) -> StoreResult<Vec<EmailTemplate>>;
    async fn get_email_template(&self, id: Uuid) -> StoreResult<EmailTemplate>;
    async fn create_email_template(&self, template: EmailTemplate) -> StoreResult<EmailTemplate>;
    async fn update_email_template(&self, template: EmailTemplate) -> StoreResult<EmailTemplate>;
    async fn delete_email_template(&self, id: Uuid) -> StoreResult<()>;

    async fn list_whatsapp_templates(&self) -> StoreResult<Vec<WhatsAppTemplate>>;
    async fn get_whatsapp_template(&self, id: Uuid) -> StoreResult<WhatsAppTemplate>;
    async fn create_whatsapp_template(
        &self,
        template: WhatsAppTemplate,
    ) -> StoreResult<WhatsAppTemplate>;
    async fn update_whatsapp_template(
        &self,
        template: WhatsAppTemplate,
    ) -> StoreResult<WhatsAppTemplate>;
    async fn delete_whatsapp_template(&self, id: Uuid) -> StoreResult<()>;

    // Users and sessions.
    async fn count_users(&self) -> StoreResult<i64>;
    async fn get_user(&self, id: Uuid) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn create_session(&self, session: Session) -> StoreResult<Session>;
    async fn find_session(&self, token_hash: &str) -> StoreResult<Session>;
    async fn delete_session(&self, token_hash: &str) -> StoreResult<()>;

    // Invitations, newest first.
    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>>;
    async fn get_invitation(&self, id: Uuid) -> StoreResult<Invitation>;
    async fn find_invitation_by_token(&self, token: &str) -> StoreResult<Invitation>;
    async fn create_invitation(&self, invitation: Invitation) -> StoreResult<Invitation>;
    async fn update_invitation(&self, invitation: Invitation) -> StoreResult<Invitation>;
}
