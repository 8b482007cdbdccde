//! Diesel-backed store. Every call checks out a pooled connection on the
//! blocking pool; the async side never touches the connection.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::error;
use std::str::FromStr;
use uuid::Uuid;

use super::{CrmStore, StoreError, StoreResult};
use crate::activities::Activity;
use crate::auth::{Session, User};
use crate::contacts::{Contact, ContactFilter};
use crate::core::shared::schema::{
    activities, contacts, deals, email_templates, invitations, sessions, tasks, users,
    whatsapp_templates,
};
use crate::core::shared::utils::DbPool;
use crate::deals::{Deal, DealFilters};
use crate::invitations::Invitation;
use crate::tasks::{Task, TaskFilters};
use crate::templates::{EmailTemplate, WhatsAppTemplate};

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound("Record".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::NotFound(format!("Referenced record ({})", info.message()))
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    T::from_str(value).map_err(StoreError::Internal)
}
/// Builds a substring `ILIKE` pattern, escaping wildcards with the default `\` escape.
/// Builds a substring `ILIKE` pattern, escaping wildcards with Postgres' default `\\`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn expect_one(affected: usize, entity: &str) -> StoreResult<()> {
    if affected == 0 {
        Err(StoreError::NotFound(entity.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = contacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct ContactRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    position: Option<String>,
    lead_score: i32,
    lead_status: String,
    source: Option<String>,
    tags: Vec<String>,
    notes: Option<String>,
    last_contact_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Contact> for ContactRow {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            company: c.company.clone(),
            position: c.position.clone(),
            lead_score: c.lead_score,
            lead_status: c.lead_status.to_string(),
            source: c.source.clone(),
            tags: c.tags.clone(),
            notes: c.notes.clone(),
            last_contact_date: c.last_contact_date,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl TryFrom<ContactRow> for Contact {
    type Error = StoreError;

    fn try_from(row: ContactRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            company: row.company,
            position: row.position,
            lead_score: row.lead_score,
            lead_status: parse_enum(&row.lead_status)?,
            source: row.source,
            tags: row.tags,
            notes: row.notes,
            last_contact_date: row.last_contact_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = activities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ActivityRow {
    id: Uuid,
    contact_id: Uuid,
    activity_type: String,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<&Activity> for ActivityRow {
    fn from(a: &Activity) -> Self {
        Self {
            id: a.id,
            contact_id: a.contact_id,
            activity_type: a.activity_type.to_string(),
            title: a.title.clone(),
            description: a.description.clone(),
            created_at: a.created_at,
        }
    }
}

impl TryFrom<ActivityRow> for Activity {
    type Error = StoreError;

    fn try_from(row: ActivityRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            contact_id: row.contact_id,
            activity_type: parse_enum(&row.activity_type)?,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    contact_id: Option<Uuid>,
    priority: String,
    status: String,
    assignee: Option<String>,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskRow {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id,
            title: t.title.clone(),
            description: t.description.clone(),
            contact_id: t.contact_id,
            priority: t.priority.to_string(),
            status: t.status.to_string(),
            assignee: t.assignee.clone(),
            due_date: t.due_date,
            completed_at: t.completed_at,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            contact_id: row.contact_id,
            priority: parse_enum(&row.priority)?,
            status: parse_enum(&row.status)?,
            assignee: row.assignee,
            due_date: row.due_date,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = deals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct DealRow {
    id: Uuid,
    title: String,
    contact_id: Uuid,
    value: f64,
    stage: String,
    probability: i32,
    expected_close_date: Option<NaiveDate>,
    actual_close_date: Option<NaiveDate>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Deal> for DealRow {
    fn from(d: &Deal) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
            contact_id: d.contact_id,
            value: d.value,
            stage: d.stage.to_string(),
            probability: d.probability,
            expected_close_date: d.expected_close_date,
            actual_close_date: d.actual_close_date,
            notes: d.notes.clone(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

impl TryFrom<DealRow> for Deal {
    type Error = StoreError;

    fn try_from(row: DealRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            contact_id: row.contact_id,
            value: row.value,
            stage: parse_enum(&row.stage)?,
            probability: row.probability,
            expected_close_date: row.expected_close_date,
            actual_close_date: row.actual_close_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = email_templates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct EmailTemplateRow {
    id: Uuid,
    name: String,
    subject: String,
    body: String,
    category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&EmailTemplate> for EmailTemplateRow {
    fn from(t: &EmailTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            subject: t.subject.clone(),
            body: t.body.clone(),
            category: t.category.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

impl From<EmailTemplateRow> for EmailTemplate {
    fn from(row: EmailTemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            subject: row.subject,
            body: row.body,
            category: row.category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = whatsapp_templates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct WhatsAppTemplateRow {
    id: Uuid,
    name: String,
    body: String,
    category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&WhatsAppTemplate> for WhatsAppTemplateRow {
    fn from(t: &WhatsAppTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            body: t.body.clone(),
            category: t.category.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

impl From<WhatsAppTemplateRow> for WhatsAppTemplate {
    fn from(row: WhatsAppTemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            body: row.body,
            category: row.category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role.to_string(),
            password_hash: u.password_hash.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            email: row.email,
            name: row.name,
            role: parse_enum(&row.role)?,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            token_hash: s.token_hash.clone(),
            expires_at: s.expires_at,
            created_at: s.created_at,
        }
    }
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = invitations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct InvitationRow {
    id: Uuid,
    email: String,
    role: String,
    token: String,
    status: String,
    invited_by: Option<Uuid>,
    message: Option<String>,
    expires_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Invitation> for InvitationRow {
    fn from(i: &Invitation) -> Self {
        Self {
            id: i.id,
            email: i.email.clone(),
            role: i.role.to_string(),
            token: i.token.clone(),
            status: i.status.to_string(),
            invited_by: i.invited_by,
            message: i.message.clone(),
            expires_at: i.expires_at,
            accepted_at: i.accepted_at,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            email: row.email,
            role: parse_enum(&row.role)?,
            token: row.token,
            status: parse_enum(&row.status)?,
            invited_by: row.invited_by,
            message: row.message,
            expires_at: row.expires_at,
            accepted_at: row.accepted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                error!("Failed to get database connection: {e}");
                StoreError::Connection(e.to_string())
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl CrmStore for PgStore {
    async fn list_contacts(&self, filter: &ContactFilter) -> StoreResult<Vec<Contact>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut query = contacts::table
                .select(ContactRow::as_select())
                .order(contacts::created_at.desc())
                .into_boxed();

            if let Some(term) = filter.search {
                let pattern = like_pattern(&term);
                query = query.filter(
                    contacts::first_name
                        .ilike(pattern.clone())
                        .or(contacts::last_name.ilike(pattern.clone()))
                        .or(contacts::email.ilike(pattern.clone()))
                        .or(contacts::company.ilike(pattern.clone()))
                        .or(contacts::phone.ilike(pattern)),
                );
            }
            if let Some(status) = filter.status {
                query = query.filter(contacts::lead_status.eq(status.to_string()));
            }
            if let Some(tag) = filter.tag {
                query = query.filter(contacts::tags.contains(vec![tag]));
            }

            convert_all(query.load::<ContactRow>(conn)?)
        })
        .await
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Contact> {
        self.run(move |conn| {
            contacts::table
                .find(id)
                .select(ContactRow::as_select())
                .first::<ContactRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("Contact".into()))?
                .try_into()
        })
        .await
    }

    async fn create_contact(&self, contact: Contact) -> StoreResult<Contact> {
        self.run(move |conn| {
            diesel::insert_into(contacts::table)
                .values(ContactRow::from(&contact))
                .execute(conn)?;
            Ok(contact)
        })
        .await
    }

    async fn update_contact(&self, contact: Contact) -> StoreResult<Contact> {
        self.run(move |conn| {
            let affected = diesel::update(contacts::table.find(contact.id))
                .set(&ContactRow::from(&contact))
                .execute(conn)?;
            expect_one(affected, "Contact")?;
            Ok(contact)
        })
        .await
    }

    async fn set_lead_score(
        &self,
        id: Uuid,
        score: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Contact> {
        self.run(move |conn| {
            diesel::update(contacts::table.find(id))
                .set((contacts::lead_score.eq(score), contacts::updated_at.eq(at)))
                .returning(ContactRow::as_returning())
                .get_result::<ContactRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("Contact".into()))?
                .try_into()
        })
        .await
    }

    async fn touch_last_contact(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.run(move |conn| {
            let affected = diesel::update(contacts::table.find(id))
                .set((
                    contacts::last_contact_date.eq(Some(at)),
                    contacts::updated_at.eq(at),
                ))
                .execute(conn)?;
            expect_one(affected, "Contact")
        })
        .await
    }

    async fn delete_contact(&self, id: Uuid) -> StoreResult<()> {
        // Activities and deals cascade, tasks are SET NULL (see migration).
        self.run(move |conn| {
            let affected = diesel::delete(contacts::table.find(id)).execute(conn)?;
            expect_one(affected, "Contact")
        })
        .await
    }

    async fn list_activities(&self, contact_id: Option<Uuid>) -> StoreResult<Vec<Activity>> {
        self.run(move |conn| {
            let mut query = activities::table
                .select(ActivityRow::as_select())
                .order(activities::created_at.desc())
                .into_boxed();
            if let Some(id) = contact_id {
                query = query.filter(activities::contact_id.eq(id));
            }
            convert_all(query.load::<ActivityRow>(conn)?)
        })
        .await
    }

    async fn create_activity(&self, activity: Activity) -> StoreResult<Activity> {
        self.run(move |conn| {
            diesel::insert_into(activities::table)
                .values(ActivityRow::from(&activity))
                .execute(conn)?;
            Ok(activity)
        })
        .await
    }

    async fn list_tasks(&self, filters: &TaskFilters) -> StoreResult<Vec<Task>> {
        let filters = filters.clone();
        self.run(move |conn| {
            let mut query = tasks::table
                .select(TaskRow::as_select())
                .order((tasks::due_date.asc().nulls_last(), tasks::created_at.desc()))
                .into_boxed();
            if let Some(status) = filters.status {
                query = query.filter(tasks::status.eq(status.to_string()));
            }
            if let Some(priority) = filters.priority {
                query = query.filter(tasks::priority.eq(priority.to_string()));
            }
            if let Some(contact_id) = filters.contact_id {
                query = query.filter(tasks::contact_id.eq(contact_id));
            }
            if let Some(assignee) = filters.assignee {
                query = query.filter(tasks::assignee.eq(assignee));
            }
            convert_all(query.load::<TaskRow>(conn)?)
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Task> {
        self.run(move |conn| {
            tasks::table
                .find(id)
                .select(TaskRow::as_select())
                .first::<TaskRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("Task".into()))?
                .try_into()
        })
        .await
    }

    async fn create_task(&self, task: Task) -> StoreResult<Task> {
        self.run(move |conn| {
            diesel::insert_into(tasks::table)
                .values(TaskRow::from(&task))
                .execute(conn)?;
            Ok(task)
        })
        .await
    }

    async fn update_task(&self, task: Task) -> StoreResult<Task> {
        self.run(move |conn| {
            let affected = diesel::update(tasks::table.find(task.id))
                .set(&TaskRow::from(&task))
                .execute(conn)?;
            expect_one(affected, "Task")?;
            Ok(task)
        })
        .await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let affected = diesel::delete(tasks::table.find(id)).execute(conn)?;
            expect_one(affected, "Task")
        })
        .await
    }

    async fn list_deals(&self, filters: &DealFilters) -> StoreResult<Vec<Deal>> {
        let filters = filters.clone();
        self.run(move |conn| {
            let mut query = deals::table
                .select(DealRow::as_select())
                .order(deals::created_at.desc())
                .into_boxed();
            if let Some(stage) = filters.stage {
                query = query.filter(deals::stage.eq(stage.to_string()));
            }
            if let Some(contact_id) = filters.contact_id {
                query = query.filter(deals::contact_id.eq(contact_id));
            }
            convert_all(query.load::<DealRow>(conn)?)
        })
        .await
    }

    async fn get_deal(&self, id: Uuid) -> StoreResult<Deal> {
        self.run(move |conn| {
            deals::table
                .find(id)
                .select(DealRow::as_select())
                .first::<DealRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("Deal".into()))?
                .try_into()
        })
        .await
    }

    async fn create_deal(&self, deal: Deal) -> StoreResult<Deal> {
        self.run(move |conn| {
            diesel::insert_into(deals::table)
                .values(DealRow::from(&deal))
                .execute(conn)?;
            Ok(deal)
        })
        .await
    }

    async fn update_deal(&self, deal: Deal) -> StoreResult<Deal> {
        self.run(move |conn| {
            let affected = diesel::update(deals::table.find(deal.id))
                .set(&DealRow::from(&deal))
                .execute(conn)?;
            expect_one(affected, "Deal")?;
            Ok(deal)
        })
        .await
    }

    async fn delete_deal(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let affected = diesel::delete(deals::table.find(id)).execute(conn)?;
            expect_one(affected, "Deal")
        })
        .await
    }

    async fn list_email_templates(&self) -> StoreResult<Vec<EmailTemplate>> {
        self.run(|conn| {
            let rows = email_templates::table
                .select(EmailTemplateRow::as_select())
                .order(email_templates::name.asc())
                .load::<EmailTemplateRow>(conn)?;
            Ok(rows.into_iter().map(EmailTemplate::from).collect())
        })
        .await
    }

    async fn get_email_template(&self, id: Uuid) -> StoreResult<EmailTemplate> {
        self.run(move |conn| {
            email_templates::table
                .find(id)
                .select(EmailTemplateRow::as_select())
                .first::<EmailTemplateRow>(conn)
                .optional()?
                .map(EmailTemplate::from)
                .ok_or_else(|| StoreError::NotFound("Email template".into()))
        })
        .await
    }

    async fn create_email_template(&self, template: EmailTemplate) -> StoreResult<EmailTemplate> {
        self.run(move |conn| {
            diesel::insert_into(email_templates::table)
                .values(EmailTemplateRow::from(&template))
                .execute(conn)?;
            Ok(template)
        })
        .await
    }

    async fn update_email_template(&self, template: EmailTemplate) -> StoreResult<EmailTemplate> {
        self.run(move |conn| {
            let affected = diesel::update(email_templates::table.find(template.id))
                .set(&EmailTemplateRow::from(&template))
                .execute(conn)?;
            expect_one(affected, "Email template")?;
            Ok(template)
        })
        .await
    }

    async fn delete_email_template(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let affected = diesel::delete(email_templates::table.find(id)).execute(conn)?;
            expect_one(affected, "Email template")
        })
        .await
    }

    async fn list_whatsapp_templates(&self) -> StoreResult<Vec<WhatsAppTemplate>> {
        self.run(|conn| {
            let rows = whatsapp_templates::table
                .select(WhatsAppTemplateRow::as_select())
                .order(whatsapp_templates::name.asc())
                .load::<WhatsAppTemplateRow>(conn)?;
            Ok(rows.into_iter().map(WhatsAppTemplate::from).collect())
        })
        .await
    }

    async fn get_whatsapp_template(&self, id: Uuid) -> StoreResult<WhatsAppTemplate> {
        self.run(move |conn| {
            whatsapp_templates::table
                .find(id)
                .select(WhatsAppTemplateRow::as_select())
                .first::<WhatsAppTemplateRow>(conn)
                .optional()?
                .map(WhatsAppTemplate::from)
                .ok_or_else(|| StoreError::NotFound("WhatsApp template".into()))
        })
        .await
    }

    async fn create_whatsapp_template(
        &self,
        template: WhatsAppTemplate,
    ) -> StoreResult<WhatsAppTemplate> {
        self.run(move |conn| {
            diesel::insert_into(whatsapp_templates::table)
                .values(WhatsAppTemplateRow::from(&template))
                .execute(conn)?;
            Ok(template)
        })
        .await
    }

    async fn update_whatsapp_template(
        &self,
        template: WhatsAppTemplate,
    ) -> StoreResult<WhatsAppTemplate> {
        self.run(move |conn| {
            let affected = diesel::update(whatsapp_templates::table.find(template.id))
                .set(&WhatsAppTemplateRow::from(&template))
                .execute(conn)?;
            expect_one(affected, "WhatsApp template")?;
            Ok(template)
        })
        .await
    }

    async fn delete_whatsapp_template(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let affected = diesel::delete(whatsapp_templates::table.find(id)).execute(conn)?;
            expect_one(affected, "WhatsApp template")
        })
        .await
    }

    async fn count_users(&self) -> StoreResult<i64> {
        self.run(|conn| Ok(users::table.count().get_result::<i64>(conn)?))
            .await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("User".into()))?
                .try_into()
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        let email = email.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("User".into()))?
                .try_into()
        })
        .await
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(UserRow::from(&user))
                .execute(conn)?;
            Ok(user)
        })
        .await
    }

    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        self.run(move |conn| {
            diesel::insert_into(sessions::table)
                .values(SessionRow::from(&session))
                .execute(conn)?;
            Ok(session)
        })
        .await
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Session> {
        let token_hash = token_hash.to_string();
        self.run(move |conn| {
            sessions::table
                .filter(sessions::token_hash.eq(token_hash))
                .select(SessionRow::as_select())
                .first::<SessionRow>(conn)
                .optional()?
                .map(Session::from)
                .ok_or_else(|| StoreError::NotFound("Session".into()))
        })
        .await
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<()> {
        let token_hash = token_hash.to_string();
        self.run(move |conn| {
            let affected =
                diesel::delete(sessions::table.filter(sessions::token_hash.eq(token_hash)))
                    .execute(conn)?;
            expect_one(affected, "Session")
        })
        .await
    }

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>> {
        self.run(|conn| {
            let rows = invitations::table
                .select(InvitationRow::as_select())
                .order(invitations::created_at.desc())
                .load::<InvitationRow>(conn)?;
            convert_all(rows)
        })
        .await
    }

    async fn get_invitation(&self, id: Uuid) -> StoreResult<Invitation> {
        self.run(move |conn| {
            invitations::table
                .find(id)
                .select(InvitationRow::as_select())
                .first::<InvitationRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("Invitation".into()))?
                .try_into()
        })
        .await
    }

    async fn find_invitation_by_token(&self, token: &str) -> StoreResult<Invitation> {
        let token = token.to_string();
        self.run(move |conn| {
            invitations::table
                .filter(invitations::token.eq(token))
                .select(InvitationRow::as_select())
                .first::<InvitationRow>(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound("Invitation".into()))?
                .try_into()
        })
        .await
    }

    async fn create_invitation(&self, invitation: Invitation) -> StoreResult<Invitation> {
        self.run(move |conn| {
            diesel::insert_into(invitations::table)
                .values(InvitationRow::from(&invitation))
                .execute(conn)?;
            Ok(invitation)
        })
        .await
    }

    async fn update_invitation(&self, invitation: Invitation) -> StoreResult<Invitation> {
        self.run(move |conn| {
            let affected = diesel::update(invitations::table.find(invitation.id))
                .set(&InvitationRow::from(&invitation))
                .execute(conn)?;
            expect_one(affected, "Invitation")?;
            Ok(invitation)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("budi"), "%budi%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\x"), "%c:\\\\x%");
    }
}
