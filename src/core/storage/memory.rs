use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CrmStore, StoreError, StoreResult};
use crate::activities::Activity;
use crate::auth::{Session, User};
use crate::contacts::{Contact, ContactFilter};
use crate::deals::{Deal, DealFilters};
use crate::invitations::Invitation;
use crate::tasks::{Task, TaskFilters};
use crate::templates::{EmailTemplate, WhatsAppTemplate};

#[derive(Default)]
struct Tables {
    contacts: HashMap<Uuid, Contact>,
    activities: Vec<Activity>,
    tasks: HashMap<Uuid, Task>,
    deals: HashMap<Uuid, Deal>,
    email_templates: HashMap<Uuid, EmailTemplate>,
    whatsapp_templates: HashMap<Uuid, WhatsAppTemplate>,
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    invitations: HashMap<Uuid, Invitation>,
}

/// Process-local store. Everything lives behind one lock so cascades are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(entity: &str) -> StoreError {
    StoreError::NotFound(entity.to_string())
}

fn task_order(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
}

#[async_trait]
impl CrmStore for MemoryStore {
    async fn list_contacts(&self, filter: &ContactFilter) -> StoreResult<Vec<Contact>> {
        let tables = self.tables.read().await;
        let mut contacts: Vec<Contact> = tables
            .contacts
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contacts)
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Contact> {
        let tables = self.tables.read().await;
        tables.contacts.get(&id).cloned().ok_or_else(|| missing("Contact"))
    }

    async fn create_contact(&self, contact: Contact) -> StoreResult<Contact> {
        let mut tables = self.tables.write().await;
        tables.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn update_contact(&self, contact: Contact) -> StoreResult<Contact> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .contacts
            .get_mut(&contact.id)
            .ok_or_else(|| missing("Contact"))?;
        *slot = contact.clone();
        Ok(contact)
    }

    async fn set_lead_score(
        &self,
        id: Uuid,
        score: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<Contact> {
        let mut tables = self.tables.write().await;
        let contact = tables.contacts.get_mut(&id).ok_or_else(|| missing("Contact"))?;
        contact.lead_score = score;
        contact.updated_at = at;
        Ok(contact.clone())
    }

    async fn touch_last_contact(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let contact = tables.contacts.get_mut(&id).ok_or_else(|| missing("Contact"))?;
        contact.last_contact_date = Some(at);
        contact.updated_at = at;
        Ok(())
    }

    async fn delete_contact(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.contacts.remove(&id).ok_or_else(|| missing("Contact"))?;
        tables.activities.retain(|a| a.contact_id != id);
        tables.deals.retain(|_, d| d.contact_id != id);
        for task in tables.tasks.values_mut() {
            if task.contact_id == Some(id) {
                task.contact_id = None;
            }
        }
        Ok(())
    }

    async fn list_activities(&self, contact_id: Option<Uuid>) -> StoreResult<Vec<Activity>> {
        let tables = self.tables.read().await;
        let mut activities: Vec<Activity> = tables
            .activities
            .iter()
            .filter(|a| contact_id.map_or(true, |id| a.contact_id == id))
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(activities)
    }

    async fn create_activity(&self, activity: Activity) -> StoreResult<Activity> {
        let mut tables = self.tables.write().await;
        if !tables.contacts.contains_key(&activity.contact_id) {
            return Err(missing("Contact"));
        }
        tables.activities.push(activity.clone());
        Ok(activity)
    }

    async fn list_tasks(&self, filters: &TaskFilters) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| filters.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(task_order);
        Ok(tasks)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Task> {
        let tables = self.tables.read().await;
        tables.tasks.get(&id).cloned().ok_or_else(|| missing("Task"))
    }

    async fn create_task(&self, task: Task) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: Task) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        let slot = tables.tasks.get_mut(&task.id).ok_or_else(|| missing("Task"))?;
        *slot = task.clone();
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.tasks.remove(&id).map(|_| ()).ok_or_else(|| missing("Task"))
    }

    async fn list_deals(&self, filters: &DealFilters) -> StoreResult<Vec<Deal>> {
        let tables = self.tables.read().await;
        let mut deals: Vec<Deal> = tables
            .deals
            .values()
            .filter(|d| filters.matches(d))
            .cloned()
            .collect();
        deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deals)
    }

    async fn get_deal(&self, id: Uuid) -> StoreResult<Deal> {
        let tables = self.tables.read().await;
        tables.deals.get(&id).cloned().ok_or_else(|| missing("Deal"))
    }

    async fn create_deal(&self, deal: Deal) -> StoreResult<Deal> {
        let mut tables = self.tables.write().await;
        if !tables.contacts.contains_key(&deal.contact_id) {
            return Err(missing("Contact"));
        }
        tables.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    async fn update_deal(&self, deal: Deal) -> StoreResult<Deal> {
        let mut tables = self.tables.write().await;
        let slot = tables.deals.get_mut(&deal.id).ok_or_else(|| missing("Deal"))?;
        *slot = deal.clone();
        Ok(deal)
    }

    async fn delete_deal(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.deals.remove(&id).map(|_| ()).ok_or_else(|| missing("Deal"))
    }

    async fn list_email_templates(&self) -> StoreResult<Vec<EmailTemplate>> {
        let tables = self.tables.read().await;
        let mut templates: Vec<EmailTemplate> =
            tables.email_templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn get_email_template(&self, id: Uuid) -> StoreResult<EmailTemplate> {
        let tables = self.tables.read().await;
        tables
            .email_templates
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Email template"))
    }

    async fn create_email_template(&self, template: EmailTemplate) -> StoreResult<EmailTemplate> {
        let mut tables = self.tables.write().await;
        tables.email_templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn update_email_template(&self, template: EmailTemplate) -> StoreResult<EmailTemplate> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .email_templates
            .get_mut(&template.id)
            .ok_or_else(|| missing("Email template"))?;
        *slot = template.clone();
        Ok(template)
    }

    async fn delete_email_template(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .email_templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("Email template"))
    }

    async fn list_whatsapp_templates(&self) -> StoreResult<Vec<WhatsAppTemplate>> {
        let tables = self.tables.read().await;
        let mut templates: Vec<WhatsAppTemplate> =
            tables.whatsapp_templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn get_whatsapp_template(&self, id: Uuid) -> StoreResult<WhatsAppTemplate> {
        let tables = self.tables.read().await;
        tables
            .whatsapp_templates
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("WhatsApp template"))
    }

    async fn create_whatsapp_template(
        &self,
        template: WhatsAppTemplate,
    ) -> StoreResult<WhatsAppTemplate> {
        let mut tables = self.tables.write().await;
        tables.whatsapp_templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn update_whatsapp_template(
        &self,
        template: WhatsAppTemplate,
    ) -> StoreResult<WhatsAppTemplate> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .whatsapp_templates
            .get_mut(&template.id)
            .ok_or_else(|| missing("WhatsApp template"))?;
        *slot = template.clone();
        Ok(template)
    }

    async fn delete_whatsapp_template(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .whatsapp_templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("WhatsApp template"))
    }

    async fn count_users(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.users.len() as i64)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let tables = self.tables.read().await;
        tables.users.get(&id).cloned().ok_or_else(|| missing("User"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| missing("User"))
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "user {} already exists",
                user.email
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Session> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .get(token_hash)
            .cloned()
            .ok_or_else(|| missing("Session"))
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .remove(token_hash)
            .map(|_| ())
            .ok_or_else(|| missing("Session"))
    }

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>> {
        let tables = self.tables.read().await;
        let mut invitations: Vec<Invitation> = tables.invitations.values().cloned().collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    async fn get_invitation(&self, id: Uuid) -> StoreResult<Invitation> {
        let tables = self.tables.read().await;
        tables
            .invitations
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("Invitation"))
    }

    async fn find_invitation_by_token(&self, token: &str) -> StoreResult<Invitation> {
        let tables = self.tables.read().await;
        tables
            .invitations
            .values()
            .find(|i| i.token == token)
            .cloned()
            .ok_or_else(|| missing("Invitation"))
    }

    async fn create_invitation(&self, invitation: Invitation) -> StoreResult<Invitation> {
        let mut tables = self.tables.write().await;
        tables.invitations.insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    async fn update_invitation(&self, invitation: Invitation) -> StoreResult<Invitation> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .invitations
            .get_mut(&invitation.id)
            .ok_or_else(|| missing("Invitation"))?;
        *slot = invitation.clone();
        Ok(invitation)
    }
}
