//! Types for the tasks module
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::shared::validation::clean_optional;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub contact_id: Option<Uuid>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn from_request(req: CreateTaskRequest, now: DateTime<Utc>) -> Self {
        let status = req.status.unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            title: req.title.unwrap_or_default().trim().to_string(),
            description: clean_optional(req.description),
            contact_id: req.contact_id,
            priority: req.priority.unwrap_or_default(),
            status,
            assignee: clean_optional(req.assignee),
            due_date: req.due_date,
            completed_at: (status == TaskStatus::Completed).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update and returns true when it moved the task to completed.
    pub fn apply(&mut self, update: UpdateTaskRequest, now: DateTime<Utc>) -> bool {
        if let Some(title) = update.title {
            self.title = title.trim().to_string();
        }
        if update.description.is_some() {
            self.description = clean_optional(update.description);
        }
        if update.contact_id.is_some() {
            self.contact_id = update.contact_id;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if update.assignee.is_some() {
            self.assignee = clean_optional(update.assignee);
        }
        if update.due_date.is_some() {
            self.due_date = update.due_date;
        }

        let mut completed_now = false;
        if let Some(status) = update.status {
            if status == TaskStatus::Completed && self.status != TaskStatus::Completed {
                self.completed_at = Some(now);
                completed_now = true;
            } else if status != TaskStatus::Completed {
                self.completed_at = None;
            }
            self.status = status;
        }
        self.updated_at = now;
        completed_now
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
            && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown task priority '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(
        required(message = "is required"),
        length(min = 1, max = 200, message = "must be between 1 and 200 characters")
    )]
    pub title: Option<String>,
    pub description: Option<String>,
    pub contact_id: Option<Uuid>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub contact_id: Option<Uuid>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub contact_id: Option<Uuid>,
    pub assignee: Option<String>,
}

impl TaskFilters {
    pub fn for_contact(contact_id: Uuid) -> Self {
        Self {
            contact_id: Some(contact_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
            && self.contact_id.map_or(true, |c| task.contact_id == Some(c))
            && self
                .assignee
                .as_deref()
                .map_or(true, |a| task.assignee.as_deref() == Some(a))
    }
}
