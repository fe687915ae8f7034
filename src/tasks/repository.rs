//! In-memory task storage.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    #[serde(skip)]
    pub owner: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub priority: Priority,
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub due_date: Option<NaiveDate>,

    pub priority: Option<Priority>,

    pub completed: Option<bool>,
}

#[derive(Debug, Default)]
pub struct TaskRepository {
    tasks: DashMap<Uuid, Task>,
}

impl TaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, owner: Uuid, new: NewTask) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            owner,
            title: new.title.trim().to_string(),
            description: new.description,
            due_date: new.due_date,
            priority: new.priority,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id, task.clone());
        task
    }

    /// Oldest first.
    pub fn list(&self, owner: Uuid) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.owner == owner)
            .map(|t| t.value().clone())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    pub fn get(&self, owner: Uuid, id: Uuid) -> Option<Task> {
        self.tasks
            .get(&id)
            .filter(|t| t.owner == owner)
            .map(|t| t.value().clone())
    }

    pub fn update(&self, owner: Uuid, id: Uuid, update: UpdateTask) -> Option<Task> {
        let mut entry = self.tasks.get_mut(&id).filter(|t| t.owner == owner)?;
        let task = entry.value_mut();

        if let Some(title) = update.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(due_date) = update.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(completed) = update.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
        Some(task.clone())
    }

    pub fn delete(&self, owner: Uuid, id: Uuid) -> bool {
        self.tasks.remove_if(&id, |_, t| t.owner == owner).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
