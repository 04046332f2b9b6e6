// In-memory task store

use crate::error::{BoardError, Result};
use crate::filter::Filter;
use crate::record;
use crate::task::{NewTask, Status, Task, TaskPatch, normalize_description};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Ordered collection of tasks and the operations allowed on it.
///
/// Order is insertion/load order. Grouping by column is a derived view
/// (`columns`), never stored. New tasks go to the front.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get a task by id
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Create a task in the initial column
    pub fn create(&mut self, input: NewTask) -> Result<&Task> {
        let title = Self::validate_title(&input.title)?;

        let task = Task::new(title, Utc::now())
            .with_description(input.description)
            .with_priority(input.priority.unwrap_or_default());

        debug!(id = %task.id, priority = %task.priority, "Created task");
        self.tasks.insert(0, task);
        Ok(&self.tasks[0])
    }

    /// Merge a patch into a task; status, id and dates are never touched
    pub fn edit(&mut self, id: &str, patch: TaskPatch) -> Result<&Task> {
        let index = self.position(id)?;

        // Validate before writing anything
        let title = patch.title.as_deref().map(Self::validate_title).transpose()?;

        let task = &mut self.tasks[index];
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = normalize_description(Some(description));
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }

        debug!(id, "Edited task");
        Ok(&self.tasks[index])
    }

    /// Move a task to the column named by `status`
    pub fn move_task(&mut self, id: &str, status: &str) -> Result<&Task> {
        let status = status
            .parse::<Status>()
            .map_err(BoardError::InvalidTransition)?;
        self.move_to(id, status)
    }

    /// Move a task to another column, maintaining its completion date
    pub fn move_to(&mut self, id: &str, status: Status) -> Result<&Task> {
        let index = self.position(id)?;
        let task = &mut self.tasks[index];

        if task.status == status {
            debug!(id, %status, "Task already in column");
            return Ok(&self.tasks[index]);
        }

        let from = task.status;
        if status.is_terminal() {
            task.completion_date = Some(Utc::now());
        } else if from.is_terminal() {
            task.completion_date = None;
        }
        task.status = status;

        debug!(id, %from, to = %status, "Moved task");
        Ok(&self.tasks[index])
    }

    /// Delete a task; removing an absent id is an error
    pub fn remove(&mut self, id: &str) -> Result<Task> {
        let index = self.position(id)?;
        let task = self.tasks.remove(index);
        debug!(id, "Removed task");
        Ok(task)
    }

    /// Lazily iterate tasks in collection order.
    ///
    /// The iterator is `Clone`, so a consumer can restart it without calling
    /// back into the store.
    pub fn list(&self, filter: impl Into<Filter>) -> impl Iterator<Item = &Task> + Clone {
        let filter = filter.into();
        self.tasks.iter().filter(move |t| filter.matches(t))
    }

    /// Tasks grouped by column, in column display order
    pub fn columns(&self) -> Vec<(Status, Vec<&Task>)> {
        Status::ALL
            .iter()
            .map(|&status| (status, self.list(status).collect()))
            .collect()
    }

    // ========================================================================
    // Bulk load / snapshot
    // ========================================================================

    /// Replace the collection from raw stored JSON, returning how many tasks
    /// were kept
    pub fn load_all(&mut self, value: &Value) -> usize {
        self.tasks = record::decode_tasks(value, Utc::now());
        info!(count = self.tasks.len(), "Loaded tasks");
        self.tasks.len()
    }

    /// Replace the collection from already-typed tasks, dropping repeated ids
    pub fn load_tasks(&mut self, tasks: Vec<Task>) {
        let mut seen = HashSet::new();
        self.tasks = tasks
            .into_iter()
            .filter(|t| {
                let fresh = seen.insert(t.id.clone());
                if !fresh {
                    warn!(id = %t.id, "Dropping task with duplicate id");
                }
                fresh
            })
            .collect();
        info!(count = self.tasks.len(), "Loaded tasks");
    }

    /// Snapshot of the whole collection for the persistence adapter
    pub fn serialize(&self) -> Value {
        Value::Array(
            self.tasks
                .iter()
                .filter_map(|t| serde_json::to_value(t).ok())
                .collect(),
        )
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn position(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))
    }

    fn validate_title(title: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::Validation("Title is required".to_string()));
        }
        Ok(title.to_string())
    }
}
