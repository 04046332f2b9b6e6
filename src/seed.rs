// Remote seed source used to populate an empty board

use crate::task::{Priority, Status, Task, UNTITLED};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_SEED_URL: &str = "https://jsonplaceholder.typicode.com/todos";
pub const DEFAULT_SEED_LIMIT: u32 = 6;

/// Record shape served by the placeholder todo API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTodo {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Bulk source of starter tasks
pub trait SeedSource {
    fn fetch(&self) -> Result<Vec<RemoteTodo>>;
}

/// Fetches todos over HTTP with a single blocking GET
pub struct HttpSeedSource {
    client: Client,
    url: String,
    limit: u32,
}

impl HttpSeedSource {
    pub fn new(url: impl Into<String>, limit: u32) -> Self {
        Self::with_client(Client::new(), url, limit)
    }

    pub fn with_client(client: Client, url: impl Into<String>, limit: u32) -> Self {
        Self {
            client,
            url: url.into(),
            limit,
        }
    }
}

impl SeedSource for HttpSeedSource {
    fn fetch(&self) -> Result<Vec<RemoteTodo>> {
        debug!(url = %self.url, limit = self.limit, "Fetching seed tasks");

        let todos: Vec<RemoteTodo> = self
            .client
            .get(&self.url)
            .query(&[("_limit", self.limit)])
            .send()
            .context("Seed request failed")?
            .error_for_status()
            .context("Seed source returned an error status")?
            .json()
            .context("Failed to parse seed response")?;

        info!(count = todos.len(), "Fetched seed tasks");
        Ok(todos)
    }
}

/// A source that never has anything; used when seeding is disabled
pub struct NoSeed;

impl SeedSource for NoSeed {
    fn fetch(&self) -> Result<Vec<RemoteTodo>> {
        Ok(Vec::new())
    }
}

/// Turn remote todos into board tasks.
///
/// Every task gets a fresh id. Priority cycles High, Medium, Low by position
/// in the fetched list.
pub fn seed_tasks(todos: &[RemoteTodo], now: DateTime<Utc>) -> Vec<Task> {
    todos
        .iter()
        .enumerate()
        .map(|(index, todo)| {
            let title = todo
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(UNTITLED);

            let description = format!(
                "Sample description for task (API ID: {}). Fetched from API.",
                todo.id
            );

            let mut task = Task::new(title, now)
                .with_description(Some(description))
                .with_priority(Priority::round_robin(index));

            if todo.completed {
                task.status = Status::Completed;
                task.completion_date = Some(now);
            }
            task
        })
        .collect()
}
