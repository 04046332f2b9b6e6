// Tolerant decoding of persisted task records
//
// Stored state may be hand-edited, truncated, or written by an older build.
// An entry survives as long as it is an object carrying a usable id; every
// other field falls back to a safe default.

use crate::task::{Priority, Status, Task, UNTITLED, normalize_description};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Decode a raw JSON value into tasks, discarding malformed entries.
///
/// A value that is not an array decodes to no tasks. Entries that are not
/// objects, lack an id, or repeat an id already seen are dropped with a
/// warning.
pub fn decode_tasks(value: &Value, now: DateTime<Utc>) -> Vec<Task> {
    let Some(entries) = value.as_array() else {
        warn!(kind = value_kind(value), "Stored tasks are not an array, ignoring");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(task) = decode_task(entry, now) else {
            warn!(index, kind = value_kind(entry), "Discarding malformed task record");
            continue;
        };

        if !seen.insert(task.id.clone()) {
            warn!(index, id = %task.id, "Discarding task record with duplicate id");
            continue;
        }

        tasks.push(task);
    }

    debug!(total = entries.len(), kept = tasks.len(), "Decoded task records");
    tasks
}

/// Decode a single entry, or `None` when it cannot be identified
pub fn decode_task(entry: &Value, now: DateTime<Utc>) -> Option<Task> {
    let object = entry.as_object()?;
    let id = decode_id(object.get("id")?)?;

    let title = string_field(object, "title")
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let description = normalize_description(string_field(object, "description"));

    let priority = string_field(object, "priority")
        .and_then(|p| p.parse::<Priority>().ok())
        .unwrap_or_default();

    let status = string_field(object, "status")
        .and_then(|s| s.parse::<Status>().ok())
        .unwrap_or_default();

    let creation_date = date_field(object, "creationDate").unwrap_or(now);
    let completion_date = date_field(object, "completionDate");

    Some(Task {
        id,
        title,
        description,
        priority,
        status,
        creation_date,
        completion_date,
    })
}

fn decode_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn date_field(object: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    object
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
