// Board owner: bootstrap, persistence policy and command dispatch

use crate::error::Result;
use crate::seed::{self, SeedSource};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskPatch};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Teardown handle for a board's owner.
///
/// Clones share state. Once `unmount` is called, results of work already in
/// flight (the seed fetch) are dropped instead of applied.
#[derive(Debug, Clone)]
pub struct Mount {
    mounted: Arc<AtomicBool>,
}

impl Mount {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }
}

impl Default for Mount {
    fn default() -> Self {
        Self::new()
    }
}

/// Commands the view layer dispatches into the board
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(NewTask),
    Edit { id: String, patch: TaskPatch },
    Move { id: String, status: String },
    Remove { id: String },
}

/// Result of a dispatched command, carrying the affected task
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created(Task),
    Edited(Task),
    Moved(Task),
    Removed(Task),
}

impl Outcome {
    pub fn task(&self) -> &Task {
        match self {
            Outcome::Created(t) | Outcome::Edited(t) | Outcome::Moved(t) | Outcome::Removed(t) => t,
        }
    }
}

/// Where a bootstrapped board got its tasks from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Storage,
    Seed,
    Empty,
}

/// Owns the task store and writes it through to storage after every change
pub struct Board {
    store: TaskStore,
    storage: Box<dyn Storage>,
    origin: Origin,
}

impl Board {
    /// Empty board over the given storage, without reading it
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            store: TaskStore::new(),
            storage,
            origin: Origin::Empty,
        }
    }

    /// Start a board: stored tasks first, then the seed source, then empty.
    ///
    /// Storage and network failures never surface here; each one degrades to
    /// the next fallback.
    pub fn bootstrap(storage: Box<dyn Storage>, seed: &dyn SeedSource, mount: &Mount) -> Self {
        let mut board = Self::new(storage);

        if let Some(value) = board.load_stored() {
            if board.store.load_all(&value) > 0 {
                info!(count = board.store.len(), "Board loaded from storage");
                board.origin = Origin::Storage;
                return board;
            }
            warn!("Stored tasks contain no usable records, clearing");
            board.clear_stored();
        }

        info!("No stored tasks, requesting seed");
        let todos = match seed.fetch() {
            Ok(todos) => todos,
            Err(e) => {
                warn!(error = %e, "Seed source unavailable, starting empty");
                return board;
            }
        };

        if !mount.is_mounted() {
            debug!(count = todos.len(), "Board torn down during seed fetch, discarding");
            return board;
        }

        let tasks = seed::seed_tasks(&todos, Utc::now());
        if tasks.is_empty() {
            return board;
        }

        board.store.load_tasks(tasks);
        board.origin = Origin::Seed;
        board.persist();
        info!(count = board.store.len(), "Board seeded");
        board
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    // ========================================================================
    // Mutations (persisted on success)
    // ========================================================================

    pub fn create(&mut self, input: NewTask) -> Result<Task> {
        let task = self.store.create(input)?.clone();
        self.persist();
        Ok(task)
    }

    pub fn edit(&mut self, id: &str, patch: TaskPatch) -> Result<Task> {
        let task = self.store.edit(id, patch)?.clone();
        self.persist();
        Ok(task)
    }

    pub fn move_task(&mut self, id: &str, status: &str) -> Result<Task> {
        let task = self.store.move_task(id, status)?.clone();
        self.persist();
        Ok(task)
    }

    pub fn remove(&mut self, id: &str) -> Result<Task> {
        let task = self.store.remove(id)?;
        self.persist();
        Ok(task)
    }

    /// Apply a command message
    pub fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::Create(input) => self.create(input).map(Outcome::Created),
            Command::Edit { id, patch } => self.edit(&id, patch).map(Outcome::Edited),
            Command::Move { id, status } => self.move_task(&id, &status).map(Outcome::Moved),
            Command::Remove { id } => self.remove(&id).map(Outcome::Removed),
        }
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Read and parse the stored payload; anything unusable counts as absent
    fn load_stored(&self) -> Option<Value> {
        let bytes = match self.storage.load() {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read storage, treating as empty");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) if value.is_array() => Some(value),
            parsed => {
                match parsed {
                    Ok(_) => warn!("Stored tasks are not an array, clearing"),
                    Err(e) => warn!(error = %e, "Stored tasks are corrupted, clearing"),
                }
                self.clear_stored();
                None
            }
        }
    }

    fn clear_stored(&self) {
        if let Err(e) = self.storage.clear() {
            error!(error = %e, "Failed to clear corrupted storage");
        }
    }

    /// Write the collection through, or remove the entry once it is empty
    fn persist(&self) {
        let result = if self.store.is_empty() {
            self.storage.clear()
        } else {
            serde_json::to_vec(&self.store.serialize())
                .map_err(eyre::Report::from)
                .and_then(|bytes| self.storage.save(&bytes))
        };

        match result {
            Ok(()) => debug!(count = self.store.len(), "Persisted tasks"),
            Err(e) => error!(error = %e, "Failed to persist tasks"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::seed::{HttpSeedSource, NoSeed, RemoteTodo};
    use crate::storage::{FileStorage, MemoryStorage};
    use crate::task::{Priority, Status};
    use crate::error::BoardError;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct FixedSeed(Vec<RemoteTodo>);

    impl SeedSource for FixedSeed {
        fn fetch(&self) -> eyre::Result<Vec<RemoteTodo>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSeed;

    impl SeedSource for FailingSeed {
        fn fetch(&self) -> eyre::Result<Vec<RemoteTodo>> {
            Err(eyre::eyre!("HTTP error! status: 503"))
        }
    }

    /// Tears the board down while the fetch is in flight
    struct UnmountingSeed {
        mount: Mount,
        calls: Cell<usize>,
    }

    impl SeedSource for UnmountingSeed {
        fn fetch(&self) -> eyre::Result<Vec<RemoteTodo>> {
            self.calls.set(self.calls.get() + 1);
            self.mount.unmount();
            Ok(sample_todos())
        }
    }

    /// Storage whose writes always fail
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn load(&self) -> eyre::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        fn save(&self, _bytes: &[u8]) -> eyre::Result<()> {
            Err(eyre::eyre!("quota exceeded"))
        }
        fn clear(&self) -> eyre::Result<()> {
            Err(eyre::eyre!("quota exceeded"))
        }
    }

    fn sample_todos() -> Vec<RemoteTodo> {
        vec![
            RemoteTodo {
                id: 1,
                title: Some("delectus aut autem".to_string()),
                completed: false,
            },
            RemoteTodo {
                id: 2,
                title: Some("quis ut nam facilis".to_string()),
                completed: true,
            },
        ]
    }

    fn stored_tasks(storage: &MemoryStorage) -> Option<Vec<Task>> {
        storage
            .bytes()
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_bootstrap_prefers_storage() {
        let mut seeded = Board::new(Box::new(MemoryStorage::new()));
        seeded.create(NewTask::new("stored")).unwrap();
        let bytes = serde_json::to_vec(&seeded.store().serialize()).unwrap();

        let storage = MemoryStorage::with_bytes(bytes);
        let board = Board::bootstrap(Box::new(storage), &FailingSeed, &Mount::new());

        assert_eq!(board.origin(), Origin::Storage);
        assert_eq!(board.store().len(), 1);
        assert_eq!(board.store().list(Filter::all()).next().unwrap().title, "stored");
    }

    #[test]
    fn test_bootstrap_seeds_when_storage_absent() {
        let storage = MemoryStorage::new();
        let board = Board::bootstrap(
            Box::new(storage.clone()),
            &FixedSeed(sample_todos()),
            &Mount::new(),
        );

        assert_eq!(board.origin(), Origin::Seed);
        assert_eq!(board.store().len(), 2);
        assert_eq!(board.store().list(Status::Completed).count(), 1);

        // Seeded tasks are written through
        let stored = stored_tasks(&storage).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].priority, Priority::High);
        assert_eq!(stored[1].priority, Priority::Medium);
    }

    #[test]
    fn test_bootstrap_clears_corrupted_storage_and_seeds() {
        let storage = MemoryStorage::with_bytes("{not json");
        let board = Board::bootstrap(Box::new(storage.clone()), &NoSeed, &Mount::new());

        assert_eq!(board.origin(), Origin::Empty);
        assert!(board.store().is_empty());
        assert!(storage.bytes().is_none());

        let storage = MemoryStorage::with_bytes(r#"{"tasks": []}"#);
        let board = Board::bootstrap(
            Box::new(storage.clone()),
            &FixedSeed(sample_todos()),
            &Mount::new(),
        );
        assert_eq!(board.origin(), Origin::Seed);
        assert_eq!(stored_tasks(&storage).unwrap().len(), 2);
    }

    #[test]
    fn test_bootstrap_seeds_when_stored_array_has_no_tasks() {
        let storage = MemoryStorage::with_bytes(r#"["junk", null]"#);
        let board = Board::bootstrap(
            Box::new(storage),
            &FixedSeed(sample_todos()),
            &Mount::new(),
        );

        assert_eq!(board.origin(), Origin::Seed);
        assert_eq!(board.store().len(), 2);
    }

    #[test]
    fn test_bootstrap_clears_unusable_array_when_seed_fails() {
        let storage = MemoryStorage::with_bytes(r#"["junk", null, {"title": "no id"}]"#);
        let board = Board::bootstrap(Box::new(storage.clone()), &FailingSeed, &Mount::new());

        assert_eq!(board.origin(), Origin::Empty);
        assert!(board.store().is_empty());
        assert!(storage.bytes().is_none());
    }

    #[test]
    fn test_bootstrap_unreachable_http_seed_starts_empty() {
        let client = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
        let seed = HttpSeedSource::with_client(client, "http://127.0.0.1:1/todos", 6);
        let storage = MemoryStorage::new();

        let board = Board::bootstrap(Box::new(storage.clone()), &seed, &Mount::new());

        assert_eq!(board.origin(), Origin::Empty);
        assert!(board.store().is_empty());
        assert!(storage.bytes().is_none());
    }

    #[test]
    fn test_bootstrap_seed_failure_starts_empty() {
        let storage = MemoryStorage::new();
        let board = Board::bootstrap(Box::new(storage.clone()), &FailingSeed, &Mount::new());

        assert_eq!(board.origin(), Origin::Empty);
        assert!(board.store().is_empty());
        assert!(storage.bytes().is_none());
    }

    #[test]
    fn test_bootstrap_discards_seed_after_teardown() {
        let mount = Mount::new();
        let seed = UnmountingSeed {
            mount: mount.clone(),
            calls: Cell::new(0),
        };
        let storage = MemoryStorage::new();

        let board = Board::bootstrap(Box::new(storage.clone()), &seed, &mount);

        assert_eq!(seed.calls.get(), 1);
        assert!(!mount.is_mounted());
        assert!(board.store().is_empty());
        assert!(storage.bytes().is_none());
    }

    #[test]
    fn test_mutations_write_through_and_clear_when_empty() {
        let storage = MemoryStorage::new();
        let mut board = Board::new(Box::new(storage.clone()));

        let task = board
            .create(NewTask::new("Write docs").priority(Priority::High))
            .unwrap();
        let stored = stored_tasks(&storage).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, Status::New);
        assert_eq!(stored[0].priority, Priority::High);

        let moved = board.move_task(&task.id, "Completed").unwrap();
        assert!(moved.completion_date.is_some());
        assert_eq!(board.store().list(Status::New).count(), 0);
        assert_eq!(board.store().list(Status::Completed).count(), 1);
        assert_eq!(stored_tasks(&storage).unwrap()[0].status, Status::Completed);

        board.remove(&task.id).unwrap();
        assert_eq!(board.store().list(Filter::all()).count(), 0);
        assert!(storage.bytes().is_none());
    }

    #[test]
    fn test_failed_operation_does_not_persist() {
        let storage = MemoryStorage::new();
        let mut board = Board::new(Box::new(storage.clone()));

        assert!(matches!(
            board.create(NewTask::new("   ")),
            Err(BoardError::Validation(_))
        ));
        assert!(matches!(board.remove("missing"), Err(BoardError::NotFound(_))));
        assert!(storage.bytes().is_none());
    }

    #[test]
    fn test_persistence_failure_is_not_an_error() {
        let mut board = Board::new(Box::new(ReadOnlyStorage));

        let task = board.create(NewTask::new("still works")).unwrap();
        assert_eq!(board.store().len(), 1);
        board.remove(&task.id).unwrap();
        assert!(board.store().is_empty());
    }

    #[test]
    fn test_dispatch_commands() {
        let mut board = Board::new(Box::new(MemoryStorage::new()));

        let created = board
            .dispatch(Command::Create(NewTask::new("task")))
            .unwrap();
        let id = created.task().id.clone();
        assert!(matches!(created, Outcome::Created(_)));

        let edited = board
            .dispatch(Command::Edit {
                id: id.clone(),
                patch: TaskPatch {
                    title: Some("renamed".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();
        assert_eq!(edited.task().title, "renamed");

        let moved = board
            .dispatch(Command::Move {
                id: id.clone(),
                status: "inProgress".to_string(),
            })
            .unwrap();
        assert_eq!(moved.task().status, Status::InProgress);

        assert!(matches!(
            board.dispatch(Command::Move {
                id: id.clone(),
                status: "Archived".to_string(),
            }),
            Err(BoardError::InvalidTransition(_))
        ));

        let removed = board.dispatch(Command::Remove { id: id.clone() }).unwrap();
        assert!(matches!(removed, Outcome::Removed(_)));
        assert_eq!(
            board.dispatch(Command::Remove { id: id.clone() }).unwrap_err(),
            BoardError::NotFound(id)
        );
    }

    #[test]
    fn test_file_storage_survives_restart() {
        let temp = TempDir::new().unwrap();
        let storage = || Box::new(FileStorage::new(temp.path(), "kanbanTasks"));

        let mut board = Board::bootstrap(storage(), &NoSeed, &Mount::new());
        let first = board.create(NewTask::new("first")).unwrap();
        let second = board.create(NewTask::new("second")).unwrap();
        board.move_task(&first.id, "Completed").unwrap();

        let snapshot = board.store().serialize();
        drop(board);

        let restarted = Board::bootstrap(storage(), &FailingSeed, &Mount::new());
        assert_eq!(restarted.origin(), Origin::Storage);
        assert_eq!(restarted.store().serialize(), snapshot);

        let order: Vec<&str> = restarted
            .store()
            .list(Filter::all())
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(order, vec![second.id.as_str(), first.id.as_str()]);
    }
}
