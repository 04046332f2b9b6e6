// TaskBoard - Kanban task store with JSON persistence and remote seeding

pub mod board;
pub mod config;
pub mod error;
pub mod filter;
pub mod record;
pub mod seed;
pub mod storage;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use board::{Board, Command, Mount, Origin, Outcome};
pub use config::Config;
pub use error::BoardError;
pub use filter::Filter;
pub use seed::{HttpSeedSource, NoSeed, RemoteTodo, SeedSource};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::TaskStore;
pub use task::{NewTask, Priority, Status, Task, TaskPatch};
