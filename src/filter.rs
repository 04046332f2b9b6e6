// Query filtering for task listings

use crate::task::{Status, Task};

/// Filter for `TaskStore::list`; the default matches every task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    /// Only tasks in this column
    pub status: Option<Status>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn status(status: Status) -> Self {
        Self { status: Some(status) }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|status| task.status == status)
    }
}

impl From<Status> for Filter {
    fn from(status: Status) -> Self {
        Self::status(status)
    }
}

impl From<Option<Status>> for Filter {
    fn from(status: Option<Status>) -> Self {
        Self { status }
    }
}
