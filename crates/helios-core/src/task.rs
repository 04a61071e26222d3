use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::Resources;

/// Opaque 128-bit task identifier, unique across a manager's lifetime.
///
/// Wire representation is the hyphenated lowercase UUID form, used
/// verbatim in status keys (`task:<id>:status`) and log channel names
/// (`logs:<id>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskId(Uuid::parse_str(s)?))
    }
}

/// Queue priority. `High` is drained strictly before `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[serde(alias = "default")]
    Default,
}

impl Priority {
    /// The queue name this priority is drained from.
    pub fn queue_name(self) -> &'static str {
        match self {
            Priority::High => crate::wire::QUEUE_HIGH,
            Priority::Default => crate::wire::QUEUE_DEFAULT,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Default
    }
}

/// Everything a worker needs to run one task, immutable once enqueued.
///
/// This is the queue payload: it's serialized verbatim by the manager
/// at `Submit` time and deserialized by whichever worker leases it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    /// Absolute path to the extracted project, shared between manager
    /// and worker filesystems (or identical mount points).
    pub working_dir: PathBuf,
    /// Relative path, inside `working_dir`, to the program to execute.
    /// Already validated at admission; never contains `..` or an
    /// absolute component.
    pub entrypoint: PathBuf,
    pub priority: Priority,
    pub name: String,
    pub resources: Resources,
}
