//! Wire-format constants shared between the manager and the worker:
//! queue names, pub/sub channel naming, and status key naming. These
//! are part of the contract with the coordination substrate and must
//! not drift between processes, so they live here rather than being
//! duplicated as string literals.

use crate::task::TaskId;

pub const QUEUE_HIGH: &str = "high";
pub const QUEUE_DEFAULT: &str = "default";

/// All queue names, in strict drain order (`high` before `default`).
pub const QUEUES_IN_DRAIN_ORDER: [&str; 2] = [QUEUE_HIGH, QUEUE_DEFAULT];

const LOG_CHANNEL_PREFIX: &str = "logs:";
const STATUS_KEY_PREFIX: &str = "task:";
const STATUS_KEY_SUFFIX: &str = ":status";

pub fn log_channel(task_id: TaskId) -> String {
    format!("{LOG_CHANNEL_PREFIX}{task_id}")
}

pub fn status_key(task_id: TaskId) -> String {
    format!("{STATUS_KEY_PREFIX}{task_id}{STATUS_KEY_SUFFIX}")
}

pub fn processing_list(queue: &str) -> String {
    format!("processing:{queue}")
}

pub fn processing_deadlines(queue: &str) -> String {
    format!("processing:{queue}:deadlines")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_and_key_naming() {
        let id = TaskId::new();
        assert_eq!(log_channel(id), format!("logs:{id}"));
        assert_eq!(status_key(id), format!("task:{id}:status"));
    }
}
