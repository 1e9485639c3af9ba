//! Task outcome classification (SPEC_FULL.md §3).

use serde::{Deserialize, Serialize};

/// How a dispatched task was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The child exited normally.
    Ok,
    /// The memory gate rejected the task.
    MemErr,
    /// The worker failed to spawn a child process.
    ForkErr,
    /// The child terminated abnormally (signal, OOM-kill, or a non-zero
    /// wait status classified as killed).
    TaskKilled,
}

impl Status {
    /// Whether this status counts as a successfully completed task. The
    /// complement of this is exactly the set of statuses that land a row
    /// in `unfinished_tasks.txt`.
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

/// One `MSG_RESULT` payload: everything the master learns about a
/// retired task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub slot: usize,
    pub task_id: i64,
    pub status: Status,
    pub raw_args: String,
    /// Present when `status` is `Ok` or `TaskKilled`.
    pub exec_time_s: Option<f64>,
    /// Present only on the final result a slot ever sends (the drain
    /// result before `MSG_STOP` is honoured).
    pub worker_lifetime_s: Option<f64>,
}

impl TaskResult {
    /// Format the `unfinished_tasks.txt` row for this result. Callers are
    /// expected to only call this when `!status.is_ok()`.
    pub fn unfinished_row(&self) -> String {
        format!("{},{}", self.task_id, self.raw_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ok_counts_as_finished() {
        assert!(Status::Ok.is_ok());
        assert!(!Status::MemErr.is_ok());
        assert!(!Status::ForkErr.is_ok());
        assert!(!Status::TaskKilled.is_ok());
    }

    #[test]
    fn unfinished_row_format() {
        let r = TaskResult {
            slot: 0,
            task_id: 42,
            status: Status::ForkErr,
            raw_args: "1,2,3".into(),
            exec_time_s: None,
            worker_lifetime_s: None,
        };
        assert_eq!(r.unfinished_row(), "42,1,2,3");
    }
}
