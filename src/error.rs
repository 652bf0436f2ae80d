use thiserror::Error;

use crate::work::WorkItem;

/// Errors that stop a dispatch before any work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid pool size {0}: a worker pool needs at least one slot")]
    InvalidPoolSize(usize),
}

/// Failure of a single work item.
///
/// Produced either by a processor returning an error or by a processor
/// panicking inside its slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{item}: {reason}")]
pub struct TaskFailure {
    pub item: WorkItem,
    pub reason: String,
}

impl TaskFailure {
    pub fn new(item: WorkItem, reason: impl Into<String>) -> Self {
        Self {
            item,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pool_size_message() {
        let err = DispatchError::InvalidPoolSize(0);
        assert_eq!(
            err.to_string(),
            "Invalid pool size 0: a worker pool needs at least one slot"
        );
    }

    #[test]
    fn test_task_failure_display() {
        let failure = TaskFailure::new(WorkItem::from("alpha"), "disk full");
        assert_eq!(failure.to_string(), "alpha: disk full");
    }
}
