//! Task status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime status of a task
///
/// # State Machine
/// ```text
/// Pending -> Available -> Assigned -> InProgress -> Completed
///              ^   |         |          |  ^   \-> Failed
///              |   v         |          v  |
///              Pending   Available    Blocked
///
/// any non-terminal state -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting on prerequisites
    Pending,
    /// Executable, nobody assigned yet
    Available,
    /// At least one agent assigned, work not started
    Assigned,
    /// Work is being performed
    InProgress,
    /// Started, but no eligible worker is contributing
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Pending,
        TaskStatus::Available,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Check whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Completed | Failed | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Pending, Available) => true,
            (Available, Assigned) | (Available, Pending) => true,
            (Assigned, InProgress) | (Assigned, Available) => true,
            (InProgress, Completed) | (InProgress, Failed) | (InProgress, Blocked) => true,
            (Blocked, InProgress) | (Blocked, Completed) | (Blocked, Failed) => true,
            _ => false,
        }
    }

    /// Completed, Failed or Cancelled
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Started and not yet finished
    pub fn is_working(self) -> bool {
        matches!(self, TaskStatus::InProgress | TaskStatus::Blocked)
    }

    /// Agents may be added in this status
    pub fn accepts_assignment(self) -> bool {
        matches!(
            self,
            TaskStatus::Available
                | TaskStatus::Assigned
                | TaskStatus::InProgress
                | TaskStatus::Blocked
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
