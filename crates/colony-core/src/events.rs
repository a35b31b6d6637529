//! Scheduler notifications
//!
//! Listeners are plain closures kept in registration order. They run
//! synchronously, after the mutation that produced the event has been
//! committed, so a listener always observes the new state. A listener that
//! panics is logged and skipped; the remaining listeners still run.

use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::collaboration::AssignmentConflict;
use crate::task::TaskStatus;
use crate::types::{AgentId, TaskId, WorkKind};

/// Something observers may care about
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    TaskCreated {
        task: TaskId,
        name: String,
        kind: WorkKind,
    },
    /// Prerequisites satisfied
    TaskAvailable { task: TaskId },
    TaskStatusChanged {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    TaskCompleted { task: TaskId },
    TaskFailed { task: TaskId, reason: String },
    TaskCancelled { task: TaskId, reason: String },
    /// A group fell below its minimum participant count
    GroupSuspended {
        task: TaskId,
        remaining: Vec<AgentId>,
    },
    ConflictDetected(AssignmentConflict),
}

impl SchedulerEvent {
    /// Task the event is about, if any
    pub fn task(&self) -> Option<TaskId> {
        match self {
            SchedulerEvent::TaskCreated { task, .. }
            | SchedulerEvent::TaskAvailable { task }
            | SchedulerEvent::TaskStatusChanged { task, .. }
            | SchedulerEvent::TaskCompleted { task }
            | SchedulerEvent::TaskFailed { task, .. }
            | SchedulerEvent::TaskCancelled { task, .. }
            | SchedulerEvent::GroupSuspended { task, .. } => Some(*task),
            SchedulerEvent::ConflictDetected(conflict) => conflict.tasks.first().copied(),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Boxed observer
pub type Listener = Box<dyn FnMut(&SchedulerEvent) + Send>;

/// Ordered list of observers
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; it runs after every earlier one
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SchedulerEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver one event to every listener
    pub fn publish(&mut self, event: &SchedulerEvent) {
        for (id, listener) in self.listeners.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if let Err(payload) = outcome {
                tracing::error!(
                    "Listener {:?} panicked on {:?}: {}",
                    id,
                    event,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_| seen.lock().push(tag));
        }
        bus.publish(&SchedulerEvent::TaskAvailable { task: TaskId(1) });

        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();

        bus.subscribe(|_| panic!("listener failure"));
        let counter = Arc::clone(&count);
        bus.subscribe(move |_| *counter.lock() += 1);

        bus.publish(&SchedulerEvent::TaskCompleted { task: TaskId(1) });
        bus.publish(&SchedulerEvent::TaskCompleted { task: TaskId(2) });

        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(|_| {});
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_event_task_accessor() {
        let event = SchedulerEvent::TaskFailed {
            task: TaskId(5),
            reason: "timeout".to_string(),
        };
        assert_eq!(event.task(), Some(TaskId(5)));
    }
}
