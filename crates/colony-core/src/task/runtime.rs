//! Runtime task
//!
//! A [`Task`] pairs a definition with mutable execution state. Every status
//! change goes through [`Task::transition_to`], which consults
//! [`TaskStatus::can_transition_to`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::AgentLookup;
use crate::config::WorkConfig;
use crate::error::TaskError;
use crate::task::definition::TaskDefinition;
use crate::task::status::TaskStatus;
use crate::task::work::{WorkContext, WorkOutcome, WorkStrategy};
use crate::types::{AgentId, Priority, TaskId, Timestamp, WorkKind};

/// What a single [`Task::update`] did
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// Task was not in a working state
    Idle,
    /// Progress moved (possibly by zero)
    Progressed,
    /// A blocked task picked up again
    Resumed,
    /// Task entered Blocked
    Blocked(String),
    /// Task stayed Blocked
    StillBlocked,
    Completed,
    Failed(String),
}

/// A definition plus its execution state
pub struct Task {
    id: TaskId,
    definition: TaskDefinition,
    status: TaskStatus,
    assigned: Vec<AgentId>,
    progress: f64,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    status_reason: Option<String>,
    strategy: Box<dyn WorkStrategy>,
}

impl Task {
    /// Create a pending task; the definition's id is overwritten with `id`
    pub fn new(
        id: TaskId,
        mut definition: TaskDefinition,
        strategy: Box<dyn WorkStrategy>,
        created_at: Timestamp,
    ) -> Self {
        definition.id = Some(id);
        Self {
            id,
            definition,
            status: TaskStatus::Pending,
            assigned: Vec::new(),
            progress: 0.0,
            created_at,
            started_at: None,
            completed_at: None,
            status_reason: None,
            strategy,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn kind(&self) -> WorkKind {
        self.definition.kind
    }

    pub fn priority(&self) -> Priority {
        self.definition.priority
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn assigned_agents(&self) -> &[AgentId] {
        &self.assigned
    }

    pub fn is_assigned(&self, agent: AgentId) -> bool {
        self.assigned.contains(&agent)
    }

    /// True when no further agent fits
    pub fn is_full(&self) -> bool {
        self.assigned.len() >= self.definition.max_assignees
    }

    /// Completion fraction in [0, 1]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    /// Why the task last blocked, failed or was cancelled
    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to a new status
    ///
    /// # Errors
    ///
    /// Returns `Err` if the transition table forbids it.
    pub fn transition_to(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("{} '{}': {} -> {}", self.id, self.name(), self.status, next);
        self.status = next;
        Ok(())
    }

    /// Prerequisites satisfied
    pub fn make_available(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Available)
    }

    /// A new incomplete prerequisite appeared
    pub fn make_pending(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Pending)
    }

    /// Add an agent; the first one moves the task to Assigned
    ///
    /// Capacity and duplicates are hard limits here. Skill checks belong to
    /// the validator.
    pub fn assign(&mut self, agent: AgentId) -> Result<(), TaskError> {
        if !self.status.accepts_assignment() {
            return Err(TaskError::InvalidStateTransition {
                from: self.status.to_string(),
                to: TaskStatus::Assigned.to_string(),
            });
        }
        if self.is_assigned(agent) {
            return Err(TaskError::AlreadyAssigned {
                task: self.id,
                agent,
            });
        }
        if self.is_full() {
            return Err(TaskError::CapacityReached {
                task: self.id,
                max: self.definition.max_assignees,
            });
        }
        if self.status == TaskStatus::Available {
            self.transition_to(TaskStatus::Assigned)?;
        }
        self.assigned.push(agent);
        Ok(())
    }

    /// Remove an agent; returns false if it was not assigned
    ///
    /// An Assigned task whose last agent leaves goes back to Available.
    pub fn unassign(&mut self, agent: AgentId) -> bool {
        let before = self.assigned.len();
        self.assigned.retain(|a| *a != agent);
        if self.assigned.len() == before {
            return false;
        }
        if self.assigned.is_empty() && self.status == TaskStatus::Assigned {
            // Assigned -> Available is in the table, so this cannot fail
            let _ = self.transition_to(TaskStatus::Available);
        }
        true
    }

    /// Begin work
    pub fn start(&mut self, now: Timestamp) -> Result<(), TaskError> {
        if self.status != TaskStatus::Assigned {
            return Err(TaskError::InvalidStateTransition {
                from: self.status.to_string(),
                to: TaskStatus::InProgress.to_string(),
            });
        }
        if self.assigned.is_empty() {
            return Err(TaskError::NoAssignedAgents(self.id));
        }
        self.transition_to(TaskStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Mark the work done
    pub fn complete(&mut self, now: Timestamp) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Completed)?;
        self.progress = 1.0;
        self.completed_at = Some(now);
        self.status_reason = None;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Failed)?;
        self.completed_at = Some(now);
        self.status_reason = Some(reason.into());
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Cancelled)?;
        self.completed_at = Some(now);
        self.status_reason = Some(reason.into());
        Ok(())
    }

    /// Advance a working task by `dt` seconds
    ///
    /// Timeouts are checked before progress: exceeding `max_duration` since
    /// start or passing the deadline fails the task. A Blocked task runs its
    /// strategy like any other and resumes as soon as progress is reported.
    pub fn update(
        &mut self,
        dt: f64,
        agents: &dyn AgentLookup,
        config: &WorkConfig,
        now: Timestamp,
    ) -> Result<TaskUpdate, TaskError> {
        if !self.status.is_working() {
            return Ok(TaskUpdate::Idle);
        }

        if let Some(reason) = self.timeout_reason(now) {
            self.fail(reason.clone(), now)?;
            return Ok(TaskUpdate::Failed(reason));
        }

        let outcome = {
            let ctx = WorkContext {
                task: self.id,
                definition: &self.definition,
                assigned: &self.assigned,
                agents,
                progress: self.progress,
                dt,
                config,
            };
            self.strategy.perform(&ctx)?
        };

        match outcome {
            WorkOutcome::InProgress(delta) => {
                if !delta.is_finite() {
                    return Err(TaskError::WorkFailed {
                        task: self.id,
                        reason: format!("{} strategy reported progress {}", self.strategy.name(), delta),
                    });
                }
                self.progress = (self.progress + delta.max(0.0)).clamp(0.0, 1.0);
                if self.progress >= 1.0 {
                    self.complete(now)?;
                    return Ok(TaskUpdate::Completed);
                }
                if self.status == TaskStatus::Blocked && delta > 0.0 {
                    self.transition_to(TaskStatus::InProgress)?;
                    self.status_reason = None;
                    return Ok(TaskUpdate::Resumed);
                }
                if self.status == TaskStatus::Blocked {
                    return Ok(TaskUpdate::StillBlocked);
                }
                Ok(TaskUpdate::Progressed)
            }
            WorkOutcome::Success => {
                self.complete(now)?;
                Ok(TaskUpdate::Completed)
            }
            WorkOutcome::Failure(reason) => {
                self.fail(reason.clone(), now)?;
                Ok(TaskUpdate::Failed(reason))
            }
            WorkOutcome::Blocked(reason) => {
                if self.status == TaskStatus::Blocked {
                    self.status_reason = Some(reason);
                    return Ok(TaskUpdate::StillBlocked);
                }
                self.transition_to(TaskStatus::Blocked)?;
                self.status_reason = Some(reason.clone());
                Ok(TaskUpdate::Blocked(reason))
            }
        }
    }

    fn timeout_reason(&self, now: Timestamp) -> Option<String> {
        if let Some(started) = self.started_at {
            let elapsed = (now - started).num_milliseconds() as f64 / 1000.0;
            if elapsed > self.definition.max_duration {
                return Some(format!(
                    "exceeded maximum duration of {}s",
                    self.definition.max_duration
                ));
            }
        }
        match self.definition.deadline {
            Some(deadline) if now > deadline => Some(format!("missed deadline {}", deadline)),
            _ => None,
        }
    }

    /// Plain-data view of the task
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.definition.name.clone(),
            kind: self.definition.kind,
            priority: self.definition.priority,
            status: self.status,
            progress: self.progress,
            assigned: self.assigned.clone(),
            reason: self.status_reason.clone(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.definition.name)
            .field("kind", &self.definition.kind)
            .field("status", &self.status)
            .field("assigned", &self.assigned)
            .field("progress", &self.progress)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// Serializable summary of a task's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub kind: WorkKind,
    pub priority: Priority,
    pub status: TaskStatus,
    pub progress: f64,
    pub assigned: Vec<AgentId>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::task::work::{GenericWork, MiningWork};
    use crate::types::SkillKind;
    use chrono::Duration;

    fn generic_task(duration: f64, max_assignees: usize) -> Task {
        let def = TaskDefinition::builder("Haul", WorkKind::Generic)
            .duration(duration)
            .max_assignees(max_assignees)
            .build();
        Task::new(TaskId(1), def, Box::new(GenericWork), crate::types::now())
    }

    #[test]
    fn test_new_task_is_pending_with_id() {
        let task = generic_task(10.0, 1);
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.definition().id, Some(TaskId(1)));
    }

    #[test]
    fn test_assign_respects_capacity() {
        let mut task = generic_task(10.0, 1);
        task.make_available().unwrap();

        task.assign(AgentId(1)).unwrap();
        assert_eq!(task.status(), TaskStatus::Assigned);
        assert!(task.assign(AgentId(2)).is_err());
        assert!(task.assign(AgentId(1)).is_err());
        assert_eq!(task.assigned_agents(), &[AgentId(1)]);
    }

    #[test]
    fn test_last_unassign_returns_to_available() {
        let mut task = generic_task(10.0, 2);
        task.make_available().unwrap();
        task.assign(AgentId(1)).unwrap();

        assert!(!task.unassign(AgentId(7)));
        assert!(task.unassign(AgentId(1)));
        assert_eq!(task.status(), TaskStatus::Available);
    }

    #[test]
    fn test_start_requires_assigned() {
        let mut task = generic_task(10.0, 1);
        let now = crate::types::now();
        task.make_available().unwrap();
        assert!(task.start(now).is_err());

        task.assign(AgentId(1)).unwrap();
        task.start(now).unwrap();
        assert_eq!(task.status(), TaskStatus::InProgress);
        assert_eq!(task.started_at(), Some(now));
    }

    #[test]
    fn test_update_completes_and_clamps_progress() {
        let roster = vec![AgentProfile::new(1)];
        let config = WorkConfig::default();
        let mut task = generic_task(1.0, 1);
        let now = crate::types::now();
        task.make_available().unwrap();
        task.assign(AgentId(1)).unwrap();
        task.start(now).unwrap();

        let update = task.update(0.5, &roster, &config, now).unwrap();
        assert_eq!(update, TaskUpdate::Progressed);
        assert!((task.progress() - 0.5).abs() < 1e-9);

        let update = task.update(5.0, &roster, &config, now).unwrap();
        assert_eq!(update, TaskUpdate::Completed);
        assert_eq!(task.progress(), 1.0);
        assert_eq!(task.completed_at(), Some(now));
    }

    #[test]
    fn test_timeout_fails_before_progress() {
        let roster = vec![AgentProfile::new(1)];
        let config = WorkConfig::default();
        let def = TaskDefinition::builder("Slow", WorkKind::Generic)
            .duration(100.0)
            .max_duration(150.0)
            .build();
        let start = crate::types::now();
        let mut task = Task::new(TaskId(1), def, Box::new(GenericWork), start);
        task.make_available().unwrap();
        task.assign(AgentId(1)).unwrap();
        task.start(start).unwrap();

        let later = start + Duration::seconds(151);
        let update = task.update(1.0, &roster, &config, later).unwrap();
        assert!(matches!(update, TaskUpdate::Failed(reason) if reason.contains("maximum duration")));
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.progress(), 0.0);
    }

    #[test]
    fn test_blocked_task_resumes_when_worker_qualifies() {
        let config = WorkConfig::default();
        let def = TaskDefinition::builder("Dig", WorkKind::Mining)
            .requires(SkillKind::Mining, 2, 1.0)
            .duration(10.0)
            .build();
        let now = crate::types::now();
        let mut task = Task::new(TaskId(1), def, Box::new(MiningWork), now);
        task.make_available().unwrap();
        task.assign(AgentId(1)).unwrap();
        task.start(now).unwrap();

        let untrained = vec![AgentProfile::new(1)];
        let update = task.update(1.0, &untrained, &config, now).unwrap();
        assert!(matches!(update, TaskUpdate::Blocked(_)));
        assert_eq!(task.status(), TaskStatus::Blocked);
        assert!(task.status_reason().is_some());

        let update = task.update(1.0, &untrained, &config, now).unwrap();
        assert_eq!(update, TaskUpdate::StillBlocked);

        let trained = vec![AgentProfile::new(1).with_skill(SkillKind::Mining, 5)];
        let update = task.update(1.0, &trained, &config, now).unwrap();
        assert_eq!(update, TaskUpdate::Resumed);
        assert_eq!(task.status(), TaskStatus::InProgress);
        assert!(task.progress() > 0.0);
    }

    #[test]
    fn test_cancel_is_final() {
        let mut task = generic_task(10.0, 1);
        let now = crate::types::now();
        task.cancel("no longer needed", now).unwrap();
        assert_eq!(task.status_reason(), Some("no longer needed"));
        assert!(task.make_available().is_err());
        assert!(task.cancel("again", now).is_err());
    }
}
