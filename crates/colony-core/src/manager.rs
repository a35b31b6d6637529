//! Task registry and lifecycle
//!
//! [`TaskManager`] owns every runtime [`Task`], the dependency graph, the
//! work-kind factory table, the validator and the event bus. All lifecycle
//! mutations go through it so that dependency cascades and notifications
//! stay consistent:
//!
//! - creation validates, builds the task and registers its edges, or does
//!   nothing at all
//! - completion and removal promote waiting dependents to Available
//! - events are queued during a mutation and delivered once it commits

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::agent::{Agent, AgentLookup};
use crate::clock::{Clock, SystemClock};
use crate::config::{SchedulerConfig, WorkConfig};
use crate::dependency::DependencyGraph;
use crate::error::{DependencyError, Result, TaskError};
use crate::events::{panic_message, EventBus, SchedulerEvent, SubscriptionId};
use crate::task::{
    Task, TaskDefinition, TaskFactoryRegistry, TaskStatus, TaskUpdate, WorkStrategy,
};
use crate::types::{AgentId, Priority, TaskId, Timestamp, WorkKind};
use crate::validation::{TaskValidator, ValidationReport};

/// Outcome of [`TaskManager::assign_agent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub task: TaskId,
    pub agent: AgentId,
    pub success: bool,
    pub report: ValidationReport,
    pub message: String,
}

impl AssignmentResult {
    fn accepted(task: TaskId, agent: AgentId, report: ValidationReport) -> Self {
        Self {
            task,
            agent,
            success: true,
            message: format!("{} assigned to {}", agent, task),
            report,
        }
    }

    fn rejected(task: TaskId, agent: AgentId, report: ValidationReport) -> Self {
        Self {
            task,
            agent,
            success: false,
            message: format!("{} cannot take {}: {}", agent, task, report.summary()),
            report,
        }
    }
}

/// What one [`TaskManager::update_tasks`] call did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub ticked: Vec<TaskId>,
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub cancelled: Vec<TaskId>,
    pub blocked: Vec<TaskId>,
    pub resumed: Vec<TaskId>,
}

/// Aggregate counts over all tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub average_progress: f64,
    /// Completed tasks over all tasks
    pub completion_rate: f64,
}

impl TaskStatistics {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Registry of runtime tasks
pub struct TaskManager {
    tasks: BTreeMap<TaskId, Task>,
    graph: DependencyGraph,
    factories: TaskFactoryRegistry,
    validator: TaskValidator,
    work: WorkConfig,
    events: EventBus,
    pending: Vec<SchedulerEvent>,
    clock: Arc<dyn Clock>,
    next_id: u64,
}

impl TaskManager {
    /// Create a manager with default configuration and the system clock
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: BTreeMap::new(),
            graph: DependencyGraph::new(),
            factories: TaskFactoryRegistry::with_defaults(),
            validator: TaskValidator::new(config.validation.clone()),
            work: config.work.clone(),
            events: EventBus::new(),
            pending: Vec::new(),
            clock,
            next_id: 1,
        }
    }

    /// Current time according to the manager's clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn validator(&self) -> &TaskValidator {
        &self.validator
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Override or add the factory for a work kind
    pub fn register_factory<F>(&mut self, kind: WorkKind, factory: F)
    where
        F: Fn(&TaskDefinition) -> Box<dyn WorkStrategy> + Send + Sync + 'static,
    {
        self.factories.register(kind, factory);
    }

    /// Replace the whole factory table
    pub fn set_factories(&mut self, factories: TaskFactoryRegistry) {
        self.factories = factories;
    }

    /// Register an observer, invoked after each committed mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SchedulerEvent) + Send + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Queue an event and deliver everything queued so far
    pub(crate) fn publish(&mut self, event: SchedulerEvent) {
        self.pending.push(event);
        self.flush();
    }

    fn flush(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            self.events.publish(&event);
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        while self.tasks.contains_key(&TaskId(self.next_id)) {
            self.next_id += 1;
        }
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a new task
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` for a caller-supplied id already in use
    /// - `InvalidDefinition` listing every validation error
    /// - `MissingPrerequisite` when a prerequisite is unknown
    /// - `UnsupportedKind` when no factory handles the kind
    /// - a dependency error when the edges would form a cycle
    ///
    /// Nothing is registered when an error is returned.
    pub fn create_task(&mut self, definition: TaskDefinition) -> Result<TaskId> {
        if let Some(id) = definition.id {
            if self.tasks.contains_key(&id) {
                return Err(TaskError::AlreadyExists(id).into());
            }
        }

        let now = self.clock.now();
        let mut definition = definition;
        let report = self.validator.validate_definition(&definition, now);
        if !report.is_valid() {
            return Err(TaskError::InvalidDefinition {
                name: definition.name.clone(),
                issues: report.summary(),
            }
            .into());
        }

        let tasks = &self.tasks;
        let deps = self
            .validator
            .validate_dependencies(&definition, |id| tasks.contains_key(&id));
        if let Some(missing) = definition
            .prerequisites
            .iter()
            .find(|id| !self.tasks.contains_key(id))
        {
            return Err(DependencyError::MissingPrerequisite {
                name: definition.name.clone(),
                prerequisite: *missing,
            }
            .into());
        }
        if !deps.is_valid() {
            return Err(TaskError::InvalidDefinition {
                name: definition.name.clone(),
                issues: deps.summary(),
            }
            .into());
        }
        for issue in report.warnings.iter().chain(deps.warnings.iter()) {
            tracing::debug!("Task '{}': {}", definition.name, issue);
        }

        let strategy = self.factories.create(&definition)?;

        let id = match definition.id {
            Some(id) => {
                self.next_id = self.next_id.max(id.value() + 1);
                id
            }
            None => self.allocate_id(),
        };
        definition.id = Some(id);

        self.graph
            .add_task(id, &definition.prerequisites, &definition.dependents)?;

        let mut task = Task::new(id, definition, strategy, now);
        let tasks = &self.tasks;
        let executable = self
            .graph
            .can_execute(id, |t| tasks.get(&t).map(Task::status));
        if executable {
            task.make_available()?;
        }
        tracing::info!(
            "Created {} '{}' ({}, {}) as {}",
            id,
            task.name(),
            task.kind(),
            task.priority(),
            task.status()
        );

        self.pending.push(SchedulerEvent::TaskCreated {
            task: id,
            name: task.name().to_string(),
            kind: task.kind(),
        });
        if executable {
            self.pending.push(SchedulerEvent::TaskAvailable { task: id });
        }
        self.tasks.insert(id, task);

        // Existing dependents just gained an incomplete prerequisite
        for dependent in self.graph.dependents(id) {
            self.demote(dependent);
        }

        self.flush();
        Ok(id)
    }

    /// Add a dependency between two existing tasks
    ///
    /// An Available dependent whose new prerequisite is incomplete returns
    /// to Pending.
    pub fn add_dependency(&mut self, dependent: TaskId, prerequisite: TaskId) -> Result<()> {
        for id in [dependent, prerequisite] {
            if !self.tasks.contains_key(&id) {
                return Err(TaskError::NotFound(id).into());
            }
        }
        let added = self.graph.add_dependency(dependent, prerequisite)?;
        if added && self.status_of(prerequisite) != Some(TaskStatus::Completed) {
            self.demote(dependent);
        }
        self.flush();
        Ok(())
    }

    /// Remove a dependency; the dependent may become Available
    pub fn remove_dependency(&mut self, dependent: TaskId, prerequisite: TaskId) -> Result<()> {
        self.graph.remove_dependency(dependent, prerequisite)?;
        self.promote(&[dependent]);
        self.flush();
        Ok(())
    }

    fn demote(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.status() == TaskStatus::Available && task.make_pending().is_ok() {
            self.pending.push(SchedulerEvent::TaskStatusChanged {
                task: id,
                from: TaskStatus::Available,
                to: TaskStatus::Pending,
            });
        }
    }

    /// Make every Pending candidate whose prerequisites are done Available
    fn promote(&mut self, candidates: &[TaskId]) {
        for id in candidates {
            let tasks = &self.tasks;
            let ready = tasks.get(id).map(Task::status) == Some(TaskStatus::Pending)
                && self.graph.can_execute(*id, |t| tasks.get(&t).map(Task::status));
            if !ready {
                continue;
            }
            if let Some(task) = self.tasks.get_mut(id) {
                if task.make_available().is_ok() {
                    tracing::info!("{} '{}' is now available", id, task.name());
                    self.pending.push(SchedulerEvent::TaskStatusChanged {
                        task: *id,
                        from: TaskStatus::Pending,
                        to: TaskStatus::Available,
                    });
                    self.pending.push(SchedulerEvent::TaskAvailable { task: *id });
                }
            }
        }
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| TaskError::NotFound(id).into())
    }

    /// Assign an agent to a task
    ///
    /// Never fails: rejections are reported in the returned result together
    /// with the validation report.
    pub fn assign_agent(&mut self, task_id: TaskId, agent: &dyn Agent) -> AssignmentResult {
        let Some(task) = self.tasks.get_mut(&task_id) else {
            let mut report = ValidationReport::new();
            report.error("task_not_found", format!("{} does not exist", task_id));
            return AssignmentResult::rejected(task_id, agent.id(), report);
        };

        let report = self.validator.validate_assignment(task, agent);
        if !report.is_valid() {
            tracing::debug!("Rejected {} for {}: {}", agent.id(), task_id, report.summary());
            return AssignmentResult::rejected(task_id, agent.id(), report);
        }

        let before = task.status();
        if let Err(err) = task.assign(agent.id()) {
            let mut report = report;
            report.error("assignment_failed", err.to_string());
            return AssignmentResult::rejected(task_id, agent.id(), report);
        }
        let after = task.status();
        tracing::info!("Assigned {} to {} '{}'", agent.id(), task_id, task.name());

        if before != after {
            self.pending.push(SchedulerEvent::TaskStatusChanged {
                task: task_id,
                from: before,
                to: after,
            });
        }
        self.flush();
        AssignmentResult::accepted(task_id, agent.id(), report)
    }

    /// Remove an agent from a task; false if it was not assigned
    ///
    /// Group membership is kept by the arbiter; `Scheduler::unassign_agent`
    /// updates both.
    pub fn unassign_agent(&mut self, task_id: TaskId, agent: AgentId) -> bool {
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        let before = task.status();
        if !task.unassign(agent) {
            return false;
        }
        let after = task.status();
        tracing::debug!("Unassigned {} from {}", agent, task_id);
        if before != after {
            self.pending.push(SchedulerEvent::TaskStatusChanged {
                task: task_id,
                from: before,
                to: after,
            });
        }
        self.flush();
        true
    }

    /// Begin work on an Assigned task
    pub fn start_task(&mut self, id: TaskId) -> Result<()> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        task.start(now)?;
        self.pending.push(SchedulerEvent::TaskStatusChanged {
            task: id,
            from: TaskStatus::Assigned,
            to: TaskStatus::InProgress,
        });
        self.flush();
        Ok(())
    }

    /// Mark an InProgress or Blocked task completed
    pub fn complete_task(&mut self, id: TaskId) -> Result<()> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        let before = task.status();
        task.complete(now)?;
        tracing::info!("Completed {} '{}'", id, task.name());
        self.on_completed(id, before);
        self.flush();
        Ok(())
    }

    fn on_completed(&mut self, id: TaskId, before: TaskStatus) {
        self.pending.push(SchedulerEvent::TaskStatusChanged {
            task: id,
            from: before,
            to: TaskStatus::Completed,
        });
        self.pending.push(SchedulerEvent::TaskCompleted { task: id });
        let dependents = self.graph.dependents(id);
        self.promote(&dependents);
    }

    pub fn fail_task(&mut self, id: TaskId, reason: impl Into<String>) -> Result<()> {
        let now = self.clock.now();
        let reason = reason.into();
        let task = self.task_mut(id)?;
        let before = task.status();
        task.fail(reason.clone(), now)?;
        tracing::warn!("Failed {} '{}': {}", id, task.name(), reason);
        self.pending.push(SchedulerEvent::TaskStatusChanged {
            task: id,
            from: before,
            to: TaskStatus::Failed,
        });
        self.pending.push(SchedulerEvent::TaskFailed { task: id, reason });
        self.flush();
        Ok(())
    }

    pub fn cancel_task(&mut self, id: TaskId, reason: impl Into<String>) -> Result<()> {
        self.cancel_inner(id, reason.into())?;
        self.flush();
        Ok(())
    }

    fn cancel_inner(&mut self, id: TaskId, reason: String) -> Result<()> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        let before = task.status();
        task.cancel(reason.clone(), now)?;
        tracing::info!("Cancelled {} '{}': {}", id, task.name(), reason);
        self.pending.push(SchedulerEvent::TaskStatusChanged {
            task: id,
            from: before,
            to: TaskStatus::Cancelled,
        });
        self.pending.push(SchedulerEvent::TaskCancelled { task: id, reason });
        Ok(())
    }

    /// Unregister a task and return it
    ///
    /// Its edges are pruned, so former dependents may become Available.
    pub fn remove_task(&mut self, id: TaskId) -> Result<Task> {
        let task = self.tasks.remove(&id).ok_or(TaskError::NotFound(id))?;
        let dependents = self.graph.dependents(id);
        self.graph.remove_task(id);
        tracing::info!("Removed {} '{}'", id, task.name());
        self.promote(&dependents);
        self.flush();
        Ok(task)
    }

    /// Advance every working task by `dt` seconds
    ///
    /// A task whose update returns an error or panics is cancelled; the
    /// other tasks are unaffected.
    pub fn update_tasks(&mut self, dt: f64, agents: &dyn AgentLookup) -> TickSummary {
        let now = self.clock.now();
        let mut summary = TickSummary::default();
        let working: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|task| task.status().is_working())
            .map(Task::id)
            .collect();

        for id in working {
            let work = &self.work;
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };
            let before = task.status();
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| task.update(dt, agents, work, now)));
            summary.ticked.push(id);

            let fault = match outcome {
                Ok(Ok(update)) => {
                    self.record_update(id, before, update, &mut summary);
                    None
                }
                Ok(Err(err)) => Some(err.to_string()),
                Err(payload) => Some(format!("work panicked: {}", panic_message(payload.as_ref()))),
            };

            if let Some(reason) = fault {
                tracing::error!("Update of {} failed: {}", id, reason);
                match self.cancel_inner(id, reason) {
                    Ok(()) => summary.cancelled.push(id),
                    Err(err) => tracing::error!("Could not cancel {}: {}", id, err),
                }
            }
        }

        let completed = summary.completed.clone();
        for id in completed {
            let dependents = self.graph.dependents(id);
            self.promote(&dependents);
        }

        self.flush();
        summary
    }

    fn record_update(
        &mut self,
        id: TaskId,
        before: TaskStatus,
        update: TaskUpdate,
        summary: &mut TickSummary,
    ) {
        let after = self.status_of(id).unwrap_or(before);
        if before != after {
            self.pending.push(SchedulerEvent::TaskStatusChanged {
                task: id,
                from: before,
                to: after,
            });
        }
        match update {
            TaskUpdate::Completed => {
                tracing::info!("Completed {}", id);
                self.pending.push(SchedulerEvent::TaskCompleted { task: id });
                summary.completed.push(id);
            }
            TaskUpdate::Failed(reason) => {
                tracing::warn!("Failed {}: {}", id, reason);
                self.pending.push(SchedulerEvent::TaskFailed { task: id, reason });
                summary.failed.push(id);
            }
            TaskUpdate::Blocked(reason) => {
                tracing::warn!("Blocked {}: {}", id, reason);
                summary.blocked.push(id);
            }
            TaskUpdate::StillBlocked => summary.blocked.push(id),
            TaskUpdate::Resumed => {
                tracing::debug!("Resumed {}", id);
                summary.resumed.push(id);
            }
            TaskUpdate::Progressed | TaskUpdate::Idle => {}
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn status_of(&self, id: TaskId) -> Option<TaskStatus> {
        self.tasks.get(&id).map(Task::status)
    }

    /// All tasks in ascending id order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks().filter(|t| t.status() == status).collect()
    }

    pub fn tasks_by_kind(&self, kind: WorkKind) -> Vec<&Task> {
        self.tasks().filter(|t| t.kind() == kind).collect()
    }

    pub fn tasks_by_priority(&self, priority: Priority) -> Vec<&Task> {
        self.tasks().filter(|t| t.priority() == priority).collect()
    }

    /// Tasks currently holding `agent`
    pub fn tasks_for_agent(&self, agent: AgentId) -> Vec<&Task> {
        self.tasks()
            .filter(|t| !t.is_terminal() && t.is_assigned(agent))
            .collect()
    }

    /// Tasks whose prerequisites are all Completed, regardless of status
    pub fn executable_tasks(&self) -> Vec<TaskId> {
        let tasks = &self.tasks;
        self.graph
            .executable_tasks(|t| tasks.get(&t).map(Task::status))
    }

    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        Ok(self.graph.topological_order()?)
    }

    /// Longest chain of estimated durations through the graph
    pub fn critical_path(&self) -> Vec<TaskId> {
        let tasks = &self.tasks;
        self.graph.critical_path(|id| {
            tasks
                .get(&id)
                .map(|t| t.definition().estimated_duration)
                .unwrap_or(0.0)
        })
    }

    pub fn statistics(&self) -> TaskStatistics {
        let total = self.tasks.len();
        let mut by_status = BTreeMap::new();
        let mut progress = 0.0;
        for task in self.tasks.values() {
            *by_status.entry(task.status()).or_insert(0) += 1;
            progress += task.progress();
        }

        let (average_progress, completion_rate) = if total == 0 {
            (0.0, 0.0)
        } else {
            let completed = by_status.get(&TaskStatus::Completed).copied().unwrap_or(0);
            (progress / total as f64, completed as f64 / total as f64)
        };

        TaskStatistics {
            total,
            by_status,
            average_progress,
            completion_rate,
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.tasks.len())
            .field("edges", &self.graph.edge_count())
            .field("factories", &self.factories)
            .field("listeners", &self.events.len())
            .finish()
    }
}
