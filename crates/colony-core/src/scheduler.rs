//! Scheduler facade
//!
//! Bundles the task manager, assignment engine and collaboration arbiter
//! behind one clock, and drives them together once per frame.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agent::{Agent, AgentLookup};
use crate::assignment::{AssignmentEngine, BatchAssignmentReport, TaskRecommendation};
use crate::clock::{Clock, SystemClock};
use crate::collaboration::{
    AssignmentConflict, CollaborationArbiter, CoordinationReport, EfficiencyReport, GroupStatus,
    ResourceReservation, SweepReport,
};
use crate::config::SchedulerConfig;
use crate::error::{ReservationError, Result, SchedulerError};
use crate::events::{SchedulerEvent, SubscriptionId};
use crate::manager::{TaskManager, TaskStatistics, TickSummary};
use crate::task::{TaskDefinition, TaskStatus};
use crate::types::{AgentId, Position, TaskId, Timestamp};

/// What one [`Scheduler::tick`] did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tasks: TickSummary,
    /// Present on frames where the collaboration sweep ran
    pub sweep: Option<SweepReport>,
}

/// Point-in-time overview of tasks and collaboration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub generated_at: Timestamp,
    pub tasks: TaskStatistics,
    pub collaboration: EfficiencyReport,
}

impl SchedulerReport {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    manager: TaskManager,
    engine: AssignmentEngine,
    arbiter: CollaborationArbiter,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default(), Arc::new(SystemClock))
    }

    /// All components share `clock`
    pub fn with_config(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            manager: TaskManager::with_config(&config, Arc::clone(&clock)),
            engine: AssignmentEngine::new(config.scoring.clone()),
            arbiter: CollaborationArbiter::with_config(&config, Arc::clone(&clock)),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut TaskManager {
        &mut self.manager
    }

    pub fn engine(&self) -> &AssignmentEngine {
        &self.engine
    }

    pub fn arbiter(&self) -> &CollaborationArbiter {
        &self.arbiter
    }

    pub fn arbiter_mut(&mut self) -> &mut CollaborationArbiter {
        &mut self.arbiter
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SchedulerEvent) + Send + 'static,
    {
        self.manager.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.manager.unsubscribe(id)
    }

    pub fn create_task(&mut self, definition: TaskDefinition) -> Result<TaskId> {
        self.manager.create_task(definition)
    }

    pub fn add_dependency(&mut self, dependent: TaskId, prerequisite: TaskId) -> Result<()> {
        self.manager.add_dependency(dependent, prerequisite)
    }

    pub fn cancel_task(&mut self, task: TaskId, reason: impl Into<String>) -> Result<()> {
        self.manager.cancel_task(task, reason)
    }

    pub fn assign_best_task(&mut self, agent: &dyn Agent) -> Option<TaskId> {
        self.engine.assign_best_task(&mut self.manager, agent)
    }

    pub fn assign_tasks<A: Agent>(&mut self, agents: &[A]) -> BatchAssignmentReport {
        self.engine.assign_tasks(&mut self.manager, agents)
    }

    pub fn recommendations(&self, agent: &dyn Agent, limit: usize) -> Vec<TaskRecommendation> {
        self.engine.recommendations(&self.manager, agent, limit)
    }

    /// Coordinate every task that can still take agents
    pub fn coordinate<A: Agent>(&mut self, agents: &[A]) -> CoordinationReport {
        let open: Vec<TaskId> = self
            .manager
            .tasks()
            .filter(|t| t.status().accepts_assignment() && !t.is_full())
            .map(|t| t.id())
            .collect();
        self.arbiter.coordinate(&mut self.manager, agents, &open)
    }

    /// Start Assigned tasks whose group, if they have one, is Active
    ///
    /// Returns the tasks that started.
    pub fn start_ready_tasks(&mut self) -> Vec<TaskId> {
        let ready: Vec<TaskId> = self
            .manager
            .tasks_by_status(TaskStatus::Assigned)
            .into_iter()
            .filter(|t| {
                self.arbiter
                    .group(t.id())
                    .map_or(true, |g| g.status == GroupStatus::Active)
            })
            .map(|t| t.id())
            .collect();

        let mut started = Vec::with_capacity(ready.len());
        for task in ready {
            match self.manager.start_task(task) {
                Ok(()) => started.push(task),
                Err(err) => tracing::warn!("Could not start {}: {}", task, err),
            }
        }
        started
    }

    /// Take `agent` off a task; it also leaves the task's group
    pub fn unassign_agent(&mut self, task: TaskId, agent: AgentId) -> bool {
        let removed = self.manager.unassign_agent(task, agent);
        if removed && self.arbiter.group(task).is_some_and(|g| g.contains(agent)) {
            if let Err(err) = self.arbiter.leave(&mut self.manager, task, agent) {
                tracing::warn!("{} could not leave group for {}: {}", agent, task, err);
            }
        }
        removed
    }

    /// Drop every not-yet-started assignment, group seats included, and
    /// assign again from scratch
    pub fn reassign_all<A: Agent>(&mut self, agents: &[A]) -> BatchAssignmentReport {
        let held: Vec<(TaskId, Vec<AgentId>)> = self
            .manager
            .tasks_by_status(TaskStatus::Assigned)
            .into_iter()
            .map(|task| (task.id(), task.assigned_agents().to_vec()))
            .collect();

        for (task, assigned) in held {
            for agent in assigned {
                self.unassign_agent(task, agent);
            }
        }
        self.engine.assign_tasks(&mut self.manager, agents)
    }

    /// Take `agent` off a task and out of its group
    pub fn leave_group(&mut self, task: TaskId, agent: AgentId) -> Result<GroupStatus> {
        let status = self.arbiter.leave(&mut self.manager, task, agent)?;
        self.manager.unassign_agent(task, agent);
        Ok(status)
    }

    /// Claim a cell; a refusal is also published as `ConflictDetected`
    pub fn reserve(
        &mut self,
        position: Position,
        agent: AgentId,
        resource: &str,
        duration_secs: f64,
    ) -> Result<ResourceReservation> {
        let result = self.arbiter.reserve(position, agent, resource, duration_secs);
        if let Err(SchedulerError::Reservation(ReservationError::AlreadyReserved { cell, owner })) =
            &result
        {
            let conflict = AssignmentConflict::contention(*cell, *owner, agent, self.clock.now());
            self.manager.publish(SchedulerEvent::ConflictDetected(conflict));
        }
        result
    }

    pub fn release(&mut self, position: Position, agent: AgentId) -> Result<()> {
        self.arbiter.release(position, agent)
    }

    /// Advance working tasks, then let the arbiter sweep if it is due
    pub fn tick(&mut self, dt: f64, agents: &dyn AgentLookup) -> TickReport {
        let tasks = self.manager.update_tasks(dt, agents);
        let sweep = self.arbiter.update(&self.manager, dt);
        TickReport { tasks, sweep }
    }

    pub fn report(&self) -> SchedulerReport {
        SchedulerReport {
            generated_at: self.clock.now(),
            tasks: self.manager.statistics(),
            collaboration: self.arbiter.efficiency_report(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle for multi-threaded hosts
///
/// Every operation runs under one lock, so callers never observe a
/// half-applied mutation. Listeners run while the lock is held and must not
/// call back into the same handle.
#[derive(Clone)]
pub struct SharedScheduler {
    inner: Arc<Mutex<Scheduler>>,
}

impl SharedScheduler {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scheduler)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.inner.lock()
    }

    /// Run `f` with exclusive access
    pub fn with<R>(&self, f: impl FnOnce(&mut Scheduler) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<Scheduler> for SharedScheduler {
    fn from(scheduler: Scheduler) -> Self {
        Self::new(scheduler)
    }
}
