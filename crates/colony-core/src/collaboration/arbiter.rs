//! Collaboration and conflict arbiter
//!
//! Forms groups around multi-agent tasks, decides who may join them, keeps
//! the cell reservation table, and runs coordination passes that plan,
//! de-conflict and commit assignments in one go.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::assignment::TaskScorer;
use crate::clock::{Clock, SystemClock};
use crate::collaboration::conflict::{AssignmentConflict, ConflictKind, ConflictResolution};
use crate::collaboration::group::{
    CollaborationGroup, CollaborationRole, CollaborationType, GroupStatus,
};
use crate::collaboration::report::{CoordinationReport, EfficiencyReport, SweepReport};
use crate::collaboration::reservation::{ReservationTable, ResourceReservation};
use crate::config::{CollaborationConfig, SchedulerConfig};
use crate::error::{CollaborationError, Result, SchedulerError, TaskError};
use crate::events::SchedulerEvent;
use crate::manager::TaskManager;
use crate::task::TaskStatus;
use crate::types::{AgentId, Position, TaskId, Timestamp};

pub struct CollaborationArbiter {
    config: CollaborationConfig,
    scorer: TaskScorer,
    groups: BTreeMap<TaskId, CollaborationGroup>,
    reservations: ReservationTable,
    clock: Arc<dyn Clock>,
    since_sweep: f64,
}

/// An assignment chosen during planning, not yet committed
#[derive(Debug, Clone, Copy)]
struct Planned {
    task: TaskId,
    agent: AgentId,
    score: f64,
}

impl CollaborationArbiter {
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: config.collaboration.clone(),
            scorer: TaskScorer::new(config.scoring.clone()),
            groups: BTreeMap::new(),
            reservations: ReservationTable::new(),
            clock,
            since_sweep: 0.0,
        }
    }

    pub fn config(&self) -> &CollaborationConfig {
        &self.config
    }

    /// Open a group for an existing task
    ///
    /// Capacity, required skills and target are copied from the task's
    /// definition.
    pub fn create_group(
        &mut self,
        manager: &TaskManager,
        task: TaskId,
        kind: CollaborationType,
    ) -> Result<&CollaborationGroup> {
        let runtime = manager.task(task).ok_or(TaskError::NotFound(task))?;
        if self.groups.contains_key(&task) {
            return Err(CollaborationError::GroupExists(task).into());
        }

        let def = runtime.definition();
        let group = CollaborationGroup::new(
            task,
            kind,
            def.max_assignees,
            def.skill_requirements.clone(),
            def.target,
            self.clock.now(),
        );
        tracing::info!("Formed {} group for {} '{}'", kind, task, def.name);
        Ok(self.groups.entry(task).or_insert(group))
    }

    /// Add an agent to a group
    ///
    /// Returns the group's status afterwards. A Forming or Suspended group
    /// whose minimum size and required role are now both satisfied becomes
    /// Active.
    pub fn join(
        &mut self,
        manager: &TaskManager,
        task: TaskId,
        agent: AgentId,
        role: CollaborationRole,
    ) -> Result<GroupStatus> {
        let group = self
            .groups
            .get(&task)
            .ok_or(CollaborationError::GroupNotFound(task))?;

        let task_closed = manager.status_of(task).map_or(true, TaskStatus::is_terminal);
        if group.is_closed() || task_closed {
            return Err(CollaborationError::GroupClosed(task).into());
        }
        if group.contains(agent) {
            return Err(CollaborationError::AlreadyJoined { task, agent }.into());
        }
        if group.is_full() {
            return Err(CollaborationError::GroupFull {
                task,
                max: group.max_participants,
            }
            .into());
        }
        if role == CollaborationRole::Leader && group.leader().is_some() {
            return Err(CollaborationError::LeaderTaken(task).into());
        }
        if let Some(other) = self.conflicting_group(group, agent) {
            tracing::warn!("{} cannot join group for {}: clashes with {}", agent, task, other);
            return Err(CollaborationError::ConflictingGroup { agent, other }.into());
        }

        let now = self.clock.now();
        let table = &self.config.min_participants;
        let group = self
            .groups
            .get_mut(&task)
            .ok_or(CollaborationError::GroupNotFound(task))?;
        group.add(agent, role, now);
        tracing::debug!("{} joined {} group for {} as {}", agent, group.kind, task, role);

        if matches!(group.status, GroupStatus::Forming | GroupStatus::Suspended)
            && group.meets_activation_rules(table)
        {
            group.status = GroupStatus::Active;
            tracing::info!("Group for {} active with {} agents", task, group.size());
        }
        Ok(group.status)
    }

    /// Another open group holding `agent` that clashes with `group`
    fn conflicting_group(&self, group: &CollaborationGroup, agent: AgentId) -> Option<TaskId> {
        self.groups
            .values()
            .filter(|other| other.task != group.task && !other.is_closed() && other.contains(agent))
            .find(|other| {
                let both_active =
                    group.status == GroupStatus::Active && other.status == GroupStatus::Active;
                let too_close = match (group.target, other.target) {
                    (Some(a), Some(b)) => a.distance_to(&b) <= self.config.spatial_conflict_distance,
                    _ => false,
                };
                both_active || too_close
            })
            .map(|other| other.task)
    }

    /// Remove an agent from a group
    ///
    /// An Active group that drops below its minimum is Suspended and a
    /// [`SchedulerEvent::GroupSuspended`] is published through `manager`.
    pub fn leave(
        &mut self,
        manager: &mut TaskManager,
        task: TaskId,
        agent: AgentId,
    ) -> Result<GroupStatus> {
        let table = &self.config.min_participants;
        let group = self
            .groups
            .get_mut(&task)
            .ok_or(CollaborationError::GroupNotFound(task))?;
        if !group.remove(agent) {
            return Err(CollaborationError::NotParticipant { task, agent }.into());
        }
        tracing::debug!("{} left group for {}", agent, task);

        if group.status == GroupStatus::Active && group.size() < group.kind.min_participants(table)
        {
            group.status = GroupStatus::Suspended;
            tracing::warn!("Group for {} suspended with {} agents", task, group.size());
            let remaining = group.agents();
            manager.publish(SchedulerEvent::GroupSuspended { task, remaining });
        }
        Ok(group.status)
    }

    /// Claim the cell containing `position`
    pub fn reserve(
        &mut self,
        position: Position,
        agent: AgentId,
        resource: &str,
        duration_secs: f64,
    ) -> Result<ResourceReservation> {
        let now = self.clock.now();
        self.reservations
            .reserve(position, agent, resource, duration_secs, now)
            .map_err(|err| {
                tracing::warn!("Reservation by {} rejected: {}", agent, err);
                err.into()
            })
    }

    /// Reserve for the configured default lifetime
    pub fn reserve_default(
        &mut self,
        position: Position,
        agent: AgentId,
        resource: &str,
    ) -> Result<ResourceReservation> {
        let duration = self.config.default_reservation_secs;
        self.reserve(position, agent, resource, duration)
    }

    pub fn release(&mut self, position: Position, agent: AgentId) -> Result<()> {
        let now = self.clock.now();
        self.reservations.release(position, agent, now)?;
        tracing::debug!("{} released {}", agent, position.cell());
        Ok(())
    }

    /// Live reservations of other agents within `radius` of `position`'s cell
    pub fn check_resource_conflict(
        &self,
        position: Position,
        agent: AgentId,
        radius: f64,
    ) -> Vec<ResourceReservation> {
        self.reservations
            .conflicts(position, agent, radius, self.clock.now())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn reservations(&self) -> &ReservationTable {
        &self.reservations
    }

    /// Plan, de-conflict and commit assignments for `tasks`
    ///
    /// 1. Tasks open for assignment are visited by priority, then id.
    /// 2. Each takes its best-scoring idle, eligible agents up to capacity.
    /// 3. An agent planned for several tasks keeps only its best-scored one.
    /// 4. Survivors are assigned through the manager and join the task's
    ///    group, created on demand for multi-agent tasks. The first joiner
    ///    leads; a Specialist is named next where the group type needs one.
    ///    Workers fill the group to its minimum and later joiners support.
    /// 5. Groups still missing their required role are reported unresolved.
    ///
    /// Always completes. Every conflict is also published as
    /// [`SchedulerEvent::ConflictDetected`].
    pub fn coordinate<A: Agent>(
        &mut self,
        manager: &mut TaskManager,
        agents: &[A],
        tasks: &[TaskId],
    ) -> CoordinationReport {
        let now = self.clock.now();
        let mut report = CoordinationReport::default();

        let mut open: Vec<(TaskId, usize)> = tasks
            .iter()
            .filter_map(|id| manager.task(*id))
            .filter(|t| t.status().accepts_assignment() && !t.is_full())
            .map(|t| (t.id(), t.definition().max_assignees - t.assigned_agents().len()))
            .collect();
        open.sort_by_key(|(id, _)| (manager.task(*id).map(|t| t.priority()), *id));
        open.dedup_by_key(|(id, _)| *id);

        let idle: Vec<&A> = agents
            .iter()
            .filter(|a| manager.tasks_for_agent(a.id()).is_empty())
            .collect();

        let mut plan: Vec<Planned> = Vec::new();
        for (task_id, slots) in &open {
            let Some(task) = manager.task(*task_id) else {
                continue;
            };
            let mut ranked: Vec<Planned> = idle
                .iter()
                .filter(|a| manager.validator().validate_assignment(task, **a).is_valid())
                .map(|a| Planned {
                    task: *task_id,
                    agent: a.id(),
                    score: self.scorer.score(task.definition(), *a, now).total,
                })
                .collect();
            ranked.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then(a.agent.cmp(&b.agent))
            });
            plan.extend(ranked.into_iter().take(*slots));
        }

        let plan = self.resolve_overassignment(plan, now, &mut report);

        for (task_id, _) in &open {
            let planned: Vec<&A> = plan
                .iter()
                .filter(|p| p.task == *task_id)
                .filter_map(|p| idle.iter().find(|a| a.id() == p.agent).copied())
                .collect();
            if !planned.is_empty() {
                self.commit_task(manager, *task_id, &planned, &mut report);
            }
        }

        for conflict in &report.conflicts {
            tracing::warn!(
                "Conflict {:?} for {:?} on {:?}: {:?}",
                conflict.kind,
                conflict.agents,
                conflict.tasks,
                conflict.resolution
            );
            manager.publish(SchedulerEvent::ConflictDetected(conflict.clone()));
        }
        tracing::info!(
            "Coordination committed {} assignments with {} conflicts",
            report.assignments.len(),
            report.conflicts.len()
        );
        report
    }

    /// Keep each agent's best-scored plan entry, recording what was dropped
    fn resolve_overassignment(
        &self,
        plan: Vec<Planned>,
        now: Timestamp,
        report: &mut CoordinationReport,
    ) -> Vec<Planned> {
        let mut by_agent: BTreeMap<AgentId, Vec<Planned>> = BTreeMap::new();
        for p in &plan {
            by_agent.entry(p.agent).or_default().push(*p);
        }

        let mut dropped: Vec<(AgentId, TaskId)> = Vec::new();
        for (agent, entries) in by_agent.iter().filter(|(_, e)| e.len() > 1) {
            // strict comparison: on a tie the more urgent task, planned first, wins
            let kept = entries
                .iter()
                .skip(1)
                .fold(entries[0], |best, p| if p.score > best.score { *p } else { best });
            let losers: Vec<TaskId> = entries
                .iter()
                .filter(|p| p.task != kept.task)
                .map(|p| p.task)
                .collect();
            dropped.extend(losers.iter().map(|t| (*agent, *t)));

            report.conflicts.push(AssignmentConflict::new(
                ConflictKind::CharacterOverassignment,
                vec![*agent],
                entries.iter().map(|p| p.task).collect(),
                now,
                ConflictResolution::KeepHighestScore {
                    agent: *agent,
                    kept: kept.task,
                    dropped: losers,
                },
            ));
        }

        plan.into_iter()
            .filter(|p| !dropped.contains(&(p.agent, p.task)))
            .collect()
    }

    fn commit_task<A: Agent>(
        &mut self,
        manager: &mut TaskManager,
        task: TaskId,
        agents: &[&A],
        report: &mut CoordinationReport,
    ) {
        let Some((kind, collaborative)) = manager
            .task(task)
            .map(|t| (CollaborationType::from(t.kind()), t.definition().is_collaborative()))
        else {
            return;
        };

        if collaborative && !self.groups.contains_key(&task) {
            match self.create_group(manager, task, kind) {
                Ok(_) => report.groups_created.push(task),
                Err(err) => tracing::warn!("Could not form group for {}: {}", task, err),
            }
        }
        let grouped = self.groups.contains_key(&task);

        for agent in agents {
            let id = agent.id();
            let result = manager.assign_agent(task, *agent);
            if !result.success {
                tracing::debug!("{}", result.message);
                continue;
            }

            if grouped {
                let role = self.next_role(task);
                if let Err(err) = self.join(manager, task, id, role) {
                    manager.unassign_agent(task, id);
                    let kind = match err {
                        SchedulerError::Collaboration(CollaborationError::ConflictingGroup {
                            other,
                            ..
                        }) => ConflictKind::SpatialConflict { other },
                        _ => ConflictKind::CharacterOverassignment,
                    };
                    report.conflicts.push(AssignmentConflict::new(
                        kind,
                        vec![id],
                        vec![task],
                        self.clock.now(),
                        ConflictResolution::Rejected { agent: id, task },
                    ));
                    continue;
                }
            }
            report.assignments.push((id, task));
        }

        let Some(group) = self.groups.get(&task) else {
            return;
        };
        if let Some(role) = group.kind.required_role() {
            if !group.has_role(role) {
                report.conflicts.push(AssignmentConflict::new(
                    ConflictKind::MissingRole { role },
                    group.agents(),
                    vec![task],
                    self.clock.now(),
                    ConflictResolution::Unresolved {
                        reason: format!("{} group for {} has no {}", group.kind, task, role),
                    },
                ));
            }
        }
    }

    /// Role for the next agent joining `task`'s group
    fn next_role(&self, task: TaskId) -> CollaborationRole {
        let Some(group) = self.groups.get(&task) else {
            return CollaborationRole::Worker;
        };
        if group.leader().is_none() {
            CollaborationRole::Leader
        } else if group.kind.required_role() == Some(CollaborationRole::Specialist)
            && !group.has_role(CollaborationRole::Specialist)
        {
            CollaborationRole::Specialist
        } else if group.size() < group.kind.min_participants(&self.config.min_participants) {
            CollaborationRole::Worker
        } else {
            // the group already has the hands it needs
            CollaborationRole::Support
        }
    }

    /// Advance the sweep timer; sweeps once `sweep_interval_secs` has built up
    pub fn update(&mut self, manager: &TaskManager, dt: f64) -> Option<SweepReport> {
        if dt.is_finite() && dt > 0.0 {
            self.since_sweep += dt;
        }
        if self.since_sweep < self.config.sweep_interval_secs {
            return None;
        }
        self.since_sweep = 0.0;
        Some(self.sweep(manager))
    }

    /// Close groups whose task has ended and purge dead reservations
    pub fn sweep(&mut self, manager: &TaskManager) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for group in self.groups.values_mut().filter(|g| !g.is_closed()) {
            let outcome = match manager.status_of(group.task) {
                Some(TaskStatus::Completed) => GroupStatus::Completed,
                Some(TaskStatus::Failed | TaskStatus::Cancelled) | None => GroupStatus::Failed,
                Some(_) => continue,
            };
            group.close(outcome, now);
            tracing::info!("Closed group for {} as {}", group.task, outcome);
            match outcome {
                GroupStatus::Completed => report.completed_groups.push(group.task),
                _ => report.failed_groups.push(group.task),
            }
        }

        report.purged_reservations = self.reservations.purge(now);
        if report.purged_reservations > 0 {
            tracing::debug!("Purged {} reservations", report.purged_reservations);
        }
        report
    }

    pub fn group(&self, task: TaskId) -> Option<&CollaborationGroup> {
        self.groups.get(&task)
    }

    /// All groups, open and closed, by task id
    pub fn groups(&self) -> impl Iterator<Item = &CollaborationGroup> {
        self.groups.values()
    }

    /// The open group `agent` participates in, if any
    pub fn group_for_agent(&self, agent: AgentId) -> Option<&CollaborationGroup> {
        self.groups
            .values()
            .find(|g| !g.is_closed() && g.contains(agent))
    }

    pub fn efficiency_report(&self) -> EfficiencyReport {
        let now = self.clock.now();
        let count = |status: GroupStatus| self.groups.values().filter(|g| g.status == status).count();

        let total_groups = self.groups.len();
        let completed_groups = count(GroupStatus::Completed);
        let failed_groups = count(GroupStatus::Failed);
        let suspended_groups = count(GroupStatus::Suspended);
        let forming = count(GroupStatus::Forming);
        let closed = completed_groups + failed_groups;

        let completion_rate = if closed > 0 {
            completed_groups as f64 / closed as f64
        } else {
            0.0
        };
        let average_group_size = if total_groups > 0 {
            self.groups.values().map(|g| g.peak_size).sum::<usize>() as f64 / total_groups as f64
        } else {
            0.0
        };
        let tracked = self.reservations.len();
        let resource_utilization = if tracked > 0 {
            self.reservations.live_count(now) as f64 / tracked as f64
        } else {
            0.0
        };

        let mut recommendations = Vec::new();
        if suspended_groups > 0 {
            recommendations.push(format!(
                "{} suspended group(s) need more participants",
                suspended_groups
            ));
        }
        if forming > 0 {
            recommendations.push(format!(
                "{} group(s) still forming; check role and size requirements",
                forming
            ));
        }
        if closed > 0 && completion_rate < 0.5 {
            recommendations
                .push("Fewer than half of closed groups completed their task".to_string());
        }
        if tracked > 0 && resource_utilization < 0.5 {
            recommendations.push(
                "Most tracked reservations are stale; consider a shorter reservation lifetime"
                    .to_string(),
            );
        }
        if recommendations.is_empty() {
            recommendations.push("Collaboration is running smoothly".to_string());
        }

        EfficiencyReport {
            total_groups,
            open_groups: total_groups - closed,
            suspended_groups,
            completed_groups,
            failed_groups,
            completion_rate,
            average_group_size,
            resource_utilization,
            recommendations,
        }
    }
}

impl Default for CollaborationArbiter {
    fn default() -> Self {
        Self::new()
    }
}
