//! Assignment engine
//!
//! Matches agents to Available tasks by score. Assignment itself always goes
//! through [`TaskManager::assign_agent`], so the engine never bypasses
//! validation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::agent::Agent;
use crate::assignment::scoring::{ScoreBreakdown, TaskScorer};
use crate::config::ScoringConfig;
use crate::manager::TaskManager;
use crate::task::{Task, TaskStatus};
use crate::types::{AgentId, Priority, SkillKind, TaskId};

/// A scored, not yet committed, suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecommendation {
    pub task: TaskId,
    pub name: String,
    pub score: ScoreBreakdown,
    pub justification: String,
}

/// Outcome of a batch assignment pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchAssignmentReport {
    /// Agent -> task pairs that were committed
    pub assignments: Vec<(AgentId, TaskId)>,
    /// Agents left without work
    pub unassigned: Vec<AgentId>,
    /// Agents skipped because they already hold a live task
    pub busy: Vec<AgentId>,
}

impl BatchAssignmentReport {
    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn task_for(&self, agent: AgentId) -> Option<TaskId> {
        self.assignments
            .iter()
            .find(|(a, _)| *a == agent)
            .map(|(_, t)| *t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentEngine {
    scorer: TaskScorer,
}

impl AssignmentEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            scorer: TaskScorer::new(config),
        }
    }

    pub fn scorer(&self) -> &TaskScorer {
        &self.scorer
    }

    /// Available tasks `agent` could take, best first
    ///
    /// Ordered by total score descending, then priority, then id.
    pub fn candidates<'m>(
        &self,
        manager: &'m TaskManager,
        agent: &dyn Agent,
    ) -> Vec<(&'m Task, ScoreBreakdown)> {
        let now = manager.now();
        let validator = manager.validator();

        let mut scored: Vec<(&Task, ScoreBreakdown)> = manager
            .tasks()
            .filter(|task| task.status() == TaskStatus::Available)
            .filter(|task| !task.is_full() && !task.is_assigned(agent.id()))
            .filter(|task| validator.validate_skills(task.definition(), agent).is_valid())
            .map(|task| (task, self.scorer.score(task.definition(), agent, now)))
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.total
                .partial_cmp(&sa.total)
                .unwrap_or(Ordering::Equal)
                .then(a.priority().cmp(&b.priority()))
                .then(a.id().cmp(&b.id()))
        });
        scored
    }

    /// Assign `agent` to its best feasible task
    ///
    /// Candidates are tried in order; the first that the manager accepts
    /// wins.
    pub fn assign_best_task(&self, manager: &mut TaskManager, agent: &dyn Agent) -> Option<TaskId> {
        let ranked: Vec<TaskId> = self
            .candidates(manager, agent)
            .into_iter()
            .map(|(task, _)| task.id())
            .collect();

        for task in ranked {
            if manager.assign_agent(task, agent).success {
                return Some(task);
            }
        }
        tracing::debug!("No feasible task for {}", agent.id());
        None
    }

    /// Give every idle agent its best task
    ///
    /// Higher-skilled agents pick first. Agents already holding a live task
    /// are skipped. Always completes; the report lists who got what.
    pub fn assign_tasks<A: Agent>(
        &self,
        manager: &mut TaskManager,
        agents: &[A],
    ) -> BatchAssignmentReport {
        let mut order: Vec<&A> = agents.iter().collect();
        order.sort_by(|a, b| {
            b.average_skill()
                .partial_cmp(&a.average_skill())
                .unwrap_or(Ordering::Equal)
                .then(a.id().cmp(&b.id()))
        });

        let mut report = BatchAssignmentReport::default();
        for agent in order {
            if !manager.tasks_for_agent(agent.id()).is_empty() {
                report.busy.push(agent.id());
                continue;
            }
            match self.assign_best_task(manager, agent) {
                Some(task) => report.assignments.push((agent.id(), task)),
                None => report.unassigned.push(agent.id()),
            }
        }

        if !report.assignments.is_empty() {
            tracing::info!(
                "Batch assignment: {} assigned, {} idle, {} busy",
                report.assignments.len(),
                report.unassigned.len(),
                report.busy.len()
            );
        }
        report
    }

    /// Scored suggestions for `agent` without committing anything
    pub fn recommendations(
        &self,
        manager: &TaskManager,
        agent: &dyn Agent,
        limit: usize,
    ) -> Vec<TaskRecommendation> {
        self.candidates(manager, agent)
            .into_iter()
            .take(limit)
            .map(|(task, score)| TaskRecommendation {
                task: task.id(),
                name: task.name().to_string(),
                justification: justify(task, agent, &score),
                score,
            })
            .collect()
    }

    /// Drop every not-yet-started assignment and assign again from scratch
    ///
    /// Collaboration groups are not touched here; `Scheduler::reassign_all`
    /// also clears the dropped agents' group seats.
    pub fn reassign_all<A: Agent>(
        &self,
        manager: &mut TaskManager,
        agents: &[A],
    ) -> BatchAssignmentReport {
        let held: Vec<(TaskId, Vec<AgentId>)> = manager
            .tasks_by_status(TaskStatus::Assigned)
            .into_iter()
            .map(|task| (task.id(), task.assigned_agents().to_vec()))
            .collect();

        for (task, assigned) in held {
            for agent in assigned {
                manager.unassign_agent(task, agent);
            }
        }
        self.assign_tasks(manager, agents)
    }
}

fn justify(task: &Task, agent: &dyn Agent, score: &ScoreBreakdown) -> String {
    let tier = match task.priority() {
        Priority::Critical => "critical priority",
        Priority::High => "high priority",
        Priority::Normal => "normal priority",
        Priority::Low => "low priority",
        Priority::Idle => "idle-time work",
    };

    let best_skill = task
        .definition()
        .skill_requirements
        .iter()
        .map(|req| (req.skill, agent.skill_level(req.skill)))
        .max_by_key(|(_, level)| *level);
    let skill = match best_skill {
        Some((kind, level)) => format!("{} {}", skill_name(kind), level),
        None => "no special skills needed".to_string(),
    };

    let proximity = match task.definition().target {
        Some(target) => format!("{:.1} away", agent.position().distance_to(&target)),
        None => "no fixed location".to_string(),
    };

    format!("{}; {}; {} (score {:.1})", tier, skill, proximity, score.total)
}

fn skill_name(kind: SkillKind) -> String {
    kind.to_string().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::task::TaskDefinition;
    use crate::types::{Position, WorkKind};

    fn def(name: &str, priority: Priority) -> TaskDefinition {
        TaskDefinition::builder(name, WorkKind::Generic)
            .priority(priority)
            .build()
    }

    #[test]
    fn test_best_task_prefers_priority() {
        let mut manager = TaskManager::new();
        let engine = AssignmentEngine::default();
        manager.create_task(def("Tidy", Priority::Low)).unwrap();
        let urgent = manager.create_task(def("Fire", Priority::Critical)).unwrap();

        let agent = AgentProfile::new(1);
        assert_eq!(engine.assign_best_task(&mut manager, &agent), Some(urgent));
    }

    #[test]
    fn test_infeasible_tasks_are_skipped() {
        let mut manager = TaskManager::new();
        let engine = AssignmentEngine::default();
        manager
            .create_task(
                TaskDefinition::builder("Lab", WorkKind::Research)
                    .priority(Priority::Critical)
                    .requires(SkillKind::Research, 10, 1.0)
                    .build(),
            )
            .unwrap();
        let haul = manager.create_task(def("Haul", Priority::Low)).unwrap();

        let agent = AgentProfile::new(1).with_skill(SkillKind::Research, 2);
        assert_eq!(engine.assign_best_task(&mut manager, &agent), Some(haul));
    }

    #[test]
    fn test_ties_break_by_id() {
        let mut manager = TaskManager::new();
        let engine = AssignmentEngine::default();
        let first = manager.create_task(def("A", Priority::Normal)).unwrap();
        manager.create_task(def("B", Priority::Normal)).unwrap();

        let agent = AgentProfile::new(1);
        assert_eq!(engine.assign_best_task(&mut manager, &agent), Some(first));
    }

    #[test]
    fn test_batch_orders_agents_by_skill() {
        let mut manager = TaskManager::new();
        let engine = AssignmentEngine::default();
        let best = manager.create_task(def("Best", Priority::High)).unwrap();
        let rest = manager.create_task(def("Rest", Priority::Low)).unwrap();

        let agents = vec![
            AgentProfile::new(1),
            AgentProfile::new(2).with_skill(SkillKind::Crafting, 12),
            AgentProfile::new(3),
        ];
        let report = engine.assign_tasks(&mut manager, &agents);

        assert_eq!(report.task_for(AgentId(2)), Some(best));
        assert_eq!(report.task_for(AgentId(1)), Some(rest));
        assert_eq!(report.unassigned, vec![AgentId(3)]);

        // second pass: everyone with work is busy
        let report = engine.assign_tasks(&mut manager, &agents);
        assert_eq!(report.busy, vec![AgentId(2), AgentId(1)]);
        assert_eq!(report.unassigned, vec![AgentId(3)]);
    }

    #[test]
    fn test_recommendations_do_not_commit() {
        let mut manager = TaskManager::new();
        let engine = AssignmentEngine::default();
        let wall = manager
            .create_task(
                TaskDefinition::builder("Wall", WorkKind::Construction)
                    .priority(Priority::High)
                    .at(Position::new(3.0, 4.0), 1.0)
                    .requires(SkillKind::Construction, 2, 1.0)
                    .build(),
            )
            .unwrap();
        manager.create_task(def("Tidy", Priority::Idle)).unwrap();

        let agent = AgentProfile::new(1).with_skill(SkillKind::Construction, 6);
        let recs = engine.recommendations(&manager, &agent, 1);

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].task, wall);
        assert!(recs[0].justification.contains("high priority"));
        assert!(recs[0].justification.contains("construction 6"));
        assert!(recs[0].justification.contains("5.0 away"));
        assert_eq!(manager.status_of(wall), Some(TaskStatus::Available));
    }

    #[test]
    fn test_reassign_all_redistributes() {
        let mut manager = TaskManager::new();
        let engine = AssignmentEngine::default();
        let low = manager.create_task(def("Low", Priority::Low)).unwrap();

        let agents = vec![AgentProfile::new(1)];
        engine.assign_tasks(&mut manager, &agents);
        assert_eq!(manager.status_of(low), Some(TaskStatus::Assigned));

        let high = manager.create_task(def("High", Priority::High)).unwrap();
        let report = engine.reassign_all(&mut manager, &agents);

        assert_eq!(report.task_for(AgentId(1)), Some(high));
        assert_eq!(manager.status_of(low), Some(TaskStatus::Available));
    }
}
