//! Work strategies
//!
//! A strategy turns one tick of elapsed time into a [`WorkOutcome`] for a
//! task, given the agents currently assigned to it. Every strategy starts from
//! the same base rate, `dt / estimated_duration`, and scales it by what the
//! work kind cares about: skill, collaborators, or nothing at all.

use crate::agent::{Agent, AgentLookup};
use crate::config::WorkConfig;
use crate::error::TaskError;
use crate::task::definition::TaskDefinition;
use crate::types::{AgentId, SkillKind, TaskId};

/// Result of one unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    /// Progress was made (or attempted); `delta` is added to progress
    InProgress(f64),
    /// The work finished outright
    Success,
    /// The work cannot ever finish
    Failure(String),
    /// Nobody eligible is contributing right now
    Blocked(String),
}

/// Everything a strategy may look at during one update
pub struct WorkContext<'a> {
    pub task: TaskId,
    pub definition: &'a TaskDefinition,
    pub assigned: &'a [AgentId],
    pub agents: &'a dyn AgentLookup,
    pub progress: f64,
    pub dt: f64,
    pub config: &'a WorkConfig,
}

impl<'a> WorkContext<'a> {
    /// Progress a single baseline worker would make in this tick
    pub fn base_rate(&self) -> f64 {
        self.dt / self.definition.estimated_duration
    }

    /// Assigned agents the roster knows about
    pub fn present_agents(&self) -> Vec<&'a dyn Agent> {
        self.assigned
            .iter()
            .filter_map(|id| self.agents.find(*id))
            .collect()
    }

    /// Present agents at or above `min_level` in `skill`
    pub fn qualified_agents(&self, skill: SkillKind, min_level: u8) -> Vec<&'a dyn Agent> {
        self.present_agents()
            .into_iter()
            .filter(|agent| agent.skill_level(skill) >= min_level)
            .collect()
    }

    /// Build a `WorkFailed` error for this task
    pub fn failure(&self, reason: impl Into<String>) -> TaskError {
        TaskError::WorkFailed {
            task: self.task,
            reason: reason.into(),
        }
    }
}

fn average_level(agents: &[&dyn Agent], skill: SkillKind) -> f64 {
    if agents.is_empty() {
        return 0.0;
    }
    let total: f64 = agents.iter().map(|a| a.skill_level(skill) as f64).sum();
    total / agents.len() as f64
}

/// Behaviour plugged into a runtime task
pub trait WorkStrategy: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Perform one tick of work
    ///
    /// `Err` is reserved for faults in the strategy itself; the manager
    /// cancels the task when it sees one.
    fn perform(&mut self, ctx: &WorkContext<'_>) -> Result<WorkOutcome, TaskError>;
}

/// Any present agent contributes equally
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericWork;

impl WorkStrategy for GenericWork {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn perform(&mut self, ctx: &WorkContext<'_>) -> Result<WorkOutcome, TaskError> {
        let workers = ctx.present_agents();
        if workers.is_empty() {
            return Ok(WorkOutcome::Blocked(
                "no assigned agent is present".to_string(),
            ));
        }
        let delta = ctx.base_rate() * ctx.config.collaboration_factor(workers.len());
        Ok(WorkOutcome::InProgress(delta))
    }
}

/// Builders speed up with skill and with every extra pair of hands
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstructionWork;

impl WorkStrategy for ConstructionWork {
    fn name(&self) -> &'static str {
        "construction"
    }

    fn perform(&mut self, ctx: &WorkContext<'_>) -> Result<WorkOutcome, TaskError> {
        let builders = ctx.present_agents();
        if builders.is_empty() {
            return Ok(WorkOutcome::Blocked("no builder on site".to_string()));
        }
        let skill = average_level(&builders, SkillKind::Construction);
        let delta = ctx.base_rate()
            * ctx.config.skill_factor(skill)
            * ctx.config.collaboration_factor(builders.len());
        Ok(WorkOutcome::InProgress(delta))
    }
}

/// Only trained researchers help; the best of them sets the pace
#[derive(Debug, Default, Clone, Copy)]
pub struct ResearchWork;

impl WorkStrategy for ResearchWork {
    fn name(&self) -> &'static str {
        "research"
    }

    fn perform(&mut self, ctx: &WorkContext<'_>) -> Result<WorkOutcome, TaskError> {
        let min_level = ctx
            .definition
            .required_level(SkillKind::Research)
            .unwrap_or(0)
            .max(ctx.config.min_research_level);

        let best = ctx
            .qualified_agents(SkillKind::Research, min_level)
            .iter()
            .map(|agent| agent.skill_level(SkillKind::Research))
            .max();

        match best {
            Some(level) => Ok(WorkOutcome::InProgress(
                ctx.base_rate() * ctx.config.skill_factor(level as f64),
            )),
            None => Ok(WorkOutcome::InProgress(0.0)),
        }
    }
}

/// Miners must meet the mining requirement to swing a pick at all
#[derive(Debug, Default, Clone, Copy)]
pub struct MiningWork;

impl WorkStrategy for MiningWork {
    fn name(&self) -> &'static str {
        "mining"
    }

    fn perform(&mut self, ctx: &WorkContext<'_>) -> Result<WorkOutcome, TaskError> {
        let min_level = ctx
            .definition
            .required_level(SkillKind::Mining)
            .unwrap_or(ctx.config.min_mining_level);

        let miners = ctx.qualified_agents(SkillKind::Mining, min_level);
        if miners.is_empty() {
            return Ok(WorkOutcome::Blocked(format!(
                "no assigned agent has mining level {}",
                min_level
            )));
        }
        let skill = average_level(&miners, SkillKind::Mining);
        let delta = ctx.base_rate()
            * ctx.config.skill_factor(skill)
            * ctx.config.collaboration_factor(miners.len());
        Ok(WorkOutcome::InProgress(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::types::WorkKind;

    fn context<'a>(
        definition: &'a TaskDefinition,
        assigned: &'a [AgentId],
        agents: &'a Vec<AgentProfile>,
        config: &'a WorkConfig,
    ) -> WorkContext<'a> {
        WorkContext {
            task: TaskId(1),
            definition,
            assigned,
            agents,
            progress: 0.0,
            dt: 1.0,
            config,
        }
    }

    #[test]
    fn test_generic_blocks_without_agents() {
        let def = TaskDefinition::builder("Haul", WorkKind::Generic)
            .duration(10.0)
            .build();
        let roster = vec![AgentProfile::new(1)];
        let config = WorkConfig::default();

        let assigned = [AgentId(9)];
        let outcome = GenericWork
            .perform(&context(&def, &assigned, &roster, &config))
            .unwrap();
        assert!(matches!(outcome, WorkOutcome::Blocked(_)));

        let assigned = [AgentId(1)];
        let outcome = GenericWork
            .perform(&context(&def, &assigned, &roster, &config))
            .unwrap();
        assert_eq!(outcome, WorkOutcome::InProgress(0.1));
    }

    #[test]
    fn test_construction_scales_with_skill_and_team() {
        let def = TaskDefinition::builder("Wall", WorkKind::Construction)
            .duration(10.0)
            .build();
        let roster = vec![
            AgentProfile::new(1).with_skill(SkillKind::Construction, 10),
            AgentProfile::new(2).with_skill(SkillKind::Construction, 10),
        ];
        let config = WorkConfig::default();

        let solo = [AgentId(1)];
        let team = [AgentId(1), AgentId(2)];
        let WorkOutcome::InProgress(solo_delta) = ConstructionWork
            .perform(&context(&def, &solo, &roster, &config))
            .unwrap()
        else {
            panic!("expected progress");
        };
        let WorkOutcome::InProgress(team_delta) = ConstructionWork
            .perform(&context(&def, &team, &roster, &config))
            .unwrap()
        else {
            panic!("expected progress");
        };

        // 0.1 * (0.5 + 10/10) = 0.15, times 1.5 for two builders
        assert!((solo_delta - 0.15).abs() < 1e-9);
        assert!((team_delta - 0.225).abs() < 1e-9);
    }

    #[test]
    fn test_research_needs_trained_agent() {
        let def = TaskDefinition::builder("Study", WorkKind::Research)
            .duration(10.0)
            .build();
        let roster = vec![
            AgentProfile::new(1).with_skill(SkillKind::Research, 2),
            AgentProfile::new(2).with_skill(SkillKind::Research, 5),
        ];
        let config = WorkConfig::default();

        let novice = [AgentId(1)];
        let outcome = ResearchWork
            .perform(&context(&def, &novice, &roster, &config))
            .unwrap();
        assert_eq!(outcome, WorkOutcome::InProgress(0.0));

        let both = [AgentId(1), AgentId(2)];
        let WorkOutcome::InProgress(delta) = ResearchWork
            .perform(&context(&def, &both, &roster, &config))
            .unwrap()
        else {
            panic!("expected progress");
        };
        assert!((delta - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_mining_blocks_below_requirement() {
        let def = TaskDefinition::builder("Dig", WorkKind::Mining)
            .requires(SkillKind::Mining, 4, 1.0)
            .duration(10.0)
            .build();
        let roster = vec![AgentProfile::new(1).with_skill(SkillKind::Mining, 3)];
        let config = WorkConfig::default();

        let assigned = [AgentId(1)];
        let outcome = MiningWork
            .perform(&context(&def, &assigned, &roster, &config))
            .unwrap();
        assert!(matches!(outcome, WorkOutcome::Blocked(reason) if reason.contains('4')));
    }
}
