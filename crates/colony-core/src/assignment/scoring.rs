//! Agent-task fitness scoring
//!
//! A score is the sum of five independent terms. Every constant comes from
//! [`ScoringConfig`]; with the defaults the terms range over:
//!
//! | term     | range   | driven by                                   |
//! |----------|---------|---------------------------------------------|
//! | priority | 10..100 | task priority tier                          |
//! | skill    | 0..100  | weighted `level / min_level` per requirement |
//! | distance | 0..50   | linear falloff over 100 units               |
//! | need     | 0..25   | happiness, or 5 for a critical need          |
//! | deadline | 0..20   | urgency over the last 24 hours              |

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::config::ScoringConfig;
use crate::task::TaskDefinition;
use crate::types::Timestamp;

/// Per-term score for one agent-task pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub priority: f64,
    pub skill: f64,
    pub distance: f64,
    pub need: f64,
    pub deadline: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskScorer {
    config: ScoringConfig,
}

impl TaskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, def: &TaskDefinition, agent: &dyn Agent, now: Timestamp) -> ScoreBreakdown {
        let priority = self.config.priority.weight(def.priority);
        let skill = self.skill_score(def, agent);
        let distance = self.distance_score(def, agent);
        let need = self.need_score(agent);
        let deadline = self.deadline_score(def, now);

        ScoreBreakdown {
            priority,
            skill,
            distance,
            need,
            deadline,
            total: priority + skill + distance + need + deadline,
        }
    }

    fn skill_score(&self, def: &TaskDefinition, agent: &dyn Agent) -> f64 {
        let total_weight: f64 = def.skill_requirements.iter().map(|r| r.weight).sum();
        if def.skill_requirements.is_empty() || total_weight <= 0.0 {
            return self.config.default_skill_score;
        }

        let weighted: f64 = def
            .skill_requirements
            .iter()
            .map(|req| {
                let term = if req.min_level == 0 {
                    self.config.skill_score_cap
                } else {
                    let ratio = agent.skill_level(req.skill) as f64 / req.min_level as f64;
                    (ratio * self.config.skill_ratio_scale).min(self.config.skill_score_cap)
                };
                term * req.weight
            })
            .sum();

        weighted / total_weight
    }

    fn distance_score(&self, def: &TaskDefinition, agent: &dyn Agent) -> f64 {
        match def.target {
            Some(target) => {
                let d = agent.position().distance_to(&target);
                self.config.distance_max_score * (1.0 - d / self.config.distance_falloff).max(0.0)
            }
            None => self.config.default_distance_score,
        }
    }

    fn need_score(&self, agent: &dyn Agent) -> f64 {
        if agent.has_critical_need() {
            self.config.critical_need_score
        } else {
            agent.happiness().clamp(0.0, 1.0) * self.config.happiness_scale
        }
    }

    fn deadline_score(&self, def: &TaskDefinition, now: Timestamp) -> f64 {
        let Some(deadline) = def.deadline else {
            return self.config.default_deadline_score;
        };
        let remaining = (deadline - now).num_milliseconds() as f64 / 1000.0;
        if remaining <= 0.0 {
            return self.config.deadline_max_score;
        }
        let horizon = self.config.deadline_horizon_hours * 3600.0;
        (self.config.deadline_max_score * (1.0 - remaining / horizon))
            .clamp(0.0, self.config.deadline_max_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::types::{now, Position, Priority, SkillKind, WorkKind};
    use chrono::Duration;

    fn scorer() -> TaskScorer {
        TaskScorer::default()
    }

    #[test]
    fn test_full_breakdown() {
        let def = TaskDefinition::builder("Wall", WorkKind::Construction)
            .at(Position::new(0.0, 0.0), 1.0)
            .requires(SkillKind::Construction, 4, 1.0)
            .build();
        let agent = AgentProfile::new(1)
            .with_skill(SkillKind::Construction, 8)
            .with_happiness(0.5);

        let score = scorer().score(&def, &agent, now());
        assert_eq!(score.priority, 50.0);
        assert_eq!(score.skill, 100.0);
        assert_eq!(score.distance, 50.0);
        assert_eq!(score.need, 12.5);
        assert_eq!(score.deadline, 10.0);
        assert_eq!(score.total, 222.5);
    }

    #[test]
    fn test_skill_term_is_weighted_and_capped() {
        let def = TaskDefinition::builder("Lab", WorkKind::Research)
            .requires(SkillKind::Research, 5, 3.0)
            .requires(SkillKind::Crafting, 0, 1.0)
            .build();
        let agent = AgentProfile::new(1).with_skill(SkillKind::Research, 5);

        // research 5/5*50 = 50 with weight 3, crafting free 100 with weight 1
        let score = scorer().score(&def, &agent, now());
        assert!((score.skill - 62.5).abs() < 1e-9);

        let expert = AgentProfile::new(2).with_skill(SkillKind::Research, 20);
        let score = scorer().score(&def, &expert, now());
        assert_eq!(score.skill, 100.0);
    }

    #[test]
    fn test_defaults_without_requirements_or_target() {
        let def = TaskDefinition::new("Idle", WorkKind::Generic);
        let score = scorer().score(&def, &AgentProfile::new(1), now());
        assert_eq!(score.skill, 25.0);
        assert_eq!(score.distance, 25.0);
    }

    #[test]
    fn test_distance_falls_off_to_zero() {
        let def = TaskDefinition::builder("Far", WorkKind::Generic)
            .at(Position::new(0.0, 0.0), 1.0)
            .build();
        let near = AgentProfile::new(1).at(50.0, 0.0);
        let far = AgentProfile::new(2).at(150.0, 0.0);
        assert_eq!(scorer().score(&def, &near, now()).distance, 25.0);
        assert_eq!(scorer().score(&def, &far, now()).distance, 0.0);
    }

    #[test]
    fn test_critical_need_overrides_happiness() {
        let def = TaskDefinition::new("Any", WorkKind::Generic);
        let agent = AgentProfile::new(1)
            .with_happiness(1.0)
            .with_critical_need(true);
        assert_eq!(scorer().score(&def, &agent, now()).need, 5.0);
    }

    #[test]
    fn test_deadline_urgency() {
        let now = now();
        let agent = AgentProfile::new(1);

        let soon = TaskDefinition::builder("Soon", WorkKind::Generic)
            .deadline(now + Duration::hours(6))
            .build();
        assert!((scorer().score(&soon, &agent, now).deadline - 15.0).abs() < 1e-9);

        let distant = TaskDefinition::builder("Later", WorkKind::Generic)
            .deadline(now + Duration::hours(48))
            .build();
        assert_eq!(scorer().score(&distant, &agent, now).deadline, 0.0);

        let overdue = TaskDefinition::builder("Late", WorkKind::Generic)
            .deadline(now - Duration::hours(1))
            .build();
        assert_eq!(scorer().score(&overdue, &agent, now).deadline, 20.0);
    }

    #[test]
    fn test_priority_dominates_ordering() {
        let agent = AgentProfile::new(1);
        let critical = TaskDefinition::builder("Fire", WorkKind::Generic)
            .priority(Priority::Critical)
            .build();
        let idle = TaskDefinition::builder("Tidy", WorkKind::Generic)
            .priority(Priority::Idle)
            .build();
        assert!(scorer().score(&critical, &agent, now()).total > scorer().score(&idle, &agent, now()).total);
    }
}
