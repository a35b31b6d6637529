//! Read-only view of agents ("characters") owned by the host game.
//!
//! The scheduler never mutates agent state. It reads skills, position and
//! need signals through the [`Agent`] trait and resolves ids through
//! [`AgentLookup`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::types::{AgentId, Position, SkillKind};

/// Capability data the scheduler may read about an agent
pub trait Agent {
    fn id(&self) -> AgentId;

    /// Current level in `skill`, 0 when untrained
    fn skill_level(&self, skill: SkillKind) -> u8;

    fn position(&self) -> Position;

    /// True when the agent has an unmet need that should pull it off work
    fn has_critical_need(&self) -> bool;

    /// Mood in [0, 1]
    fn happiness(&self) -> f64;

    /// Mean level across every skill kind
    fn average_skill(&self) -> f64 {
        let total: f64 = SkillKind::ALL
            .iter()
            .map(|skill| self.skill_level(*skill) as f64)
            .sum();
        total / SkillKind::ALL.len() as f64
    }
}

impl<T: Agent + ?Sized> Agent for &T {
    fn id(&self) -> AgentId {
        (**self).id()
    }

    fn skill_level(&self, skill: SkillKind) -> u8 {
        (**self).skill_level(skill)
    }

    fn position(&self) -> Position {
        (**self).position()
    }

    fn has_critical_need(&self) -> bool {
        (**self).has_critical_need()
    }

    fn happiness(&self) -> f64 {
        (**self).happiness()
    }
}

/// Resolves agent ids to agents
pub trait AgentLookup {
    fn find(&self, id: AgentId) -> Option<&dyn Agent>;
}

/// Plain-data agent snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub skills: BTreeMap<SkillKind, u8>,

    #[serde(default)]
    pub position: Position,

    #[serde(default = "default_happiness")]
    pub happiness: f64,

    #[serde(default)]
    pub critical_need: bool,
}

fn default_happiness() -> f64 {
    0.5
}

impl AgentProfile {
    pub fn new(id: u64) -> Self {
        Self {
            id: AgentId(id),
            name: format!("Colonist {}", id),
            skills: BTreeMap::new(),
            position: Position::default(),
            happiness: default_happiness(),
            critical_need: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_skill(mut self, skill: SkillKind, level: u8) -> Self {
        self.skills.insert(skill, level);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_happiness(mut self, happiness: f64) -> Self {
        self.happiness = happiness.clamp(0.0, 1.0);
        self
    }

    pub fn with_critical_need(mut self, critical: bool) -> Self {
        self.critical_need = critical;
        self
    }
}

impl Agent for AgentProfile {
    fn id(&self) -> AgentId {
        self.id
    }

    fn skill_level(&self, skill: SkillKind) -> u8 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    fn position(&self) -> Position {
        self.position
    }

    fn has_critical_need(&self) -> bool {
        self.critical_need
    }

    fn happiness(&self) -> f64 {
        self.happiness
    }
}

impl AgentLookup for HashMap<AgentId, AgentProfile> {
    fn find(&self, id: AgentId) -> Option<&dyn Agent> {
        self.get(&id).map(|agent| agent as &dyn Agent)
    }
}

impl AgentLookup for [AgentProfile] {
    fn find(&self, id: AgentId) -> Option<&dyn Agent> {
        self.iter()
            .find(|agent| agent.id == id)
            .map(|agent| agent as &dyn Agent)
    }
}

impl AgentLookup for Vec<AgentProfile> {
    fn find(&self, id: AgentId) -> Option<&dyn Agent> {
        self.as_slice().find(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_untrained_skills_to_zero() {
        let agent = AgentProfile::new(1).with_skill(SkillKind::Mining, 7);
        assert_eq!(agent.skill_level(SkillKind::Mining), 7);
        assert_eq!(agent.skill_level(SkillKind::Research), 0);
    }

    #[test]
    fn test_average_skill_spans_all_kinds() {
        let agent = AgentProfile::new(1)
            .with_skill(SkillKind::Construction, 8)
            .with_skill(SkillKind::Mining, 8);
        assert!((agent.average_skill() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_by_slice_and_map() {
        let roster = vec![AgentProfile::new(1), AgentProfile::new(2)];
        assert!(roster.find(AgentId(2)).is_some());
        assert!(roster.find(AgentId(9)).is_none());

        let map: HashMap<AgentId, AgentProfile> =
            roster.into_iter().map(|a| (a.id, a)).collect();
        assert_eq!(map.find(AgentId(1)).map(|a| a.id()), Some(AgentId(1)));
    }

    #[test]
    fn test_happiness_is_clamped() {
        assert_eq!(AgentProfile::new(1).with_happiness(3.0).happiness, 1.0);
    }
}
