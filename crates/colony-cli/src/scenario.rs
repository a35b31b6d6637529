//! Scenario files
//!
//! A scenario is a TOML file with an optional `[config]` table, a roster of
//! `[[agents]]` and a list of `[[tasks]]`. Tasks name each other by `key`;
//! keys are turned into task ids in file order.
//!
//! ```toml
//! [[agents]]
//! id = 1
//! name = "Ada"
//! position = { x = 2.0, y = 3.0 }
//! skills = { construction = 6 }
//!
//! [[tasks]]
//! key = "clear"
//! name = "Clear site"
//! kind = "generic"
//!
//! [[tasks]]
//! key = "walls"
//! kind = "construction"
//! max_assignees = 2
//! requires = [{ skill = "construction", level = 3 }]
//! after = ["clear"]
//! ```

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use colony_core::types::{SkillKind, WorkKind};
use colony_core::{AgentProfile, Position, Priority, SchedulerConfig, TaskDefinition, TaskId};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: Option<SchedulerConfig>,

    #[serde(default)]
    pub agents: Vec<AgentProfile>,

    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

/// One `[[tasks]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    pub key: String,
    pub name: Option<String>,
    pub kind: WorkKind,
    #[serde(default)]
    pub priority: Priority,
    pub duration: Option<f64>,
    pub max_duration: Option<f64>,
    pub max_assignees: Option<usize>,
    pub position: Option<Position>,
    pub radius: Option<f64>,
    #[serde(default)]
    pub requires: Vec<RequirementSpec>,
    #[serde(default)]
    pub after: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequirementSpec {
    pub skill: SkillKind,
    pub level: u8,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Definitions ready for the scheduler, with the key behind each id
#[derive(Debug, Clone)]
pub struct ResolvedTasks {
    pub definitions: Vec<TaskDefinition>,
    pub keys: HashMap<TaskId, String>,
}

impl ResolvedTasks {
    pub fn key(&self, id: TaskId) -> &str {
        self.keys.get(&id).map(String::as_str).unwrap_or("?")
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(text)?;
        if let Some(config) = &scenario.config {
            config.check()?;
        }
        Ok(scenario)
    }

    /// Turn task specs into definitions
    ///
    /// The n-th task gets id n (1-based). `after` may only name keys that
    /// appear earlier in the file.
    pub fn resolve(&self) -> Result<ResolvedTasks> {
        let mut ids: HashMap<&str, TaskId> = HashMap::new();
        let mut keys = HashMap::new();
        let mut definitions = Vec::with_capacity(self.tasks.len());

        for (index, spec) in self.tasks.iter().enumerate() {
            let id = TaskId(index as u64 + 1);
            if ids.contains_key(spec.key.as_str()) {
                bail!("task key '{}' is declared twice", spec.key);
            }

            let name = spec.name.clone().unwrap_or_else(|| spec.key.clone());
            let mut builder = TaskDefinition::builder(name, spec.kind)
                .id(id)
                .priority(spec.priority);

            if let Some(duration) = spec.duration {
                builder = builder.duration(duration);
            }
            if let Some(max) = spec.max_duration {
                builder = builder.max_duration(max);
            }
            if let Some(count) = spec.max_assignees {
                builder = builder.max_assignees(count);
            }
            if let Some(position) = spec.position {
                builder = builder.at(position, spec.radius.unwrap_or(1.0));
            }
            for req in &spec.requires {
                builder = builder.requires(req.skill, req.level, req.weight);
            }
            for key in &spec.after {
                match ids.get(key.as_str()) {
                    Some(prerequisite) => builder = builder.after(*prerequisite),
                    None => bail!(
                        "task '{}' depends on '{}', which is not declared before it",
                        spec.key,
                        key
                    ),
                }
            }

            ids.insert(spec.key.as_str(), id);
            keys.insert(id, spec.key.clone());
            definitions.push(builder.build());
        }

        Ok(ResolvedTasks { definitions, keys })
    }

    /// Random colony: a construction chain plus side jobs
    pub fn random(seed: u64, agent_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let agents = (1..=agent_count as u64)
            .map(|id| {
                let mut agent = AgentProfile::new(id)
                    .named(format!("Settler {}", id))
                    .at(rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0))
                    .with_happiness(rng.gen_range(0.2..1.0));
                for skill in SkillKind::ALL {
                    agent = agent.with_skill(skill, rng.gen_range(0..=10));
                }
                agent
            })
            .collect();

        let site = Position::new(10.0, 10.0);
        let chain = [
            ("clear", "Clear site", WorkKind::Generic, 1usize, 0u8),
            ("foundation", "Lay foundation", WorkKind::Construction, 2, 2),
            ("walls", "Raise walls", WorkKind::Construction, 3, 3),
            ("roof", "Put on roof", WorkKind::Construction, 2, 4),
        ];

        let mut tasks: Vec<TaskSpec> = Vec::new();
        let mut previous: Option<&str> = None;
        for (key, name, kind, crew, level) in chain {
            let requires = if level > 0 {
                vec![RequirementSpec {
                    skill: SkillKind::Construction,
                    level,
                    weight: 1.0,
                }]
            } else {
                Vec::new()
            };
            tasks.push(TaskSpec {
                key: key.to_string(),
                name: Some(name.to_string()),
                kind,
                priority: Priority::High,
                duration: Some(rng.gen_range(2.0..6.0)),
                max_duration: None,
                max_assignees: Some(crew),
                position: Some(site),
                radius: Some(3.0),
                requires,
                after: previous.map(|p| vec![p.to_string()]).unwrap_or_default(),
            });
            previous = Some(key);
        }

        tasks.push(TaskSpec {
            key: "quarry".to_string(),
            name: Some("Quarry stone".to_string()),
            kind: WorkKind::Mining,
            priority: Priority::Normal,
            duration: Some(rng.gen_range(3.0..8.0)),
            max_duration: None,
            max_assignees: Some(2),
            position: Some(Position::new(rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0))),
            radius: Some(2.0),
            requires: Vec::new(),
            after: Vec::new(),
        });
        tasks.push(TaskSpec {
            key: "study".to_string(),
            name: Some("Study blueprints".to_string()),
            kind: WorkKind::Research,
            priority: Priority::Low,
            duration: Some(rng.gen_range(3.0..8.0)),
            max_duration: None,
            max_assignees: Some(2),
            position: None,
            radius: None,
            requires: Vec::new(),
            after: Vec::new(),
        });

        Self {
            config: None,
            agents,
            tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [config.collaboration]
        spatial_conflict_distance = 8.0

        [[agents]]
        id = 1
        name = "Ada"
        position = { x = 2.0, y = 3.0 }
        skills = { construction = 6, hauling = 2 }

        [[tasks]]
        key = "clear"
        name = "Clear site"
        kind = "generic"
        duration = 2.0

        [[tasks]]
        key = "walls"
        kind = "construction"
        priority = "high"
        max_assignees = 2
        position = { x = 5.0, y = 5.0 }
        requires = [{ skill = "construction", level = 3 }]
        after = ["clear"]
    "#;

    #[test]
    fn test_parse_and_resolve() {
        let scenario = Scenario::from_toml_str(SAMPLE).unwrap();
        assert_eq!(scenario.agents.len(), 1);
        assert_eq!(scenario.agents[0].skills[&SkillKind::Construction], 6);
        let config = scenario.config.as_ref().unwrap();
        assert_eq!(config.collaboration.spatial_conflict_distance, 8.0);

        let resolved = scenario.resolve().unwrap();
        let walls = &resolved.definitions[1];
        assert_eq!(walls.id, Some(TaskId(2)));
        assert_eq!(walls.name, "walls");
        assert_eq!(walls.priority, Priority::High);
        assert_eq!(walls.prerequisites, vec![TaskId(1)]);
        assert_eq!(walls.required_level(SkillKind::Construction), Some(3));
        assert_eq!(resolved.key(TaskId(1)), "clear");
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let text = r#"
            [[tasks]]
            key = "walls"
            kind = "construction"
            after = ["foundation"]
        "#;
        let err = Scenario::from_toml_str(text).unwrap().resolve().unwrap_err();
        assert!(err.to_string().contains("foundation"));
    }

    #[test]
    fn test_duplicate_key_is_an_error() {
        let text = r#"
            [[tasks]]
            key = "a"
            kind = "generic"

            [[tasks]]
            key = "a"
            kind = "mining"
        "#;
        let err = Scenario::from_toml_str(text).unwrap().resolve().unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_random_is_reproducible() {
        let a = Scenario::random(7, 4);
        let b = Scenario::random(7, 4);
        assert_eq!(a.agents, b.agents);
        assert_eq!(a.tasks.len(), 6);
        assert!(a.resolve().is_ok());
    }
}
