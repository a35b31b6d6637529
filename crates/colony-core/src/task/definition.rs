//! Task definitions
//!
//! A [`TaskDefinition`] is the static description a runtime
//! [`Task`](super::Task) is instantiated from: what kind of work, how urgent,
//! where, who may do it and what must finish first. Definitions are
//! immutable by convention once handed to the manager.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Position, Priority, SkillKind, TaskId, Timestamp, WorkKind};

/// Default estimated duration in seconds
pub const DEFAULT_ESTIMATED_DURATION: f64 = 60.0;

/// Maximum duration defaults to this multiple of the estimate
pub const DEFAULT_MAX_DURATION_FACTOR: f64 = 3.0;

/// A skill an agent must have to work a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub skill: SkillKind,

    /// Minimum level, 0..=20
    pub min_level: u8,

    /// Relative importance in scoring, must be positive
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl SkillRequirement {
    pub fn new(skill: SkillKind, min_level: u8, weight: f64) -> Self {
        Self {
            skill,
            min_level,
            weight,
        }
    }
}

/// Static description of a unit of work
///
/// # Invariants
///
/// Checked by [`crate::validation::TaskValidator`] when the definition is
/// registered, not at construction:
/// - `name` is not blank
/// - `estimated_duration > 0` and `max_duration >= estimated_duration`
/// - `max_assignees > 0`
/// - the definition never lists its own id as prerequisite or dependent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Identifier, assigned by the manager when absent
    pub id: Option<TaskId>,

    pub name: String,

    pub kind: WorkKind,

    pub priority: Priority,

    /// Where the work happens, if anywhere in particular
    pub target: Option<Position>,

    /// Radius around `target` in which an agent counts as on site
    pub work_radius: f64,

    pub skill_requirements: Vec<SkillRequirement>,

    /// Tasks that must complete before this one becomes available
    pub prerequisites: Vec<TaskId>,

    /// Tasks that wait on this one; they may be created later
    pub dependents: Vec<TaskId>,

    /// Expected seconds of work at baseline rate
    pub estimated_duration: f64,

    /// Seconds after start at which the task fails
    pub max_duration: f64,

    pub max_assignees: usize,

    pub deadline: Option<Timestamp>,

    /// Items consumed by the work
    pub consumed: BTreeMap<String, u32>,

    /// Items produced by the work
    pub produced: BTreeMap<String, u32>,

    /// Free-form data for game-side systems
    pub custom: BTreeMap<String, String>,
}

impl TaskDefinition {
    /// Create a definition with default duration and a single assignee
    pub fn new(name: impl Into<String>, kind: WorkKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            priority: Priority::Normal,
            target: None,
            work_radius: 1.0,
            skill_requirements: Vec::new(),
            prerequisites: Vec::new(),
            dependents: Vec::new(),
            estimated_duration: DEFAULT_ESTIMATED_DURATION,
            max_duration: DEFAULT_ESTIMATED_DURATION * DEFAULT_MAX_DURATION_FACTOR,
            max_assignees: 1,
            deadline: None,
            consumed: BTreeMap::new(),
            produced: BTreeMap::new(),
            custom: BTreeMap::new(),
        }
    }

    /// Create a builder for fluent definition construction
    pub fn builder(name: impl Into<String>, kind: WorkKind) -> TaskDefinitionBuilder {
        TaskDefinitionBuilder::new(name, kind)
    }

    /// Minimum level required in `skill`, if the definition names one
    pub fn required_level(&self, skill: SkillKind) -> Option<u8> {
        self.skill_requirements
            .iter()
            .filter(|req| req.skill == skill)
            .map(|req| req.min_level)
            .max()
    }

    /// True when more than one agent may work the task at once
    pub fn is_collaborative(&self) -> bool {
        self.max_assignees > 1
    }
}

/// Builder for constructing definitions fluently
///
/// `build` does not validate; the manager runs the validator on creation so
/// that every rejection carries the full issue list.
#[derive(Debug, Clone)]
pub struct TaskDefinitionBuilder {
    definition: TaskDefinition,
    explicit_max_duration: bool,
}

impl TaskDefinitionBuilder {
    pub fn new(name: impl Into<String>, kind: WorkKind) -> Self {
        Self {
            definition: TaskDefinition::new(name, kind),
            explicit_max_duration: false,
        }
    }

    /// Use a caller-chosen id instead of a manager-allocated one
    pub fn id(mut self, id: TaskId) -> Self {
        self.definition.id = Some(id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.definition.priority = priority;
        self
    }

    /// Set the target position and work radius
    pub fn at(mut self, target: Position, radius: f64) -> Self {
        self.definition.target = Some(target);
        self.definition.work_radius = radius;
        self
    }

    /// Add a skill requirement
    pub fn requires(mut self, skill: SkillKind, min_level: u8, weight: f64) -> Self {
        self.definition
            .skill_requirements
            .push(SkillRequirement::new(skill, min_level, weight));
        self
    }

    /// Add a prerequisite
    pub fn after(mut self, prerequisite: TaskId) -> Self {
        self.definition.prerequisites.push(prerequisite);
        self
    }

    /// Add a dependent
    pub fn before(mut self, dependent: TaskId) -> Self {
        self.definition.dependents.push(dependent);
        self
    }

    /// Set the estimated duration; the maximum follows unless set explicitly
    pub fn duration(mut self, seconds: f64) -> Self {
        self.definition.estimated_duration = seconds;
        if !self.explicit_max_duration {
            self.definition.max_duration = seconds * DEFAULT_MAX_DURATION_FACTOR;
        }
        self
    }

    pub fn max_duration(mut self, seconds: f64) -> Self {
        self.definition.max_duration = seconds;
        self.explicit_max_duration = true;
        self
    }

    pub fn max_assignees(mut self, count: usize) -> Self {
        self.definition.max_assignees = count;
        self
    }

    pub fn deadline(mut self, deadline: Timestamp) -> Self {
        self.definition.deadline = Some(deadline);
        self
    }

    pub fn consumes(mut self, item: impl Into<String>, amount: u32) -> Self {
        *self.definition.consumed.entry(item.into()).or_insert(0) += amount;
        self
    }

    pub fn produces(mut self, item: impl Into<String>, amount: u32) -> Self {
        *self.definition.produced.entry(item.into()).or_insert(0) += amount;
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.custom.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let def = TaskDefinition::builder("Build wall", WorkKind::Construction)
            .priority(Priority::High)
            .at(Position::new(4.0, 2.0), 1.5)
            .requires(SkillKind::Construction, 4, 2.0)
            .after(TaskId(1))
            .max_assignees(3)
            .consumes("stone", 10)
            .consumes("stone", 5)
            .produces("wall", 1)
            .custom("blueprint", "wall_basic")
            .build();

        assert_eq!(def.priority, Priority::High);
        assert_eq!(def.target, Some(Position::new(4.0, 2.0)));
        assert_eq!(def.required_level(SkillKind::Construction), Some(4));
        assert_eq!(def.prerequisites, vec![TaskId(1)]);
        assert_eq!(def.consumed.get("stone"), Some(&15));
        assert!(def.is_collaborative());
    }

    #[test]
    fn test_duration_drives_default_max() {
        let def = TaskDefinition::builder("Dig", WorkKind::Mining)
            .duration(10.0)
            .build();
        assert_eq!(def.max_duration, 30.0);

        let def = TaskDefinition::builder("Dig", WorkKind::Mining)
            .max_duration(12.0)
            .duration(10.0)
            .build();
        assert_eq!(def.max_duration, 12.0);
    }

    #[test]
    fn test_required_level_takes_strictest() {
        let def = TaskDefinition::builder("Study", WorkKind::Research)
            .requires(SkillKind::Research, 2, 1.0)
            .requires(SkillKind::Research, 6, 1.0)
            .build();
        assert_eq!(def.required_level(SkillKind::Research), Some(6));
        assert_eq!(def.required_level(SkillKind::Mining), None);
    }
}
