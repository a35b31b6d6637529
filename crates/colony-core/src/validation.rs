//! Task validation
//!
//! [`TaskValidator`] checks definitions, assignments and dependency
//! references. It never mutates anything and never fails: every check
//! produces a [`ValidationReport`] whose errors block the operation and whose
//! warnings are informational.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::agent::Agent;
use crate::config::ValidationConfig;
use crate::task::{Task, TaskDefinition};
use crate::types::{TaskId, Timestamp};

/// A single finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable machine-readable code, e.g. `"capacity_reached"`
    pub code: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Errors and warnings from one validation pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// No errors (warnings allowed)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            code: code.to_string(),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, code: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            code: code.to_string(),
            message: message.into(),
        });
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|issue| issue.code == code)
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|issue| issue.code == code)
    }

    /// Error messages joined for use in an error value
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Stateless validator
#[derive(Debug, Clone, Default)]
pub struct TaskValidator {
    config: ValidationConfig,
}

impl TaskValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Check a definition in isolation
    pub fn validate_definition(&self, def: &TaskDefinition, now: Timestamp) -> ValidationReport {
        let mut report = ValidationReport::new();

        if def.name.trim().is_empty() {
            report.error("empty_name", "task name must not be empty");
        }
        if !(def.estimated_duration.is_finite() && def.estimated_duration > 0.0) {
            report.error(
                "invalid_duration",
                format!("estimated duration must be positive, got {}", def.estimated_duration),
            );
        }
        if !(def.max_duration.is_finite() && def.max_duration > 0.0) {
            report.error(
                "invalid_max_duration",
                format!("maximum duration must be positive, got {}", def.max_duration),
            );
        } else if def.max_duration < def.estimated_duration {
            report.error(
                "invalid_max_duration",
                format!(
                    "maximum duration {} is shorter than the estimate {}",
                    def.max_duration, def.estimated_duration
                ),
            );
        }
        if def.max_assignees == 0 {
            report.error("invalid_capacity", "max assignees must be at least 1");
        }
        if !(def.work_radius.is_finite() && def.work_radius >= 0.0) {
            report.error(
                "invalid_radius",
                format!("work radius must not be negative, got {}", def.work_radius),
            );
        }

        for req in &def.skill_requirements {
            if req.min_level > self.config.max_skill_level {
                report.error(
                    "invalid_skill_level",
                    format!(
                        "{} level {} exceeds maximum {}",
                        req.skill, req.min_level, self.config.max_skill_level
                    ),
                );
            }
            if !(req.weight.is_finite() && req.weight > 0.0) {
                report.error(
                    "invalid_skill_weight",
                    format!("{} weight must be positive, got {}", req.skill, req.weight),
                );
            }
        }

        if let Some(id) = def.id {
            if def.prerequisites.contains(&id) || def.dependents.contains(&id) {
                report.error("self_reference", format!("{} references itself", id));
            }
        }
        if has_duplicates(&def.prerequisites) {
            report.warning("duplicate_prerequisite", "prerequisite list contains duplicates");
        }
        if has_duplicates(&def.dependents) {
            report.warning("duplicate_dependent", "dependent list contains duplicates");
        }

        if let Some(deadline) = def.deadline {
            if deadline <= now {
                report.warning("deadline_passed", format!("deadline {} already passed", deadline));
            }
        }

        report
    }

    /// Check whether `agent` may join `task` right now
    pub fn validate_assignment(&self, task: &Task, agent: &dyn Agent) -> ValidationReport {
        let mut report = ValidationReport::new();
        let def = task.definition();

        if !task.status().accepts_assignment() {
            report.error(
                "invalid_status",
                format!("{} is {} and cannot take assignments", task.id(), task.status()),
            );
        }
        if task.is_assigned(agent.id()) {
            report.error(
                "already_assigned",
                format!("{} is already assigned to {}", agent.id(), task.id()),
            );
        } else if task.is_full() {
            report.error(
                "capacity_reached",
                format!(
                    "{} already has {} of {} agents",
                    task.id(),
                    task.assigned_agents().len(),
                    def.max_assignees
                ),
            );
        }

        report.merge(self.validate_skills(def, agent));

        if let Some(target) = def.target {
            let distance = agent.position().distance_to(&target);
            let limit = def.work_radius + self.config.distance_tolerance;
            if distance > limit {
                report.warning(
                    "far_from_target",
                    format!("{} is {:.1} away from the work site", agent.id(), distance),
                );
            }
        }
        if agent.has_critical_need() {
            report.warning(
                "critical_need",
                format!("{} has a critical unmet need", agent.id()),
            );
        }

        report
    }

    /// Skill requirements only; used for feasibility filtering
    pub fn validate_skills(&self, def: &TaskDefinition, agent: &dyn Agent) -> ValidationReport {
        let mut report = ValidationReport::new();
        for req in &def.skill_requirements {
            let level = agent.skill_level(req.skill);
            if level < req.min_level {
                report.error(
                    "insufficient_skill",
                    format!(
                        "{} has {} {} but needs {}",
                        agent.id(),
                        req.skill,
                        level,
                        req.min_level
                    ),
                );
            } else if level == req.min_level {
                report.warning(
                    "minimal_skill",
                    format!("{} meets the {} requirement exactly", agent.id(), req.skill),
                );
            }
        }
        report
    }

    /// Check a definition's references against the set of known tasks
    pub fn validate_dependencies<F>(&self, def: &TaskDefinition, exists: F) -> ValidationReport
    where
        F: Fn(TaskId) -> bool,
    {
        let mut report = ValidationReport::new();

        for prerequisite in &def.prerequisites {
            if !exists(*prerequisite) {
                report.error(
                    "missing_prerequisite",
                    format!("prerequisite {} does not exist", prerequisite),
                );
            }
        }
        for dependent in &def.dependents {
            if def.prerequisites.contains(dependent) {
                report.error(
                    "immediate_cycle",
                    format!("{} is both a prerequisite and a dependent", dependent),
                );
            }
            if !exists(*dependent) {
                report.warning(
                    "missing_dependent",
                    format!("dependent {} does not exist yet", dependent),
                );
            }
        }
        if let Some(id) = def.id {
            if def.prerequisites.contains(&id) || def.dependents.contains(&id) {
                report.error("immediate_cycle", format!("{} depends on itself", id));
            }
        }

        report
    }
}

fn has_duplicates(ids: &[TaskId]) -> bool {
    let unique: BTreeSet<_> = ids.iter().collect();
    unique.len() != ids.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::task::GenericWork;
    use crate::types::{now, AgentId, Position, SkillKind, WorkKind};
    use chrono::Duration;

    fn validator() -> TaskValidator {
        TaskValidator::default()
    }

    fn available(def: TaskDefinition) -> Task {
        let mut task = Task::new(TaskId(1), def, Box::new(GenericWork), now());
        task.make_available().unwrap();
        task
    }

    #[test]
    fn test_valid_definition_passes() {
        let def = TaskDefinition::builder("Haul", WorkKind::Generic)
            .requires(SkillKind::Hauling, 2, 1.0)
            .build();
        let report = validator().validate_definition(&def, now());
        assert!(report.is_valid(), "{:?}", report);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_definition_errors_are_collected() {
        let mut def = TaskDefinition::builder("  ", WorkKind::Generic)
            .duration(0.0)
            .max_assignees(0)
            .requires(SkillKind::Mining, 25, 0.0)
            .build();
        def.id = Some(TaskId(4));
        def.prerequisites = vec![TaskId(4)];

        let report = validator().validate_definition(&def, now());
        for code in [
            "empty_name",
            "invalid_duration",
            "invalid_capacity",
            "invalid_skill_level",
            "invalid_skill_weight",
            "self_reference",
        ] {
            assert!(report.has_error(code), "missing {code}: {:?}", report);
        }
    }

    #[test]
    fn test_definition_warnings() {
        let def = TaskDefinition::builder("Late", WorkKind::Generic)
            .after(TaskId(2))
            .after(TaskId(2))
            .deadline(now() - Duration::hours(1))
            .build();
        let report = validator().validate_definition(&def, now());
        assert!(report.is_valid());
        assert!(report.has_warning("duplicate_prerequisite"));
        assert!(report.has_warning("deadline_passed"));
    }

    #[test]
    fn test_assignment_checks_skill_and_capacity() {
        let def = TaskDefinition::builder("Dig", WorkKind::Mining)
            .requires(SkillKind::Mining, 5, 1.0)
            .build();
        let mut task = available(def);

        let weak = AgentProfile::new(1).with_skill(SkillKind::Mining, 3);
        let report = validator().validate_assignment(&task, &weak);
        assert!(report.has_error("insufficient_skill"));

        let exact = AgentProfile::new(2).with_skill(SkillKind::Mining, 5);
        let report = validator().validate_assignment(&task, &exact);
        assert!(report.is_valid());
        assert!(report.has_warning("minimal_skill"));

        task.assign(AgentId(2)).unwrap();
        let strong = AgentProfile::new(3).with_skill(SkillKind::Mining, 9);
        let report = validator().validate_assignment(&task, &strong);
        assert!(report.has_error("capacity_reached"));

        let report = validator().validate_assignment(&task, &exact);
        assert!(report.has_error("already_assigned"));
    }

    #[test]
    fn test_assignment_warnings_do_not_block() {
        let def = TaskDefinition::builder("Far", WorkKind::Generic)
            .at(Position::new(100.0, 0.0), 1.0)
            .build();
        let task = available(def);
        let agent = AgentProfile::new(1).at(0.0, 0.0).with_critical_need(true);

        let report = validator().validate_assignment(&task, &agent);
        assert!(report.is_valid());
        assert!(report.has_warning("far_from_target"));
        assert!(report.has_warning("critical_need"));
    }

    #[test]
    fn test_pending_task_rejects_assignment() {
        let def = TaskDefinition::new("Wait", WorkKind::Generic);
        let task = Task::new(TaskId(1), def, Box::new(GenericWork), now());
        let report = validator().validate_assignment(&task, &AgentProfile::new(1));
        assert!(report.has_error("invalid_status"));
    }

    #[test]
    fn test_dependency_references() {
        let def = TaskDefinition::builder("Roof", WorkKind::Construction)
            .after(TaskId(1))
            .after(TaskId(9))
            .before(TaskId(1))
            .before(TaskId(12))
            .build();
        let report = validator().validate_dependencies(&def, |id| id == TaskId(1));

        assert!(report.has_error("missing_prerequisite"));
        assert!(report.has_error("immediate_cycle"));
        assert!(report.has_warning("missing_dependent"));
        assert!(report.summary().contains("task#9"));
    }
}
