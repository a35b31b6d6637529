//! Reports returned by the arbiter.

use serde::{Deserialize, Serialize};

use crate::collaboration::conflict::AssignmentConflict;
use crate::types::{AgentId, TaskId};

/// Outcome of one coordination pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationReport {
    /// Committed agent -> task pairs
    pub assignments: Vec<(AgentId, TaskId)>,
    /// Groups created during this pass
    pub groups_created: Vec<TaskId>,
    pub conflicts: Vec<AssignmentConflict>,
}

impl CoordinationReport {
    pub fn unresolved(&self) -> impl Iterator<Item = &AssignmentConflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved())
    }

    pub fn agents_for(&self, task: TaskId) -> Vec<AgentId> {
        self.assignments
            .iter()
            .filter(|(_, t)| *t == task)
            .map(|(a, _)| *a)
            .collect()
    }
}

/// Outcome of one arbiter sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub completed_groups: Vec<TaskId>,
    pub failed_groups: Vec<TaskId>,
    pub purged_reservations: usize,
}

/// How well collaboration is going overall
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub total_groups: usize,
    pub open_groups: usize,
    pub suspended_groups: usize,
    pub completed_groups: usize,
    pub failed_groups: usize,
    /// Completed over closed groups
    pub completion_rate: f64,
    /// Mean of each group's peak size
    pub average_group_size: f64,
    /// Live reservations over all tracked records
    pub resource_utilization: f64,
    pub recommendations: Vec<String>,
}
