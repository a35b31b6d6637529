//! Conflict records produced while coordinating assignments
//!
//! Records are ephemeral: they are returned in a coordination report or
//! broadcast as events, never stored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaboration::group::CollaborationRole;
use crate::types::{AgentId, GridCell, TaskId, Timestamp};

/// Types of conflicts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictKind {
    /// One agent was planned for several tasks at once
    CharacterOverassignment,

    /// A group cannot activate without this role
    MissingRole { role: CollaborationRole },

    /// Two agents want the same cell
    ResourceContention { cell: GridCell },

    /// Agent is active in another group too close to this one
    SpatialConflict { other: TaskId },
}

/// Conflict severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// How a conflict was settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Agent keeps its highest-scored task and drops the rest
    KeepHighestScore {
        agent: AgentId,
        kept: TaskId,
        dropped: Vec<TaskId>,
    },

    /// Agent was turned away from the task
    Rejected { agent: AgentId, task: TaskId },

    /// The live claim stands and the newcomer is turned away
    KeepExisting { owner: AgentId, rejected: AgentId },

    /// Nothing automatic applies; surfaced for the host to act on
    Unresolved { reason: String },
}

/// Conflict detected during coordination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentConflict {
    pub id: Uuid,
    pub kind: ConflictKind,
    pub agents: Vec<AgentId>,
    pub tasks: Vec<TaskId>,
    pub detected_at: Timestamp,
    pub severity: ConflictSeverity,
    pub resolution: ConflictResolution,
}

impl AssignmentConflict {
    pub fn new(
        kind: ConflictKind,
        agents: Vec<AgentId>,
        tasks: Vec<TaskId>,
        detected_at: Timestamp,
        resolution: ConflictResolution,
    ) -> Self {
        let severity = match (&kind, &resolution) {
            (_, ConflictResolution::Unresolved { .. }) => ConflictSeverity::High,
            (ConflictKind::ResourceContention { .. }, _) => ConflictSeverity::Medium,
            (ConflictKind::SpatialConflict { .. }, _) => ConflictSeverity::Medium,
            _ => ConflictSeverity::Low,
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            agents,
            tasks,
            detected_at,
            severity,
            resolution,
        }
    }

    /// A reservation refused because `owner` holds the cell
    pub fn contention(
        cell: GridCell,
        owner: AgentId,
        rejected: AgentId,
        detected_at: Timestamp,
    ) -> Self {
        Self::new(
            ConflictKind::ResourceContention { cell },
            vec![rejected, owner],
            Vec::new(),
            detected_at,
            ConflictResolution::KeepExisting { owner, rejected },
        )
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.resolution, ConflictResolution::Unresolved { .. })
    }
}
