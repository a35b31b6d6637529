//! Collaboration groups: several agents working one task together.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MinParticipants;
use crate::task::SkillRequirement;
use crate::types::{AgentId, Position, TaskId, Timestamp, WorkKind};

/// Kind of collaboration, which decides activation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationType {
    Construction,
    Research,
    Mining,
    Defense,
    Generic,
}

impl CollaborationType {
    /// Participants needed before the group can activate
    pub fn min_participants(self, table: &MinParticipants) -> usize {
        match self {
            CollaborationType::Construction => table.construction,
            CollaborationType::Research => table.research,
            CollaborationType::Mining => table.mining,
            CollaborationType::Defense => table.defense,
            CollaborationType::Generic => table.generic,
        }
    }

    /// Role that must be filled before the group can activate
    pub fn required_role(self) -> Option<CollaborationRole> {
        match self {
            CollaborationType::Construction => Some(CollaborationRole::Leader),
            CollaborationType::Research => Some(CollaborationRole::Specialist),
            _ => None,
        }
    }
}

impl From<WorkKind> for CollaborationType {
    fn from(kind: WorkKind) -> Self {
        match kind {
            WorkKind::Construction => CollaborationType::Construction,
            WorkKind::Research => CollaborationType::Research,
            WorkKind::Mining => CollaborationType::Mining,
            WorkKind::Generic => CollaborationType::Generic,
        }
    }
}

impl fmt::Display for CollaborationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationRole {
    Leader,
    Specialist,
    Worker,
    Support,
}

impl fmt::Display for CollaborationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    /// Waiting for enough participants
    Forming,
    Active,
    /// Was active, lost participants
    Suspended,
    Completed,
    Failed,
}

impl GroupStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, GroupStatus::Completed | GroupStatus::Failed)
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub agent: AgentId,
    pub role: CollaborationRole,
    pub joined_at: Timestamp,
}

/// One group per collaborative task
///
/// # Invariants
///
/// - `participants.len() <= max_participants`
/// - at most one participant holds [`CollaborationRole::Leader`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationGroup {
    pub task: TaskId,
    pub kind: CollaborationType,
    pub status: GroupStatus,
    pub participants: Vec<Participant>,
    pub max_participants: usize,
    /// Requirements copied from the task when the group formed
    pub required_skills: Vec<SkillRequirement>,
    pub target: Option<Position>,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    /// Largest size the group ever reached
    pub peak_size: usize,
}

impl CollaborationGroup {
    pub fn new(
        task: TaskId,
        kind: CollaborationType,
        max_participants: usize,
        required_skills: Vec<SkillRequirement>,
        target: Option<Position>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            task,
            kind,
            status: GroupStatus::Forming,
            participants: Vec::new(),
            max_participants,
            required_skills,
            target,
            created_at,
            closed_at: None,
            peak_size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.participants.len()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.participants.iter().any(|p| p.agent == agent)
    }

    pub fn role_of(&self, agent: AgentId) -> Option<CollaborationRole> {
        self.participants
            .iter()
            .find(|p| p.agent == agent)
            .map(|p| p.role)
    }

    pub fn has_role(&self, role: CollaborationRole) -> bool {
        self.participants.iter().any(|p| p.role == role)
    }

    pub fn leader(&self) -> Option<AgentId> {
        self.participants
            .iter()
            .find(|p| p.role == CollaborationRole::Leader)
            .map(|p| p.agent)
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.participants.iter().map(|p| p.agent).collect()
    }

    /// Minimum size and required role are both satisfied
    pub fn meets_activation_rules(&self, table: &MinParticipants) -> bool {
        let enough = self.size() >= self.kind.min_participants(table);
        let roles = self
            .kind
            .required_role()
            .map_or(true, |role| self.has_role(role));
        enough && roles
    }

    pub(crate) fn add(&mut self, agent: AgentId, role: CollaborationRole, now: Timestamp) {
        self.participants.push(Participant {
            agent,
            role,
            joined_at: now,
        });
        self.peak_size = self.peak_size.max(self.participants.len());
    }

    pub(crate) fn remove(&mut self, agent: AgentId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.agent != agent);
        self.participants.len() != before
    }

    pub(crate) fn close(&mut self, status: GroupStatus, now: Timestamp) {
        self.status = status;
        self.closed_at = Some(now);
        self.participants.clear();
    }
}
