//! Core types for Colony Core
//!
//! This module defines the small value types shared by every component:
//! - Task and agent identifiers
//! - World positions and normalized grid cells
//! - Priority, work kinds and skill kinds
//! - Timestamps

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque task identifier
///
/// Allocated sequentially by a [`crate::manager::TaskManager`] when a
/// definition does not carry one. Equality, hashing and ordering are by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Raw numeric value
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Opaque agent ("character") identifier, owned by the host game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// World-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Normalize to the grid cell containing this position
    pub fn cell(&self) -> GridCell {
        GridCell::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

/// Normalized grid position (floor of world coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Distance between this cell's origin and a world position
    pub fn distance_to(&self, position: &Position) -> f64 {
        Position::new(self.x as f64, self.y as f64).distance_to(position)
    }
}

impl From<Position> for GridCell {
    fn from(position: Position) -> Self {
        position.cell()
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Task priority
///
/// Ordered so that a lower discriminant is more urgent:
/// `Critical < High < Normal < Low < Idle`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Idle = 4,
}

impl Priority {
    /// All priorities, most urgent first
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Idle,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Kind of work a task represents
///
/// Each kind maps to a factory in [`crate::task::TaskFactoryRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Construction,
    Mining,
    Research,
    Generic,
}

impl WorkKind {
    pub const ALL: [WorkKind; 4] = [
        WorkKind::Construction,
        WorkKind::Mining,
        WorkKind::Research,
        WorkKind::Generic,
    ];
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Skill categories an agent can be rated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    Construction,
    Mining,
    Research,
    Crafting,
    Hauling,
    Combat,
    Medicine,
    Social,
}

impl SkillKind {
    pub const ALL: [SkillKind; 8] = [
        SkillKind::Construction,
        SkillKind::Mining,
        SkillKind::Research,
        SkillKind::Crafting,
        SkillKind::Hauling,
        SkillKind::Combat,
        SkillKind::Medicine,
        SkillKind::Social,
    ];
}

impl fmt::Display for SkillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Timestamp type alias
pub type Timestamp = DateTime<Utc>;

/// Create a timestamp for the current moment
pub fn now() -> Timestamp {
    Utc::now()
}

/// Shift a timestamp by fractional seconds, rounded to the millisecond
///
/// Returns `None` when the offset is not finite or the result falls outside
/// the representable range.
pub fn offset_secs(at: Timestamp, seconds: f64) -> Option<Timestamp> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64).and_then(|delta| at.checked_add_signed(delta))
}
