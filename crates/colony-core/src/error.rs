//! Error types for Colony Core
//!
//! Every fallible scheduler operation returns [`Result`]. Area-specific enums
//! (`TaskError`, `DependencyError`, ...) are defined with `thiserror` and fold
//! into [`SchedulerError`] through `#[from]`.
//!
//! Assignment failures are deliberately absent: they are reported as
//! [`crate::manager::AssignmentResult`] values, never raised.

use thiserror::Error;

use crate::types::{AgentId, GridCell, TaskId, WorkKind};

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Main error type for scheduler operations
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Task lifecycle errors
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Dependency graph errors
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// Collaboration group errors
    #[error("Collaboration error: {0}")]
    Collaboration(#[from] CollaborationError),

    /// Spatial reservation errors
    #[error("Reservation error: {0}")]
    Reservation(#[from] ReservationError),

    /// Configuration loading errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Report serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<SchedulerError>,
    },
}

/// Errors related to task definitions and runtime tasks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task already exists: {0}")]
    AlreadyExists(TaskId),

    #[error("Invalid task state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Task {task} is at capacity ({max} agents)")]
    CapacityReached { task: TaskId, max: usize },

    #[error("Agent {agent} is already assigned to task {task}")]
    AlreadyAssigned { task: TaskId, agent: AgentId },

    #[error("Task {0} cannot start without assigned agents")]
    NoAssignedAgents(TaskId),

    #[error("Unsupported work kind: {0}")]
    UnsupportedKind(WorkKind),

    #[error("Invalid task definition '{name}': {issues}")]
    InvalidDefinition { name: String, issues: String },

    #[error("Work update failed for task {task}: {reason}")]
    WorkFailed { task: TaskId, reason: String },
}

/// Errors related to the dependency graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DependencyError {
    #[error("Cannot add dependency that would create cycle: {dependent} -> {prerequisite}")]
    WouldCreateCycle {
        dependent: TaskId,
        prerequisite: TaskId,
    },

    #[error("Task {0} is already registered in the dependency graph")]
    DuplicateTask(TaskId),

    #[error("Task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("Task {0} is not registered in the dependency graph")]
    UnknownTask(TaskId),

    #[error("Prerequisite {prerequisite} of task '{name}' does not exist")]
    MissingPrerequisite { name: String, prerequisite: TaskId },

    #[error("Dependency not found: {dependent} -> {prerequisite}")]
    EdgeNotFound {
        dependent: TaskId,
        prerequisite: TaskId,
    },

    #[error("Cycle detected in dependency graph: {0:?}")]
    CycleDetected(Vec<TaskId>),
}

/// Errors related to collaboration groups
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaborationError {
    #[error("Collaboration group already exists for task {0}")]
    GroupExists(TaskId),

    #[error("No collaboration group for task {0}")]
    GroupNotFound(TaskId),

    #[error("Collaboration group for task {task} is full ({max} participants)")]
    GroupFull { task: TaskId, max: usize },

    #[error("Agent {agent} already participates in the group for task {task}")]
    AlreadyJoined { task: TaskId, agent: AgentId },

    #[error("Agent {agent} is not part of the group for task {task}")]
    NotParticipant { task: TaskId, agent: AgentId },

    #[error("Group for task {0} already has a leader")]
    LeaderTaken(TaskId),

    #[error("Agent {agent} is active in a conflicting group for task {other}")]
    ConflictingGroup { agent: AgentId, other: TaskId },

    #[error("Collaboration group for task {0} is closed")]
    GroupClosed(TaskId),
}

/// Errors related to spatial resource reservations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReservationError {
    #[error("Cell {cell} is already reserved by agent {owner}")]
    AlreadyReserved { cell: GridCell, owner: AgentId },

    #[error("Agent {agent} does not own the reservation at {cell}")]
    NotOwner { cell: GridCell, agent: AgentId },

    #[error("No active reservation at {0}")]
    NotFound(GridCell),

    #[error("Reservation duration must be positive, got {0}s")]
    InvalidDuration(f64),
}

/// Errors related to loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl SchedulerError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
