//! Colony Core - task scheduling for simulated settlements
//!
//! Colony Core decides which agent works on what, in which order, and
//! together with whom. It never owns agents; it reads them through the
//! [`Agent`] trait and is driven one frame at a time by the host.
//!
//! # Architecture
//!
//! 1. **Tasks** (`task`): definitions, lifecycle state machine and per-kind
//!    work strategies
//! 2. **Dependencies** (`dependency`): prerequisite DAG, cycle prevention,
//!    topological and critical-path queries
//! 3. **Manager** (`manager`): task registry, validation, dependency
//!    cascades and notifications
//! 4. **Assignment** (`assignment`): weighted scoring and greedy matching
//! 5. **Collaboration** (`collaboration`): groups, roles, spatial
//!    reservations and conflict arbitration
//!
//! # Quick Start
//!
//! ```
//! use colony_core::{AgentProfile, Scheduler, TaskDefinition, TaskStatus};
//! use colony_core::types::{SkillKind, WorkKind};
//!
//! let mut scheduler = Scheduler::new();
//!
//! let clear = scheduler
//!     .create_task(TaskDefinition::new("Clear site", WorkKind::Generic))
//!     .unwrap();
//! let walls = scheduler
//!     .create_task(
//!         TaskDefinition::builder("Raise walls", WorkKind::Construction)
//!             .requires(SkillKind::Construction, 3, 1.0)
//!             .after(clear)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! // walls wait for the site to be cleared
//! assert_eq!(scheduler.manager().status_of(walls), Some(TaskStatus::Pending));
//!
//! let agents = vec![AgentProfile::new(1).with_skill(SkillKind::Construction, 5)];
//! let report = scheduler.assign_tasks(&agents);
//! assert_eq!(report.task_for(agents[0].id), Some(clear));
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod agent;
pub mod assignment;
pub mod clock;
pub mod collaboration;
pub mod config;
pub mod dependency;
pub mod error;
pub mod events;
pub mod manager;
pub mod scheduler;
pub mod task;
pub mod types;
pub mod validation;

// Re-export commonly used types for convenience
pub use agent::{Agent, AgentLookup, AgentProfile};
pub use assignment::{AssignmentEngine, BatchAssignmentReport, TaskRecommendation, TaskScorer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaboration::{
    AssignmentConflict, CollaborationArbiter, CollaborationGroup, CollaborationRole,
    CollaborationType, CoordinationReport, GroupStatus,
};
pub use config::SchedulerConfig;
pub use dependency::DependencyGraph;
pub use error::{Result, SchedulerError};
pub use events::{SchedulerEvent, SubscriptionId};
pub use manager::{AssignmentResult, TaskManager, TaskStatistics, TickSummary};
pub use scheduler::{Scheduler, SchedulerReport, SharedScheduler, TickReport};
pub use task::{Task, TaskDefinition, TaskStatus, WorkOutcome, WorkStrategy};
pub use types::{AgentId, Position, Priority, TaskId, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
