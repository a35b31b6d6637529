//! Multi-agent collaboration
//!
//! Groups of agents working one task, the spatial reservation table, and
//! the arbiter that coordinates both and settles assignment conflicts.

mod arbiter;
mod conflict;
mod group;
mod report;
mod reservation;

pub use arbiter::CollaborationArbiter;
pub use conflict::{AssignmentConflict, ConflictKind, ConflictResolution, ConflictSeverity};
pub use group::{
    CollaborationGroup, CollaborationRole, CollaborationType, GroupStatus, Participant,
};
pub use report::{CoordinationReport, EfficiencyReport, SweepReport};
pub use reservation::{ReservationTable, ResourceReservation};
