//! Scoring and assignment of agents to tasks.

pub mod engine;
pub mod scoring;

pub use engine::{AssignmentEngine, BatchAssignmentReport, TaskRecommendation};
pub use scoring::{ScoreBreakdown, TaskScorer};
