//! Scheduler configuration
//!
//! Every tunable constant of scoring, validation, work progress and
//! collaboration lives here. All sections deserialize with defaults, so a
//! TOML file only has to name the values it overrides:
//!
//! ```
//! use colony_core::config::SchedulerConfig;
//!
//! let config = SchedulerConfig::from_toml_str(
//!     r#"
//!     [collaboration]
//!     spatial_conflict_distance = 8.0
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.collaboration.spatial_conflict_distance, 8.0);
//! assert_eq!(config.scoring.priority.critical, 100.0);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::types::Priority;

/// Main scheduler configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Assignment scoring weights
    pub scoring: ScoringConfig,

    /// Validation bounds
    pub validation: ValidationConfig,

    /// Work progress tuning
    pub work: WorkConfig,

    /// Collaboration and reservation settings
    pub collaboration: CollaborationConfig,
}

impl SchedulerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scoring section
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Replace the collaboration section
    pub fn with_collaboration(mut self, collaboration: CollaborationConfig) -> Self {
        self.collaboration = collaboration;
        self
    }

    /// Replace the work section
    pub fn with_work(mut self, work: WorkConfig) -> Self {
        self.work = work;
        self
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Reject values that would make scoring or timing meaningless
    pub fn check(&self) -> Result<(), ConfigError> {
        let positive = [
            ("scoring.distance_falloff", self.scoring.distance_falloff),
            ("scoring.deadline_horizon_hours", self.scoring.deadline_horizon_hours),
            ("work.skill_divisor", self.work.skill_divisor),
            ("collaboration.sweep_interval_secs", self.collaboration.sweep_interval_secs),
            (
                "collaboration.default_reservation_secs",
                self.collaboration.default_reservation_secs,
            ),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.work.collaboration_decay) {
            return Err(ConfigError::Invalid(format!(
                "work.collaboration_decay must be in [0, 1], got {}",
                self.work.collaboration_decay
            )));
        }

        if self.collaboration.spatial_conflict_distance < 0.0 {
            return Err(ConfigError::Invalid(
                "collaboration.spatial_conflict_distance must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Discrete priority weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub critical: f64,
    pub high: f64,
    pub normal: f64,
    pub low: f64,
    pub idle: f64,
}

impl PriorityWeights {
    pub fn weight(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
            Priority::Idle => self.idle,
        }
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            critical: 100.0,
            high: 75.0,
            normal: 50.0,
            low: 25.0,
            idle: 10.0,
        }
    }
}

/// Assignment scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Priority weight table
    pub priority: PriorityWeights,

    /// Multiplier applied to `level / min_level`
    pub skill_ratio_scale: f64,

    /// Upper bound of a single requirement's skill score
    pub skill_score_cap: f64,

    /// Skill term when a task has no requirements
    pub default_skill_score: f64,

    /// Distance term at zero distance
    pub distance_max_score: f64,

    /// Distance at which the distance term reaches zero
    pub distance_falloff: f64,

    /// Distance term when a task has no target position
    pub default_distance_score: f64,

    /// Need term for agents with a critical unmet need
    pub critical_need_score: f64,

    /// Need term multiplier for happiness in [0, 1]
    pub happiness_scale: f64,

    /// Deadline term at (or past) the deadline
    pub deadline_max_score: f64,

    /// Window before a deadline in which urgency grows
    pub deadline_horizon_hours: f64,

    /// Deadline term when a task has no deadline
    pub default_deadline_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            priority: PriorityWeights::default(),
            skill_ratio_scale: 50.0,
            skill_score_cap: 100.0,
            default_skill_score: 25.0,
            distance_max_score: 50.0,
            distance_falloff: 100.0,
            default_distance_score: 25.0,
            critical_need_score: 5.0,
            happiness_scale: 25.0,
            deadline_max_score: 20.0,
            deadline_horizon_hours: 24.0,
            default_deadline_score: 10.0,
        }
    }
}

/// Validation bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Highest legal skill level in a requirement
    pub max_skill_level: u8,

    /// Slack beyond a task's work radius before a distance warning
    pub distance_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_skill_level: 20,
            distance_tolerance: 10.0,
        }
    }
}

/// Work progress tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Extra rate contributed by the second collaborator
    pub collaboration_bonus: f64,

    /// Geometric decay of the bonus for every further collaborator
    pub collaboration_decay: f64,

    /// Rate multiplier floor before skill is added
    pub skill_baseline: f64,

    /// Skill levels per +1.0 of rate multiplier
    pub skill_divisor: f64,

    /// Research skill below which an agent contributes nothing
    pub min_research_level: u8,

    /// Mining skill required when a definition names none
    pub min_mining_level: u8,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            collaboration_bonus: 0.5,
            collaboration_decay: 0.75,
            skill_baseline: 0.5,
            skill_divisor: 10.0,
            min_research_level: 3,
            min_mining_level: 1,
        }
    }
}

impl WorkConfig {
    /// Rate multiplier for `contributors` agents working together
    ///
    /// `1 + bonus + bonus*decay + bonus*decay^2 + ...` with one term per
    /// collaborator beyond the first.
    pub fn collaboration_factor(&self, contributors: usize) -> f64 {
        let mut factor = 1.0;
        let mut bonus = self.collaboration_bonus;
        for _ in 1..contributors {
            factor += bonus;
            bonus *= self.collaboration_decay;
        }
        factor
    }

    /// Rate multiplier for a (possibly averaged) skill level
    pub fn skill_factor(&self, level: f64) -> f64 {
        self.skill_baseline + level / self.skill_divisor
    }
}

/// Minimum participant counts per collaboration type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinParticipants {
    pub construction: usize,
    pub research: usize,
    pub mining: usize,
    pub defense: usize,
    pub generic: usize,
}

impl Default for MinParticipants {
    fn default() -> Self {
        Self {
            construction: 2,
            research: 1,
            mining: 1,
            defense: 2,
            generic: 1,
        }
    }
}

/// Collaboration and reservation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationConfig {
    /// Groups whose targets lie within this distance conflict for one agent
    pub spatial_conflict_distance: f64,

    /// Cadence of the collaboration sweep
    pub sweep_interval_secs: f64,

    /// Reservation lifetime used by automatic coordination
    pub default_reservation_secs: f64,

    /// Participants needed before a group activates
    pub min_participants: MinParticipants,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            spatial_conflict_distance: 5.0,
            sweep_interval_secs: 1.0,
            default_reservation_secs: 60.0,
            min_participants: MinParticipants::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = SchedulerConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = SchedulerConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            [scoring.priority]
            idle = 1.0

            [work]
            min_research_level = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.scoring.priority.idle, 1.0);
        assert_eq!(config.scoring.priority.high, 75.0);
        assert_eq!(config.work.min_research_level, 5);
        assert_eq!(config.collaboration.min_participants.construction, 2);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let err = SchedulerConfig::from_toml_str(
            r#"
            [collaboration]
            sweep_interval_secs = 0.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.toml");

        let config = SchedulerConfig::default().with_collaboration(CollaborationConfig {
            spatial_conflict_distance: 2.5,
            ..Default::default()
        });
        config.to_file(&path).unwrap();

        let loaded = SchedulerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.collaboration.spatial_conflict_distance, 2.5);
    }

    #[test]
    fn test_collaboration_factor_diminishes() {
        let work = WorkConfig::default();
        assert_eq!(work.collaboration_factor(1), 1.0);
        assert_eq!(work.collaboration_factor(2), 1.5);
        assert!((work.collaboration_factor(3) - 1.875).abs() < 1e-9);

        let gain_2 = work.collaboration_factor(2) - work.collaboration_factor(1);
        let gain_3 = work.collaboration_factor(3) - work.collaboration_factor(2);
        assert!(gain_3 < gain_2);
    }
}
