//! Tasks: definitions, lifecycle, work strategies and the kind factory table.

pub mod definition;
pub mod factory;
pub mod runtime;
pub mod status;
pub mod work;

pub use definition::{SkillRequirement, TaskDefinition, TaskDefinitionBuilder};
pub use factory::{TaskFactory, TaskFactoryRegistry};
pub use runtime::{Task, TaskSnapshot, TaskUpdate};
pub use status::TaskStatus;
pub use work::{
    ConstructionWork, GenericWork, MiningWork, ResearchWork, WorkContext, WorkOutcome,
    WorkStrategy,
};
