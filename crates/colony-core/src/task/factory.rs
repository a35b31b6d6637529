//! Work-kind factory table
//!
//! Maps each [`WorkKind`] to a closure that builds the work strategy for a
//! definition. Callers override a kind's behaviour by registering their own
//! closure for it.

use std::collections::HashMap;
use std::fmt;

use crate::error::TaskError;
use crate::task::definition::TaskDefinition;
use crate::task::work::{ConstructionWork, GenericWork, MiningWork, ResearchWork, WorkStrategy};
use crate::types::WorkKind;

/// Constructor for a kind's work strategy
pub type TaskFactory = Box<dyn Fn(&TaskDefinition) -> Box<dyn WorkStrategy> + Send + Sync>;

pub struct TaskFactoryRegistry {
    factories: HashMap<WorkKind, TaskFactory>,
}

impl TaskFactoryRegistry {
    /// Registry with no factories at all
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in strategy for every kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(WorkKind::Construction, |_| Box::new(ConstructionWork));
        registry.register(WorkKind::Mining, |_| Box::new(MiningWork));
        registry.register(WorkKind::Research, |_| Box::new(ResearchWork));
        registry.register(WorkKind::Generic, |_| Box::new(GenericWork));
        registry
    }

    /// Register or replace the factory for `kind`
    pub fn register<F>(&mut self, kind: WorkKind, factory: F)
    where
        F: Fn(&TaskDefinition) -> Box<dyn WorkStrategy> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn supports(&self, kind: WorkKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build the strategy for a definition
    pub fn create(&self, definition: &TaskDefinition) -> Result<Box<dyn WorkStrategy>, TaskError> {
        self.factories
            .get(&definition.kind)
            .map(|factory| factory(definition))
            .ok_or(TaskError::UnsupportedKind(definition.kind))
    }
}

impl Default for TaskFactoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for TaskFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("TaskFactoryRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
