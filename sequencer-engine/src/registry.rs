use sequencer_core::{Result, SequencerError};
use std::collections::HashMap;
use std::sync::Arc;

use crate::tasks::Task;

/// Name-keyed task registry. Enforces name uniqueness and preserves
/// insertion order for enumeration. Immutable for the duration of a run.
#[derive(Default)]
pub struct TaskRegistry {
    order: Vec<String>,
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of tasks, failing on duplicate names.
    pub fn with_tasks(tasks: Vec<Arc<dyn Task>>) -> Result<Self> {
        let mut registry = Self::new();
        for task in tasks {
            registry.register(task)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, task: Arc<dyn Task>) -> Result<()> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(SequencerError::AlreadyExists(format!(
                "task '{}' is already registered",
                name
            )));
        }
        self.order.push(name.clone());
        self.tasks.insert(name, task);
        Ok(())
    }

    pub fn get(&self, task_name: &str) -> Result<Arc<dyn Task>> {
        self.tasks.get(task_name).cloned().ok_or_else(|| {
            SequencerError::NotFound(format!("task '{}' not found in registry", task_name))
        })
    }

    pub fn contains(&self, task_name: &str) -> bool {
        self.tasks.contains_key(task_name)
    }

    /// All registered tasks in insertion order.
    pub fn get_all(&self) -> Vec<Arc<dyn Task>> {
        self.order
            .iter()
            .filter_map(|name| self.tasks.get(name).cloned())
            .collect()
    }

    /// Read-only snapshot of the name-to-task mapping. Mutating the snapshot
    /// does not affect the registry.
    pub fn tasks(&self) -> HashMap<String, Arc<dyn Task>> {
        self.tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
