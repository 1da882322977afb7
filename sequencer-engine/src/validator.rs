use sequencer_core::{Result, SequencerError};
use std::collections::{HashMap, HashSet};

use crate::registry::TaskRegistry;

/// Proves a caller-supplied task order is executable against the registry:
/// every referenced task exists, the dependency relation restricted to the
/// order is cycle-free, and every dependency precedes its dependent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyValidator;

impl DependencyValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, task_order: &[String], registry: &TaskRegistry) -> Result<()> {
        self.check_tasks_exist(task_order, registry)?;
        self.check_cycles(task_order, registry)?;
        self.check_order(task_order, registry)?;
        Ok(())
    }

    /// Every name in the order must resolve in the registry. Reports all
    /// missing names at once.
    fn check_tasks_exist(&self, task_order: &[String], registry: &TaskRegistry) -> Result<()> {
        let missing: Vec<&str> = task_order
            .iter()
            .filter(|name| !registry.contains(name))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            let names = missing
                .iter()
                .map(|n| format!("'{}'", n))
                .collect::<Vec<_>>()
                .join(", ");
            Err(SequencerError::Dependency(format!(
                "tasks not found in registry: {}",
                names
            )))
        }
    }

    /// Depth-first search over the graph restricted to edges whose endpoints
    /// are both in the order. A neighbor already on the recursion path is a
    /// cycle, reported as the ordered chain with the closing name repeated.
    fn check_cycles(&self, task_order: &[String], registry: &TaskRegistry) -> Result<()> {
        let in_order: HashSet<&str> = task_order.iter().map(String::as_str).collect();
        let mut graph: HashMap<&str, Vec<String>> = HashMap::new();
        for name in task_order {
            let task = registry.get(name)?;
            let deps = task
                .depends_on()
                .into_iter()
                .filter(|dep| in_order.contains(dep.as_str()))
                .collect();
            graph.insert(name.as_str(), deps);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: HashSet<String> = HashSet::new();
        let mut path: Vec<String> = Vec::new();

        for name in task_order {
            if !visited.contains(name.as_str()) {
                self.visit(name, &graph, &mut visited, &mut stack, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        node: &str,
        graph: &HashMap<&str, Vec<String>>,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        visited.insert(node.to_string());
        stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(deps) = graph.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    self.visit(dep, graph, visited, stack, path)?;
                } else if stack.contains(dep) {
                    let start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].to_vec();
                    cycle.push(dep.clone());
                    return Err(SequencerError::Dependency(format!(
                        "cyclic dependency detected: {}",
                        cycle.join(" -> ")
                    )));
                }
            }
        }

        stack.remove(node);
        path.pop();
        Ok(())
    }

    /// Every dependency must appear in the order, at a strictly earlier
    /// position than its dependent. Violations are listed per task.
    fn check_order(&self, task_order: &[String], registry: &TaskRegistry) -> Result<()> {
        let positions: HashMap<&str, usize> = task_order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        for name in task_order {
            let task = registry.get(name)?;
            let deps = task.depends_on();

            let missing: Vec<&String> = deps
                .iter()
                .filter(|dep| !positions.contains_key(dep.as_str()))
                .collect();
            if !missing.is_empty() {
                let names = missing
                    .iter()
                    .map(|d| format!("'{}'", d))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(SequencerError::Dependency(format!(
                    "task '{}' depends on tasks not in task_order: {}",
                    name, names
                )));
            }

            let position = positions[name.as_str()];
            let out_of_order: Vec<&String> = deps
                .iter()
                .filter(|dep| positions[dep.as_str()] >= position)
                .collect();
            if !out_of_order.is_empty() {
                let names = out_of_order
                    .iter()
                    .map(|d| format!("'{}'", d))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(SequencerError::Dependency(format!(
                    "task '{}' depends on tasks that come after it in task_order: {}",
                    name, names
                )));
            }
        }
        Ok(())
    }
}
