/// Workflow registry using ArcSwap
///
/// Provides lock-free reads of named workflow definitions. Each registration swaps
/// the entire map, so jobs already running keep the definition they started with.

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::workflow::types::{WorkflowDefinition, WorkflowSummary};
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// Lock-free registry of named workflow definitions
///
/// Definitions are validated on registration, so anything returned by `get` is
/// ready to submit.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    /// Key: workflow name, Value: validated definition
    workflows: ArcSwap<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition under its name
    ///
    /// Returns `true` when an existing definition was replaced.
    pub fn register(&self, definition: WorkflowDefinition) -> CoreResult<bool> {
        definition.validate()?;
        let name = definition.name.clone();
        let steps = definition.steps.len();
        let definition = Arc::new(definition);

        let previous = self.workflows.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&definition));
            next
        });

        let replaced = previous.contains_key(&name);
        tracing::info!(
            "📊 {} workflow '{}' ({} steps)",
            if replaced { "Replaced" } else { "Registered" },
            name,
            steps
        );
        Ok(replaced)
    }

    /// Get a definition by name (lock-free read)
    pub fn get(&self, name: &str) -> CoreResult<Arc<WorkflowDefinition>> {
        self.workflows
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::not_found(EntityKind::Workflow, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.load().contains_key(name)
    }

    /// Summaries of all registered workflows, sorted by name
    pub fn list(&self) -> Vec<WorkflowSummary> {
        let workflows = self.workflows.load();
        let mut summaries: Vec<WorkflowSummary> = workflows
            .values()
            .map(|definition| WorkflowSummary::from(definition.as_ref()))
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Remove a definition; returns whether it was registered
    pub fn remove(&self, name: &str) -> bool {
        let previous = self.workflows.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(name);
            next
        });
        let removed = previous.contains_key(name);
        if removed {
            tracing::info!("Removed workflow from registry: {}", name);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::Step;

    fn definition(name: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(name).step(Step::new("only", |ctx, _| Ok(ctx.clone())))
    }

    #[test]
    fn register_get_list_remove() {
        let registry = WorkflowRegistry::new();
        assert!(!registry.register(definition("b")).unwrap());
        assert!(!registry.register(definition("a")).unwrap());
        assert!(registry.register(definition("a")).unwrap());

        let names: Vec<String> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().steps.len(), 1);

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(registry.get("a").unwrap_err().is_not_found());
    }

    #[test]
    fn invalid_definitions_are_not_registered() {
        let registry = WorkflowRegistry::new();
        assert!(registry.register(WorkflowDefinition::new(" ")).is_err());
        assert!(registry.list().is_empty());
    }
}
