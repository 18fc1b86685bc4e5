/// Core workflow type definitions
///
/// A workflow is a named, ordered list of steps. Each step is a function of the
/// current context and an `AssetEntity` handle that returns a new context; the
/// step order fixed here is exactly the execution order.

use crate::entity::AssetEntity;
use crate::error::{CoreError, CoreResult};
use crate::storage::types::{Payload, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Immutable mapping threaded from step to step
///
/// Steps never mutate the context they receive; `with` and `merge` return a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Payload);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Text value of `key`
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Text value of `key`, or an error naming the missing key
    pub fn require_str(&self, key: &str) -> anyhow::Result<&str> {
        self.str(key)
            .ok_or_else(|| anyhow::anyhow!("context is missing text value '{}'", key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copy of this context with `key` set to `value`
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.0.clone();
        next.insert(key.into(), value.into());
        Self(next)
    }

    /// Copy of this context with every entry of `entries` set
    pub fn merge(&self, entries: Payload) -> Self {
        let mut next = self.0.clone();
        next.extend(entries);
        Self(next)
    }

    pub fn payload(&self) -> &Payload {
        &self.0
    }

    pub fn into_payload(self) -> Payload {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Payload> for Context {
    fn from(payload: Payload) -> Self {
        Self(payload)
    }
}

/// Step action: `(context, entity) -> new context`
///
/// Returning `Err` signals a step failure handled by the step's failure policy.
pub type StepAction = Arc<dyn Fn(&Context, &AssetEntity) -> anyhow::Result<Context> + Send + Sync>;

/// What the engine does when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the job and mark it failed
    #[default]
    Abort,
    /// Log the failure and continue with the unchanged context
    Skip,
    /// Re-invoke up to `attempts` more times with backoff, then abort
    Retry { attempts: u32 },
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => f.write_str("abort"),
            FailurePolicy::Skip => f.write_str("skip"),
            FailurePolicy::Retry { attempts } => write!(f, "retry({})", attempts),
        }
    }
}

/// A single named unit of work
#[derive(Clone)]
pub struct Step {
    pub name: String,
    pub action: StepAction,
    pub on_failure: FailurePolicy,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("on_failure", &self.on_failure)
            .finish_non_exhaustive()
    }
}

impl Step {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Context, &AssetEntity) -> anyhow::Result<Context> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
            on_failure: FailurePolicy::Abort,
        }
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn skip_on_failure(self) -> Self {
        self.on_failure(FailurePolicy::Skip)
    }

    pub fn retry(self, attempts: u32) -> Self {
        self.on_failure(FailurePolicy::Retry { attempts })
    }
}

/// Named, ordered sequence of steps
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a step; steps run in the order they are added
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }

    /// Reject definitions that cannot run: no name, duplicate step names, or a
    /// retry policy with zero attempts
    ///
    /// A definition without steps is valid; its job succeeds with the initial
    /// context as output.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidDefinition("workflow name must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(CoreError::InvalidDefinition(format!(
                    "workflow '{}' has a step without a name",
                    self.name
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(CoreError::InvalidDefinition(format!(
                    "workflow '{}' declares step '{}' twice",
                    self.name, step.name
                )));
            }
            if step.on_failure == (FailurePolicy::Retry { attempts: 0 }) {
                return Err(CoreError::InvalidDefinition(format!(
                    "step '{}' retries zero times; use abort instead",
                    step.name
                )));
            }
        }
        Ok(())
    }
}

/// Summary used by listings
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub description: String,
    pub steps: Vec<String>,
}

impl From<&WorkflowDefinition> for WorkflowSummary {
    fn from(definition: &WorkflowDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            description: definition.description.clone(),
            steps: definition.steps.iter().map(|step| step.name.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn noop(name: &str) -> Step {
        Step::new(name, |ctx, _| Ok(ctx.clone()))
    }

    #[test]
    fn context_updates_return_new_values() {
        let base = Context::new().with("text", "hello");
        let next = base.with("style", "bold");
        assert_eq!(base.len(), 1);
        assert_eq!(next.str("style"), Some("bold"));
        assert_eq!(next.str("text"), Some("hello"));
        assert!(base.require_str("style").is_err());
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let definition = WorkflowDefinition::new("wf").step(noop("a")).step(noop("a"));
        assert_matches!(definition.validate(), Err(CoreError::InvalidDefinition(_)));
    }

    #[test]
    fn unnamed_and_zero_retry_definitions_are_rejected() {
        assert!(WorkflowDefinition::new("  ").validate().is_err());
        assert!(WorkflowDefinition::new("wf").validate().is_ok());
        let zero = WorkflowDefinition::new("wf").step(noop("a").retry(0));
        assert!(zero.validate().is_err());
        let fine = WorkflowDefinition::new("wf").step(noop("a").retry(2)).step(noop("b"));
        assert!(fine.validate().is_ok());
        assert_eq!(fine.step_names(), vec!["a", "b"]);
    }
}
