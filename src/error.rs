/// Error taxonomy for the agency core
///
/// Every public core operation returns `CoreResult<T>`. Extensions and step actions
/// work with `anyhow::Result` and convert into these variants at the core boundary.

use crate::schema::types::FieldViolation;
use crate::schema::rules::RuleViolation;
use crate::storage::types::Payload;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the core modules
pub type CoreResult<T> = Result<T, CoreError>;

/// What kind of entity a `NotFound` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Asset,
    Schema,
    Rule,
    Workflow,
    Job,
    Transform,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Asset => "asset",
            EntityKind::Schema => "schema",
            EntityKind::Rule => "rule",
            EntityKind::Workflow => "workflow",
            EntityKind::Job => "job",
            EntityKind::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// Core error variants surfaced to callers of the entity, schema, workflow and job APIs
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("payload for '{kind}' failed validation: {}", join_display(.violations))]
    Validation {
        kind: String,
        violations: Vec<FieldViolation>,
    },

    #[error("rule check failed: {}", join_display(.violations))]
    RuleViolation { violations: Vec<RuleViolation> },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A step action failed; carries the context the step was invoked with
    #[error("step '{step}' failed: {cause}")]
    WorkflowStep {
        step: String,
        cause: String,
        context: Payload,
    },

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },
}

impl CoreError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for `NotFound` errors regardless of entity kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

/// Persistence failures. Each variant names the file involved.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {} cannot be decoded: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {} is incompatible: found {found}, expected {expected}", .path.display())]
    Incompatible {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("failed to encode snapshot for {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ViolationKind;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = CoreError::Validation {
            kind: "social_post".into(),
            violations: vec![
                FieldViolation::new("text", ViolationKind::Missing),
                FieldViolation::new("style", ViolationKind::NotInSet { allowed: vec!["bold".into()] }),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("text"));
        assert!(message.contains("style"));
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = CoreError::not_found(EntityKind::Workflow, "wf-missing");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "workflow not found: wf-missing");
    }
}
