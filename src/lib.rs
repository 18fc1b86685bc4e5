/// Agency: content-production toolkit on a small entity/workflow core
///
/// The core is a persistent asset store, schema and rule validation, asset CRUD,
/// a sequential workflow engine and an append-only job log. Extensions (social
/// posts, briefings, folder structures, CSV batches) are built on the public types
/// re-exported below and never reach into core internals.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by every core operation
pub mod error;

// Asset storage layer - value model, atomic snapshots and the asset store
pub mod storage;

// Validation layer - schemas and business rules
pub mod schema;

// CRUD layer enforcing validation on every mutation
pub mod entity;

// Job tracking - append-only execution records
pub mod jobs;

// Workflow management and execution
pub mod workflow;

// Named content transforms used by extension steps
pub mod transform;

// File and CSV helpers
pub mod io;

// Wiring of all components from configuration
pub mod toolkit;

// Domain extensions consuming the core
pub mod extensions;

// Command-line interface
pub mod cli;

// Re-export the core contract for extensions and external consumers
pub use config::Config;
pub use entity::AssetEntity;
pub use error::{CoreError, CoreResult, EntityKind, StorageError};
pub use jobs::{JobFilter, JobRecord, JobRegistry, JobStatus, StepError, StepResult, StepStatus};
pub use schema::{
    Constraint, FieldSpec, FieldViolation, Rule, RuleEngine, RuleInput, RuleReport, RuleViolation,
    Schema, SchemaRegistry, Severity, TypeTag, ValidationResult, ViolationKind,
};
pub use storage::{Asset, AssetFilter, AssetStore, Metadata, Payload, Value};
pub use toolkit::Toolkit;
pub use transform::{Transform, TransformRegistry};
pub use workflow::{Context, FailurePolicy, Step, WorkflowDefinition, WorkflowEngine, WorkflowRegistry};
