/// Validation Layer
///
/// Everything a payload is checked against before it enters the store:
/// - Schema definitions (field specs, type tags, constraints)
/// - Compiled schema registry with collect-all validation
/// - Named business rules and the engine that applies them

// Schema type definitions and violation reporting
pub mod types;

// Lock-free schema registry using ArcSwap
pub mod registry;

// Business rules independent of schema shape
pub mod rules;

// Re-export commonly used types
pub use registry::SchemaRegistry;
pub use rules::{Rule, RuleEngine, RuleInput, RuleReport, RuleViolation, Severity};
pub use types::{Constraint, FieldSpec, FieldViolation, Schema, TypeTag, ValidationResult, ViolationKind};
