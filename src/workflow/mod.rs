/// Workflow Management Layer
///
/// This module handles workflow definitions, the named registry and execution.
/// It provides:
/// - Type definitions (Context, Step, FailurePolicy, WorkflowDefinition)
/// - Lock-free registry of named definitions using ArcSwap
/// - The synchronous engine that runs a definition as one tracked job

// Core workflow type definitions
pub mod types;

// Registry of named workflow definitions
pub mod registry;

// Step-by-step execution with failure policies
pub mod engine;

// Re-export commonly used types
pub use engine::WorkflowEngine;
pub use registry::WorkflowRegistry;
pub use types::{Context, FailurePolicy, Step, StepAction, WorkflowDefinition, WorkflowSummary};
