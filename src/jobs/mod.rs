/// Job Tracking Layer
///
/// One `JobRecord` per workflow invocation, queryable after the fact:
/// - Job and step result types with the job state machine
/// - The registry that owns records and keeps step logs append-only

// Job, step result and filter types
pub mod types;

// Registry with optional snapshot persistence
pub mod registry;

// Re-export commonly used types
pub use registry::JobRegistry;
pub use types::{JobFilter, JobRecord, JobStatus, StepError, StepResult, StepStatus};
