/// Job record type definitions
///
/// A `JobRecord` is the audit trail of one workflow invocation: its status, the
/// context it started with, and one `StepResult` per executed step.

use crate::error::CoreError;
use crate::storage::types::Payload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle: `pending → running → {succeeded, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether a job in `self` may move to `next`
    ///
    /// Terminal states are final; a failed job is retried by submitting a new one.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Why a step failed, with the context it was invoked with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    pub cause: String,
    /// Context snapshot at failure time
    pub context: Payload,
    /// Failure policy that was applied ("abort", "skip", "retry(n)")
    pub policy: String,
}

/// One entry in a job's step log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Number of invocations, including retries
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// Context returned by the step on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Payload>,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Execution record of one workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub workflow_name: String,
    pub status: JobStatus,
    /// Initial context the job was submitted with
    #[serde(default)]
    pub input: Payload,
    /// Append-only execution log
    pub step_log: Vec<StepResult>,
    /// Final context of a succeeded job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Payload>,
    /// Summary of why a failed job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(workflow_name: impl Into<String>, input: Payload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_name: workflow_name.into(),
            status: JobStatus::Pending,
            input,
            step_log: Vec::new(),
            output: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Last step entry, if any step ran
    pub fn last_step(&self) -> Option<&StepResult> {
        self.step_log.last()
    }

    /// The aborting step failure as a `CoreError::WorkflowStep`
    ///
    /// `None` unless the job failed because of a step (skipped failures do not count).
    pub fn failure(&self) -> Option<CoreError> {
        if self.status != JobStatus::Failed {
            return None;
        }
        let step = self.step_log.iter().rev().find(|step| !step.succeeded())?;
        let error = step.error.as_ref()?;
        Some(CoreError::WorkflowStep {
            step: step.step_name.clone(),
            cause: error.cause.clone(),
            context: error.context.clone(),
        })
    }

    /// Output value of the final context (succeeded jobs only)
    pub fn output_field(&self, key: &str) -> Option<&crate::storage::types::Value> {
        self.output.as_ref()?.get(key)
    }
}

/// Filter for listing jobs. The default matches everything.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub workflow_name: Option<String>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn workflow(name: impl Into<String>) -> Self {
        Self {
            workflow_name: Some(name.into()),
            status: None,
        }
    }

    pub fn status(status: JobStatus) -> Self {
        Self {
            workflow_name: None,
            status: Some(status),
        }
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        self.workflow_name
            .as_ref()
            .map_or(true, |name| &job.workflow_name == name)
            && self.status.map_or(true, |status| job.status == status)
    }
}
