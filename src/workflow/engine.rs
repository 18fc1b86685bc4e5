/// Workflow execution engine
///
/// Runs a workflow definition as one tracked job: steps execute strictly in
/// definition order on the calling thread, each step's outcome is appended to the
/// job's step log, and the step's failure policy decides whether the job continues.

use crate::config::WorkflowConfig;
use crate::entity::AssetEntity;
use crate::error::{CoreError, CoreResult};
use crate::jobs::{JobRecord, JobRegistry, JobStatus, StepError, StepResult, StepStatus};
use crate::workflow::registry::WorkflowRegistry;
use crate::workflow::types::{Context, FailurePolicy, Step, WorkflowDefinition};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Synchronous workflow executor
///
/// Cheap to share behind an `Arc`; independent jobs may be submitted from several
/// threads at once. The asset store and job registry are the only shared state.
#[derive(Debug)]
pub struct WorkflowEngine {
    entity: Arc<AssetEntity>,
    jobs: Arc<JobRegistry>,
    workflows: Arc<WorkflowRegistry>,
    config: WorkflowConfig,
}

/// What happened when one step ran (including retries)
struct StepOutcome {
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    attempts: u32,
    result: Result<Context, String>,
}

impl WorkflowEngine {
    pub fn new(
        entity: Arc<AssetEntity>,
        jobs: Arc<JobRegistry>,
        workflows: Arc<WorkflowRegistry>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            entity,
            jobs,
            workflows,
            config,
        }
    }

    pub fn entity(&self) -> &Arc<AssetEntity> {
        &self.entity
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn workflows(&self) -> &Arc<WorkflowRegistry> {
        &self.workflows
    }

    /// Execute `definition` as a new job and return its id once it is terminal
    ///
    /// Step failures never surface here; they end up in the job's status and step
    /// log. Errors are returned only for invalid definitions and for job log
    /// persistence failures.
    pub fn submit(&self, definition: &WorkflowDefinition, initial: Context) -> CoreResult<String> {
        definition.validate()?;
        let job = self.jobs.create_job(&definition.name, initial.payload().clone())?;
        let started = Instant::now();
        tracing::info!(
            "🚀 Starting job {} for workflow '{}' ({} steps)",
            job.id,
            definition.name,
            definition.steps.len()
        );

        if let Err(e) = self.drive(&job.id, definition, initial) {
            // Best effort: a job must not stay running after the engine gave up on it
            if let Err(mark) = self.jobs.finish(&job.id, JobStatus::Failed, None, Some(e.to_string())) {
                tracing::error!("❌ Could not mark job {} failed: {}", job.id, mark);
            }
            return Err(e);
        }

        tracing::info!(
            "🏁 Job {} for workflow '{}' finished in {:?}",
            job.id,
            definition.name,
            started.elapsed()
        );
        Ok(job.id)
    }

    /// Execute a registered workflow by name
    pub fn submit_named(&self, name: &str, initial: Context) -> CoreResult<String> {
        let definition = self.workflows.get(name)?;
        self.submit(&definition, initial)
    }

    /// `submit` followed by fetching the terminal job record
    pub fn run(&self, definition: &WorkflowDefinition, initial: Context) -> CoreResult<JobRecord> {
        let job_id = self.submit(definition, initial)?;
        self.jobs.get(&job_id)
    }

    pub fn run_named(&self, name: &str, initial: Context) -> CoreResult<JobRecord> {
        let job_id = self.submit_named(name, initial)?;
        self.jobs.get(&job_id)
    }

    fn drive(&self, job_id: &str, definition: &WorkflowDefinition, initial: Context) -> CoreResult<()> {
        self.jobs.set_status(job_id, JobStatus::Running)?;

        let total = definition.steps.len();
        let mut context = initial;

        for (index, step) in definition.steps.iter().enumerate() {
            tracing::debug!("📍 Job {} step {}/{}: '{}'", job_id, index + 1, total, step.name);
            let outcome = self.execute_step(step, &context);

            match outcome.result {
                Ok(next) => {
                    self.jobs.append_step_result(
                        job_id,
                        StepResult {
                            step_name: step.name.clone(),
                            status: StepStatus::Succeeded,
                            started_at: outcome.started_at,
                            ended_at: outcome.ended_at,
                            attempts: outcome.attempts,
                            error: None,
                            output: Some(next.payload().clone()),
                        },
                    )?;
                    context = next;
                }
                Err(cause) => {
                    let failure = CoreError::WorkflowStep {
                        step: step.name.clone(),
                        cause: cause.clone(),
                        context: context.payload().clone(),
                    };
                    self.jobs.append_step_result(
                        job_id,
                        StepResult {
                            step_name: step.name.clone(),
                            status: StepStatus::Failed,
                            started_at: outcome.started_at,
                            ended_at: outcome.ended_at,
                            attempts: outcome.attempts,
                            error: Some(StepError {
                                cause,
                                context: context.payload().clone(),
                                policy: step.on_failure.to_string(),
                            }),
                            output: None,
                        },
                    )?;

                    if step.on_failure == FailurePolicy::Skip {
                        tracing::warn!("⏭️ Job {}: {} (skipped, continuing)", job_id, failure);
                        continue;
                    }

                    tracing::error!("❌ Job {} aborted: {}", job_id, failure);
                    self.jobs
                        .finish(job_id, JobStatus::Failed, None, Some(failure.to_string()))?;
                    return Ok(());
                }
            }
        }

        self.jobs
            .finish(job_id, JobStatus::Succeeded, Some(context.into_payload()), None)?;
        Ok(())
    }

    /// Run one step, retrying per its policy
    fn execute_step(&self, step: &Step, context: &Context) -> StepOutcome {
        let max_attempts = match step.on_failure {
            FailurePolicy::Retry { attempts } => attempts.saturating_add(1),
            FailurePolicy::Abort | FailurePolicy::Skip => 1,
        };
        let started_at = Utc::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match invoke(step, context, &self.entity) {
                Ok(next) => {
                    return StepOutcome {
                        started_at,
                        ended_at: Utc::now(),
                        attempts: attempt,
                        result: Ok(next),
                    }
                }
                Err(cause) if attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "🔁 Step '{}' failed (attempt {}/{}): {}; retrying in {:?}",
                        step.name,
                        attempt,
                        max_attempts,
                        cause,
                        delay
                    );
                    std::thread::sleep(delay);
                }
                Err(cause) => {
                    return StepOutcome {
                        started_at,
                        ended_at: Utc::now(),
                        attempts: attempt,
                        result: Err(cause),
                    }
                }
            }
        }
    }

    /// Delay before retry number `attempt`: base * 2^(attempt-1), capped
    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.config
            .retry_backoff()
            .saturating_mul(1_u32 << shift)
            .min(self.config.retry_backoff_max())
    }
}

/// Invoke a step action, turning both errors and panics into a failure cause
fn invoke(step: &Step, context: &Context, entity: &AssetEntity) -> Result<Context, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| (step.action)(context, entity))) {
        Ok(Ok(next)) => Ok(next),
        Ok(Err(error)) => Err(format!("{:#}", error)),
        Err(payload) => Err(format!("step panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
