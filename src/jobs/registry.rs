/// Job registry
///
/// Owns every `JobRecord`. Records are only changed through this API: step log
/// entries are appended and never edited, and status changes follow the job state
/// machine. With a backing file every change is persisted before it becomes visible.

use crate::config::StorageConfig;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::jobs::types::{JobFilter, JobRecord, JobStatus, StepResult};
use crate::storage::snapshot::{SnapshotFile, SnapshotIter};
use crate::storage::types::Payload;
use arc_swap::ArcSwap;
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Format marker written into job log snapshots
pub const JOB_SNAPSHOT_FORMAT: &str = "agency.job-log";

/// Error recorded on jobs found pending or running when the log is loaded
pub const INTERRUPTED_ERROR: &str = "interrupted: the process exited before the job finished";

type JobMap = IndexMap<String, Arc<JobRecord>>;

#[derive(Debug)]
pub struct JobRegistry {
    jobs: ArcSwap<JobMap>,
    write_lock: Mutex<()>,
    snapshot: Option<SnapshotFile>,
}

impl JobRegistry {
    pub fn new(snapshot: Option<SnapshotFile>) -> Self {
        Self {
            jobs: ArcSwap::new(Arc::new(JobMap::new())),
            write_lock: Mutex::new(()),
            snapshot,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Build from configuration and load the persisted job log, if enabled
    pub fn open(config: &StorageConfig) -> CoreResult<Self> {
        let registry = Self::new(
            config
                .job_file()
                .map(|path| SnapshotFile::new(path, JOB_SNAPSHOT_FORMAT)),
        );
        registry.load()?;
        Ok(registry)
    }

    /// Rehydrate from the backing file (missing file = no jobs yet)
    ///
    /// Jobs still pending or running belonged to a process that is gone; they are
    /// failed with `INTERRUPTED_ERROR` and the log is written back.
    pub fn load(&self) -> CoreResult<usize> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(self.jobs.load().len());
        };
        let _guard = self.writer();

        let records: Vec<JobRecord> = snapshot.read()?.unwrap_or_default();
        let now = Utc::now();
        let mut interrupted = 0;
        let map: JobMap = records
            .into_iter()
            .map(|mut job| {
                if !job.status.is_terminal() {
                    job.status = JobStatus::Failed;
                    job.ended_at = Some(now);
                    job.error = Some(INTERRUPTED_ERROR.to_string());
                    interrupted += 1;
                }
                (job.id.clone(), Arc::new(job))
            })
            .collect();
        let count = map.len();

        if interrupted > 0 {
            tracing::warn!("⚠️ Marked {} interrupted jobs as failed", interrupted);
            self.commit(map)?;
        } else {
            self.jobs.store(Arc::new(map));
        }

        tracing::info!("📥 Loaded {} job records from {}", count, snapshot.path().display());
        Ok(count)
    }

    /// Allocate a new job in `pending`
    pub fn create_job(&self, workflow_name: &str, input: Payload) -> CoreResult<JobRecord> {
        let job = JobRecord::new(workflow_name, input);
        let _guard = self.writer();
        let mut next = JobMap::clone(&self.jobs.load());
        next.insert(job.id.clone(), Arc::new(job.clone()));
        self.commit(next)?;

        tracing::debug!("📋 Created job {} for workflow '{}'", job.id, workflow_name);
        Ok(job)
    }

    /// Append one entry to a job's step log
    ///
    /// Only running jobs accept new entries.
    pub fn append_step_result(&self, job_id: &str, result: StepResult) -> CoreResult<()> {
        self.modify(job_id, |job| {
            if job.status != JobStatus::Running {
                return Err(CoreError::InvalidTransition {
                    job_id: job.id.clone(),
                    from: job.status.to_string(),
                    to: format!("step log append ({})", result.step_name),
                });
            }
            job.step_log.push(result);
            Ok(())
        })
        .map(|_| ())
    }

    /// Move a job to `status`, enforcing the state machine
    pub fn set_status(&self, job_id: &str, status: JobStatus) -> CoreResult<JobRecord> {
        self.finish_with(job_id, status, None, None)
    }

    /// Move a job to a terminal status, recording its final context or failure summary
    pub fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        output: Option<Payload>,
        error: Option<String>,
    ) -> CoreResult<JobRecord> {
        self.finish_with(job_id, status, output, error)
    }

    pub fn get(&self, job_id: &str) -> CoreResult<JobRecord> {
        self.jobs
            .load()
            .get(job_id)
            .map(|job| JobRecord::clone(job))
            .ok_or_else(|| CoreError::not_found(EntityKind::Job, job_id))
    }

    /// Lazily iterate over jobs matching `filter`, in creation order
    pub fn list(&self, filter: JobFilter) -> impl Iterator<Item = JobRecord> {
        SnapshotIter::new(self.jobs.load_full(), move |job: &JobRecord| filter.matches(job))
    }

    pub fn len(&self) -> usize {
        self.jobs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force the job log to disk
    pub fn flush(&self) -> CoreResult<()> {
        let _guard = self.writer();
        self.persist(&self.jobs.load_full())
    }

    fn finish_with(
        &self,
        job_id: &str,
        status: JobStatus,
        output: Option<Payload>,
        error: Option<String>,
    ) -> CoreResult<JobRecord> {
        self.modify(job_id, |job| {
            if !job.status.can_transition_to(status) {
                return Err(CoreError::InvalidTransition {
                    job_id: job.id.clone(),
                    from: job.status.to_string(),
                    to: status.to_string(),
                });
            }
            let now = Utc::now();
            if status == JobStatus::Running {
                job.started_at = Some(now);
            }
            if status.is_terminal() {
                job.ended_at = Some(now);
                job.output = output;
                job.error = error;
            }
            job.status = status;
            Ok(())
        })
    }

    /// Copy-on-write change of one record under the writer lock
    fn modify<F>(&self, job_id: &str, change: F) -> CoreResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord) -> CoreResult<()>,
    {
        let _guard = self.writer();
        let current = self.jobs.load_full();
        let mut job = current
            .get(job_id)
            .map(|job| JobRecord::clone(job))
            .ok_or_else(|| CoreError::not_found(EntityKind::Job, job_id))?;

        change(&mut job)?;

        let mut next = JobMap::clone(&current);
        next.insert(job_id.to_string(), Arc::new(job.clone()));
        self.commit(next)?;
        Ok(job)
    }

    fn commit(&self, next: JobMap) -> CoreResult<()> {
        self.persist(&next)?;
        self.jobs.store(Arc::new(next));
        Ok(())
    }

    fn persist(&self, map: &JobMap) -> CoreResult<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let records: Vec<&JobRecord> = map.values().map(|job| job.as_ref()).collect();
        snapshot.write(&records).map_err(|e| {
            tracing::error!("❌ Failed to persist job log: {}", e);
            CoreError::from(e)
        })
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
