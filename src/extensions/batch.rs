/// CSV batch processing
///
/// Every row becomes the initial context of its own workflow job, so a failing
/// row never aborts its siblings. Rows can run sequentially on the calling thread
/// or in parallel on tokio's blocking pool.

use crate::io;
use crate::{Context, CoreResult, JobRecord, JobStatus, Payload, Value, WorkflowEngine};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// What happened to one row
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// Zero-based row index (header excluded)
    pub row: usize,
    pub job_id: Option<String>,
    pub status: Option<JobStatus>,
    pub asset_id: Option<String>,
    pub error: Option<String>,
}

impl RowOutcome {
    fn from_job(row: usize, job: &JobRecord) -> Self {
        Self {
            row,
            job_id: Some(job.id.clone()),
            status: Some(job.status),
            asset_id: job
                .output_field("asset_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            error: job.error.clone(),
        }
    }

    fn from_error(row: usize, error: impl ToString) -> Self {
        Self {
            row,
            job_id: None,
            status: None,
            asset_id: None,
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(JobStatus::Succeeded)
    }
}

/// Summary of a batch run, rows in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub workflow: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows: Vec<RowOutcome>,
}

impl BatchReport {
    fn from_rows(workflow: &str, rows: Vec<RowOutcome>) -> Self {
        let succeeded = rows.iter().filter(|row| row.succeeded()).count();
        Self {
            workflow: workflow.to_string(),
            total: rows.len(),
            succeeded,
            failed: rows.len() - succeeded,
            rows,
        }
    }
}

/// Context entries that point extension steps at an output directory
pub fn output_dir_entry(output_dir: &Path) -> Payload {
    let mut extra = Payload::new();
    extra.insert("output_dir".into(), Value::from(output_dir.display().to_string()));
    extra
}

fn row_context(index: usize, row: Payload, extra: &Payload) -> Context {
    Context::from(row)
        .merge(extra.clone())
        .with("row_index", index)
}

fn run_row(engine: &WorkflowEngine, workflow: &str, index: usize, context: Context) -> RowOutcome {
    match engine.run_named(workflow, context) {
        Ok(job) => RowOutcome::from_job(index, &job),
        Err(e) => {
            tracing::error!("❌ Row {} could not be processed: {}", index, e);
            RowOutcome::from_error(index, e)
        }
    }
}

/// Run `workflow` once per row, sequentially
///
/// Fails up front with `NotFound` for an unknown workflow; after that, row
/// failures are only reported.
pub fn process_rows(
    engine: &WorkflowEngine,
    workflow: &str,
    rows: Vec<Payload>,
    extra: &Payload,
) -> CoreResult<BatchReport> {
    engine.workflows().get(workflow)?;
    tracing::info!("📦 Processing {} rows through '{}'", rows.len(), workflow);

    let outcomes = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| run_row(engine, workflow, index, row_context(index, row, extra)))
        .collect();

    let report = BatchReport::from_rows(workflow, outcomes);
    tracing::info!(
        "📦 Batch '{}' done: {} succeeded, {} failed",
        workflow,
        report.succeeded,
        report.failed
    );
    Ok(report)
}

/// Read `csv_path` and run `workflow` once per row
pub fn process_csv(
    engine: &WorkflowEngine,
    csv_path: &Path,
    workflow: &str,
    extra: &Payload,
) -> anyhow::Result<BatchReport> {
    let rows = io::read_csv(csv_path)?;
    Ok(process_rows(engine, workflow, rows, extra)?)
}

/// Run `workflow` once per row with up to `max_parallel` jobs at a time
///
/// Each job runs on tokio's blocking pool; the report keeps input order.
pub async fn process_rows_parallel(
    engine: Arc<WorkflowEngine>,
    workflow: String,
    rows: Vec<Payload>,
    extra: Payload,
    max_parallel: usize,
) -> CoreResult<BatchReport> {
    engine.workflows().get(&workflow)?;
    let permits = Arc::new(Semaphore::new(max_parallel.max(1)));
    tracing::info!(
        "📦 Processing {} rows through '{}' ({} at a time)",
        rows.len(),
        workflow,
        max_parallel.max(1)
    );

    let mut handles = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push((index, None, Some(e.to_string())));
                continue;
            }
        };
        let engine = Arc::clone(&engine);
        let workflow = workflow.clone();
        let context = row_context(index, row, &extra);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_row(&engine, &workflow, index, context)
        });
        handles.push((index, Some(handle), None));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, handle, error) in handles {
        let outcome = match (handle, error) {
            (Some(handle), _) => handle
                .await
                .unwrap_or_else(|e| RowOutcome::from_error(index, format!("row worker failed: {}", e))),
            (None, error) => RowOutcome::from_error(index, error.unwrap_or_default()),
        };
        outcomes.push(outcome);
    }

    Ok(BatchReport::from_rows(&workflow, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Step, Toolkit, WorkflowDefinition};

    fn toolkit() -> Toolkit {
        let toolkit = Toolkit::in_memory();
        toolkit
            .workflows()
            .register(WorkflowDefinition::new("echo").step(Step::new("check", |ctx, _| {
                let name = ctx.require_str("name")?;
                if name == "bad" {
                    anyhow::bail!("bad row");
                }
                Ok(ctx.with("greeting", format!("hello {}", name)))
            })))
            .unwrap();
        toolkit
    }

    fn rows(names: &[&str]) -> Vec<Payload> {
        names
            .iter()
            .map(|name| {
                let mut row = Payload::new();
                row.insert("name".into(), Value::from(*name));
                row
            })
            .collect()
    }

    #[test]
    fn failing_rows_do_not_stop_siblings() {
        let toolkit = toolkit();
        let report = process_rows(toolkit.engine(), "echo", rows(&["a", "bad", "c"]), &Payload::new()).unwrap();
        assert_eq!((report.total, report.succeeded, report.failed), (3, 2, 1));
        assert_eq!(report.rows[1].status, Some(JobStatus::Failed));
        assert!(report.rows[1].error.as_deref().unwrap().contains("bad row"));
        assert_eq!(toolkit.jobs().len(), 3);
    }

    #[test]
    fn unknown_workflow_fails_before_any_row() {
        let toolkit = toolkit();
        let err = process_rows(toolkit.engine(), "nope", rows(&["a"]), &Payload::new()).unwrap_err();
        assert!(err.is_not_found());
        assert!(toolkit.jobs().is_empty());
    }

    #[tokio::test]
    async fn parallel_rows_keep_input_order() {
        let toolkit = toolkit();
        let names = ["a", "b", "bad", "d", "e"];
        let report = process_rows_parallel(
            Arc::clone(toolkit.engine()),
            "echo".into(),
            rows(&names),
            Payload::new(),
            3,
        )
        .await
        .unwrap();

        let order: Vec<usize> = report.rows.iter().map(|row| row.row).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.failed, 1);
        assert!(!report.rows[2].succeeded());
    }
}
