/// Configuration management for the agency toolkit
///
/// Handles storage locations, workflow retry timing and log filtering.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Persisted state locations
    pub storage: StorageConfig,
    /// Workflow execution tuning
    pub workflow: WorkflowConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Where and how core state is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for all persisted state (default: ".agency")
    pub data_dir: PathBuf,
    /// Asset snapshot file; defaults to `{data_dir}/assets.json`
    pub asset_file: Option<PathBuf>,
    /// Job log snapshot file; defaults to `{data_dir}/jobs.json`
    pub job_file: Option<PathBuf>,
    /// Persist job records at all
    pub persist_jobs: bool,
    /// Persist on every mutation instead of only on flush/teardown
    pub autosave: bool,
}

/// Workflow engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// First delay before a retried step runs again
    pub retry_backoff_ms: u64,
    /// Upper bound for the exponential backoff
    pub retry_backoff_max_ms: u64,
}

/// Log filtering for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "agency=debug"
    pub filter: String,
}

impl StorageConfig {
    /// Storage rooted at `data_dir` with default file names
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            asset_file: None,
            job_file: None,
            persist_jobs: true,
            autosave: true,
        }
    }

    pub fn asset_file(&self) -> PathBuf {
        self.asset_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("assets.json"))
    }

    /// Job log location, or `None` when job persistence is disabled
    pub fn job_file(&self) -> Option<PathBuf> {
        if !self.persist_jobs {
            return None;
        }
        Some(
            self.job_file
                .clone()
                .unwrap_or_else(|| self.data_dir.join("jobs.json")),
        )
    }
}

impl WorkflowConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms.max(self.retry_backoff_ms))
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 100,
            retry_backoff_max_ms: 5_000,
        }
    }
}

impl Config {
    /// Default configuration with all state under `data_dir` (used by tests and `--data-dir`)
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.storage = StorageConfig::in_dir(data_dir.as_ref());
        config
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR overrides
    fn default() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("AGENCY_DATA_DIR").unwrap_or_else(|_| ".agency".to_string()),
        );
        let job_log = std::env::var("AGENCY_JOB_LOG").ok();
        let workflow_defaults = WorkflowConfig::default();

        Self {
            storage: StorageConfig {
                data_dir,
                asset_file: std::env::var("AGENCY_STORE_FILE").ok().map(PathBuf::from),
                // An explicitly empty AGENCY_JOB_LOG disables job persistence
                persist_jobs: job_log.as_deref() != Some(""),
                job_file: job_log.filter(|v| !v.is_empty()).map(PathBuf::from),
                autosave: std::env::var("AGENCY_AUTOSAVE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
            },
            workflow: WorkflowConfig {
                retry_backoff_ms: std::env::var("AGENCY_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(workflow_defaults.retry_backoff_ms),
                retry_backoff_max_ms: std::env::var("AGENCY_RETRY_BACKOFF_MAX_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(workflow_defaults.retry_backoff_max_ms),
            },
            logging: LoggingConfig {
                filter: std::env::var("AGENCY_LOG").unwrap_or_else(|_| "info".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_default_to_data_dir() {
        let storage = StorageConfig::in_dir("/tmp/agency-state");
        assert_eq!(storage.asset_file(), PathBuf::from("/tmp/agency-state/assets.json"));
        assert_eq!(storage.job_file(), Some(PathBuf::from("/tmp/agency-state/jobs.json")));
    }

    #[test]
    fn job_persistence_can_be_disabled() {
        let mut storage = StorageConfig::in_dir("state");
        storage.persist_jobs = false;
        assert!(storage.job_file().is_none());
    }

    #[test]
    fn backoff_cap_never_below_base() {
        let workflow = WorkflowConfig { retry_backoff_ms: 500, retry_backoff_max_ms: 10 };
        assert_eq!(workflow.retry_backoff_max(), Duration::from_millis(500));
    }
}
