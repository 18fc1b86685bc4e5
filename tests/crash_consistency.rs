//! Snapshot durability: interrupted writes, corrupt files and reopening state

use agency::extensions::folder_structure;
use agency::{Config, CoreError, JobFilter, JobStatus, Payload, StorageError, Toolkit};
use assert_matches::assert_matches;
use std::fs;

fn scaffold(toolkit: &Toolkit, name: &str) -> String {
    folder_structure::generate_custom(toolkit, name, &["docs".to_string()], None, false)
        .unwrap()
        .asset
        .id
}

#[test]
fn state_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(tmp.path());

    let asset_id = {
        let toolkit = Toolkit::with_default_extensions(config.clone()).unwrap();
        scaffold(&toolkit, "Persisted")
    };

    let reopened = Toolkit::with_default_extensions(config).unwrap();
    let asset = reopened.entity().read(&asset_id).unwrap();
    assert_eq!(asset.version, 1);

    let jobs: Vec<_> = reopened.jobs().list(Default::default()).collect();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Succeeded);
    assert_eq!(jobs[0].step_log.len(), 2);
}

#[test]
fn interrupted_write_leaves_previous_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(tmp.path());
    let asset_file = config.storage.asset_file();

    let asset_id = {
        let toolkit = Toolkit::with_default_extensions(config.clone()).unwrap();
        scaffold(&toolkit, "Before crash")
    };

    // A crash between staging and rename leaves a partial temp file behind
    let mut staging = asset_file.clone().into_os_string();
    staging.push(".tmp");
    fs::write(&staging, b"{\"format\":\"agency.assets\",\"records\":[{\"id\":").unwrap();

    let reopened = Toolkit::with_default_extensions(config).unwrap();
    assert_eq!(reopened.store().len(), 1);
    assert!(reopened.entity().read(&asset_id).is_ok());
}

#[test]
fn corrupt_snapshot_fails_loudly_and_is_not_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(tmp.path());
    let asset_file = config.storage.asset_file();

    fs::create_dir_all(tmp.path()).unwrap();
    fs::write(&asset_file, b"{ definitely not json").unwrap();

    let err = Toolkit::open(config).unwrap_err();
    assert_matches!(err, CoreError::Storage(StorageError::Corrupt { .. }));
    assert_eq!(fs::read(&asset_file).unwrap(), b"{ definitely not json");
}

#[test]
fn foreign_snapshot_is_incompatible() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(tmp.path());

    fs::write(
        config.storage.asset_file(),
        br#"{"format":"something.else","version":1,"records":[]}"#,
    )
    .unwrap();

    let err = Toolkit::open(config).unwrap_err();
    assert_matches!(err, CoreError::Storage(StorageError::Incompatible { .. }));
}

#[test]
fn deleting_an_asset_keeps_its_job_history() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(tmp.path());

    let (asset_id, job_id) = {
        let toolkit = Toolkit::with_default_extensions(config.clone()).unwrap();
        let generated =
            folder_structure::generate_custom(&toolkit, "Short lived", &["docs".to_string()], None, false)
                .unwrap();
        toolkit.entity().delete(&generated.asset.id).unwrap();
        (generated.asset.id, generated.job.id)
    };

    let reopened = Toolkit::with_default_extensions(config).unwrap();
    assert!(reopened.entity().read(&asset_id).unwrap_err().is_not_found());

    let job = reopened.jobs().get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(
        job.output_field("asset_id").and_then(|v| v.as_str()),
        Some(asset_id.as_str())
    );
}

#[test]
fn job_left_running_by_a_crash_is_failed_on_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(tmp.path());

    let job_id = {
        let toolkit = Toolkit::open(config.clone()).unwrap();
        let job = toolkit.jobs().create_job("render", Payload::new()).unwrap();
        toolkit.jobs().set_status(&job.id, JobStatus::Running).unwrap();
        job.id
    };

    let reopened = Toolkit::open(config).unwrap();
    let job = reopened.jobs().get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().starts_with("interrupted"));
    assert_eq!(reopened.jobs().list(JobFilter::status(JobStatus::Running)).count(), 0);
}
