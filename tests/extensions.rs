//! Extensions end to end: generated files, stored assets and job records

use agency::extensions::briefing::{self, BriefingData, BRIEFING_KIND};
use agency::extensions::folder_structure::{self, StructureRequest};
use agency::extensions::social_posts::{self, SocialPostRequest, SOCIAL_POST_KIND};
use agency::{AssetFilter, Config, JobFilter, JobStatus, Toolkit, Value};
use std::fs;
use std::path::Path;

fn toolkit(dir: &Path) -> Toolkit {
    Toolkit::with_default_extensions(Config::with_data_dir(dir.join("state"))).unwrap()
}

fn sample_briefing() -> BriefingData {
    BriefingData {
        client_name: "Acme Corp".into(),
        project_name: "Spring Launch".into(),
        project_type: "Campaign".into(),
        goals: vec!["Grow awareness".into(), "Drive signups".into()],
        target_audience: "Small business owners".into(),
        timeline: "6 weeks".into(),
        budget: "$25,000".into(),
        deliverables: vec!["Landing page".into(), "Social kit".into()],
        additional_notes: String::new(),
    }
}

#[test]
fn social_post_renders_svg_and_records_its_path() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let out = tmp.path().join("posts");

    let request = SocialPostRequest::new("Summer sale starts today").style("bold");
    let generated = social_posts::generate(&toolkit, &request, Some(&out)).unwrap();

    assert_eq!(generated.asset.kind, SOCIAL_POST_KIND);
    assert_eq!(generated.job.status, JobStatus::Succeeded);
    let output_path = generated.asset.metadata.get("output_path").unwrap();
    let svg = fs::read_to_string(output_path).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("SUMMER SALE"));
}

#[test]
fn invalid_post_fails_its_job_without_an_asset() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());

    let request = SocialPostRequest::new("Hello").colors("red", "#FFFFFF");
    let err = social_posts::generate(&toolkit, &request, None).unwrap_err();
    assert!(format!("{:#}", err).contains("color"));

    assert_eq!(toolkit.entity().list(AssetFilter::kind(SOCIAL_POST_KIND)).count(), 0);
    let failed: Vec<_> = toolkit.jobs().list(JobFilter::status(JobStatus::Failed)).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].step_log[0].step_name, "create_asset");
}

#[test]
fn briefing_writes_markdown_named_after_the_project() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let out = tmp.path().join("briefings");

    let generated = briefing::generate(&toolkit, &sample_briefing(), Some(&out)).unwrap();

    assert_eq!(generated.asset.kind, BRIEFING_KIND);
    assert_eq!(generated.asset.metadata.get("format").map(String::as_str), Some("markdown"));
    let path = out.join("Spring_Launch_briefing.md");
    let markdown = fs::read_to_string(&path).unwrap();
    assert!(markdown.contains("Spring Launch"));
    assert!(markdown.contains("Acme Corp"));
    assert!(markdown.contains("Drive signups"));
}

#[test]
fn briefing_budget_must_be_currency() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());

    let mut data = sample_briefing();
    data.budget = "lots".into();
    let err = briefing::generate(&toolkit, &data, None).unwrap_err();
    assert!(format!("{:#}", err).contains("budget_is_currency"));
    assert_eq!(toolkit.store().len(), 0);
}

#[test]
fn preset_structure_creates_folders_and_readme() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let base = tmp.path().join("projects");

    let request = StructureRequest::new("Acme Rebrand", "branding").under(&base);
    let generated = folder_structure::generate(&toolkit, &request).unwrap();

    let root = base.join("Acme_Rebrand");
    assert!(root.join("04_logo_design").is_dir());
    assert!(root.join("06_applications/business_cards").is_dir());
    let readme = fs::read_to_string(root.join("README.md")).unwrap();
    assert!(readme.contains("Branding Project"));

    assert_eq!(
        generated.asset.metadata.get("project_root").map(String::as_str),
        Some(root.display().to_string().as_str())
    );
}

#[test]
fn unknown_preset_fails_in_the_resolve_step() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());

    let request = StructureRequest::new("Nowhere", "spaceship").under(tmp.path());
    let err = folder_structure::generate(&toolkit, &request).unwrap_err();
    assert!(format!("{:#}", err).contains("unknown structure type 'spaceship'"));
    assert!(!tmp.path().join("Nowhere").exists());
}

#[test]
fn custom_structure_rejects_escaping_folders() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());

    let folders = vec!["docs".to_string(), "../outside".to_string()];
    let err =
        folder_structure::generate_custom(&toolkit, "Escape", &folders, Some(tmp.path()), true).unwrap_err();
    assert!(format!("{:#}", err).contains("folders_are_relative"));
    assert!(!tmp.path().join("Escape").exists());
}

#[test]
fn project_names_cannot_leave_the_base_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let base = tmp.path().join("projects");
    let folders = vec!["docs".to_string()];

    let err = folder_structure::generate_custom(&toolkit, "../escaped", &folders, Some(&base), false)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("project_name_is_file_name"));
    assert!(!tmp.path().join("escaped").exists());

    let absolute = tmp.path().join("absolute_target");
    let request = StructureRequest::new(absolute.display().to_string(), "branding").under(&base);
    assert!(folder_structure::generate(&toolkit, &request).is_err());
    assert!(!absolute.exists());

    assert_eq!(toolkit.store().len(), 0);
}

#[test]
fn briefing_project_name_cannot_leave_the_output_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let out = tmp.path().join("nested/briefings");

    let mut data = sample_briefing();
    data.project_name = "../../outside".into();
    let err = briefing::generate(&toolkit, &data, Some(&out)).unwrap_err();
    assert!(format!("{:#}", err).contains("project_name_is_file_name"));
    assert!(!tmp.path().join("outside_briefing.md").exists());
    assert!(!out.exists());
    assert_eq!(toolkit.store().len(), 0);
}

#[test]
fn social_batch_reports_each_row() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let csv_path = tmp.path().join("posts.csv");
    fs::write(
        &csv_path,
        "text,style,color,background\n\
         First post,modern,#000000,#FFFFFF\n\
         Second post,,,\n\
         Broken post,neon,#000000,#FFFFFF\n",
    )
    .unwrap();
    let out = tmp.path().join("batch");

    let report = social_posts::generate_batch(&toolkit, &csv_path, &out).unwrap();

    assert_eq!((report.total, report.succeeded, report.failed), (3, 2, 1));
    assert!(!report.rows[2].succeeded());
    // Empty cells fall back to the defaults
    let second = toolkit.entity().read(report.rows[1].asset_id.as_deref().unwrap()).unwrap();
    assert_eq!(second.field("style"), Some(&Value::from("modern")));
    assert_eq!(fs::read_dir(&out).unwrap().count(), 2);
}

#[test]
fn briefing_batch_splits_list_columns() {
    let tmp = tempfile::tempdir().unwrap();
    let toolkit = toolkit(tmp.path());
    let csv_path = tmp.path().join("briefings.csv");
    fs::write(
        &csv_path,
        "client_name,project_name,project_type,goals,target_audience,timeline,budget,deliverables\n\
         Acme,Site Refresh,Web,Faster pages|More leads,Buyers,Q3,15k,Homepage|Blog\n",
    )
    .unwrap();

    let report = briefing::generate_batch(&toolkit, &csv_path, &tmp.path().join("out")).unwrap();
    assert_eq!(report.succeeded, 1);

    let asset = toolkit
        .entity()
        .read(report.rows[0].asset_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(
        asset.field("goals"),
        Some(&Value::from(vec!["Faster pages", "More leads"]))
    );
    assert!(tmp.path().join("out/Site_Refresh_briefing.md").exists());
}
