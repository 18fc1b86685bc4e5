/// Domain extensions built on the core
///
/// Each extension installs its schemas, rules, transforms and workflows into a
/// `Toolkit`; every generation then runs as a tracked workflow job. Extensions only
/// use the public core API re-exported from the crate root.

// Social media post generation (SVG output)
pub mod social_posts;

// Project briefing documents (Markdown output)
pub mod briefing;

// Project folder scaffolding from presets or custom lists
pub mod folder_structure;

// One workflow job per CSV row
pub mod batch;

use crate::io;
use crate::{Asset, CoreResult, JobRecord, Rule, Toolkit, Value};
use serde::Serialize;

/// Bound to every kind whose `project_name` becomes a file or folder name
pub const PROJECT_NAME_RULE: &str = "project_name_is_file_name";

/// Something that plugs schemas, rules, transforms and workflows into a toolkit
pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    /// Register everything the extension needs; must be idempotent
    fn install(&self, toolkit: &Toolkit) -> CoreResult<()>;
}

/// The extensions shipped with the toolkit
pub fn defaults() -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(social_posts::SocialPosts),
        Box::new(briefing::Briefings),
        Box::new(folder_structure::FolderStructures),
    ]
}

/// Reject project names that would place output outside the chosen directory
pub(crate) fn project_name_rule() -> Rule {
    Rule::new(PROJECT_NAME_RULE, |input| {
        match input.field("project_name").and_then(Value::as_str) {
            Some(name) => io::file_stem(name).map(|_| ()).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    })
    .describe("Project name must be usable as a single file or folder name")
}

/// Result of a successful generation job
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub asset: Asset,
    pub job: JobRecord,
}

/// Turn a terminal generation job into its asset, or into the step failure
pub(crate) fn into_generated(toolkit: &Toolkit, job: JobRecord) -> anyhow::Result<Generated> {
    if let Some(failure) = job.failure() {
        return Err(anyhow::Error::new(failure)
            .context(format!("job {} ({}) failed", job.id, job.workflow_name)));
    }
    let asset_id = job
        .output_field("asset_id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("job {} produced no asset", job.id))?;
    let asset = toolkit.entity().read(asset_id)?;
    Ok(Generated { asset, job })
}
