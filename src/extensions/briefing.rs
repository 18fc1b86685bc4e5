/// Project briefing generation
///
/// Briefings are stored as `project_briefing` assets (budget checked by the
/// `budget_is_currency` rule) and rendered to a Markdown document.

use crate::extensions::batch::{self, BatchReport};
use crate::extensions::{into_generated, project_name_rule, Extension, Generated, PROJECT_NAME_RULE};
use crate::io;
use crate::{
    Constraint, Context, CoreResult, FieldSpec, Metadata, Payload, Rule, Schema, Step, Toolkit,
    Transform, TransformRegistry, TypeTag, Value, WorkflowDefinition,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const BRIEFING_KIND: &str = "project_briefing";
pub const BRIEFING_WORKFLOW: &str = "briefing_generation";
pub const BUDGET_RULE: &str = "budget_is_currency";
pub const MARKDOWN_TRANSFORM: &str = "briefing_to_markdown";

const TEXT_FIELDS: [&str; 6] = [
    "client_name",
    "project_name",
    "project_type",
    "target_audience",
    "timeline",
    "budget",
];
const LIST_FIELDS: [&str; 2] = ["goals", "deliverables"];

/// Everything a briefing document needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefingData {
    pub client_name: String,
    pub project_name: String,
    pub project_type: String,
    pub goals: Vec<String>,
    pub target_audience: String,
    pub timeline: String,
    pub budget: String,
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub additional_notes: String,
}

impl BriefingData {
    fn to_context(&self, output_dir: Option<&Path>) -> Context {
        let mut context = Context::new()
            .with("client_name", self.client_name.as_str())
            .with("project_name", self.project_name.as_str())
            .with("project_type", self.project_type.as_str())
            .with("goals", self.goals.clone())
            .with("target_audience", self.target_audience.as_str())
            .with("timeline", self.timeline.as_str())
            .with("budget", self.budget.as_str())
            .with("deliverables", self.deliverables.clone());
        if !self.additional_notes.is_empty() {
            context = context.with("additional_notes", self.additional_notes.as_str());
        }
        match output_dir {
            Some(dir) => context.with("output_dir", dir.display().to_string()),
            None => context,
        }
    }
}

/// Installs the briefing schema, the budget rule, the Markdown transform and the workflow
pub struct Briefings;

impl Extension for Briefings {
    fn name(&self) -> &'static str {
        "briefings"
    }

    fn install(&self, toolkit: &Toolkit) -> CoreResult<()> {
        toolkit.schemas().register(schema())?;
        toolkit.rules().register(
            Rule::currency(BUDGET_RULE, "budget")
                .describe("Budget must parse as a currency amount, e.g. \"$10,000\" or \"15k\""),
        );
        toolkit.rules().register(project_name_rule());
        toolkit.entity().bind_rules(BRIEFING_KIND, [BUDGET_RULE, PROJECT_NAME_RULE]);
        toolkit.transforms().register(Transform::new(
            MARKDOWN_TRANSFORM,
            "briefing_data",
            "markdown",
            |input| {
                let payload = input
                    .as_map()
                    .ok_or_else(|| anyhow::anyhow!("briefing data must be a map"))?;
                Ok(Value::from(render_markdown(payload)))
            },
        ));
        toolkit
            .workflows()
            .register(workflow(Arc::clone(toolkit.transforms())))?;
        Ok(())
    }
}

pub fn schema() -> Schema {
    let mut schema = Schema::new(BRIEFING_KIND).describe("Project briefing");
    for name in TEXT_FIELDS {
        schema = schema.field(FieldSpec::required(name, TypeTag::Text).with(Constraint::MinLength(1)));
    }
    for name in LIST_FIELDS {
        schema = schema.field(FieldSpec::required(name, TypeTag::List).with(Constraint::MinItems(1)));
    }
    schema.field(FieldSpec::optional("additional_notes", TypeTag::Text))
}

pub fn workflow(transforms: Arc<TransformRegistry>) -> WorkflowDefinition {
    WorkflowDefinition::new(BRIEFING_WORKFLOW)
        .describe("Validate, store and render a project briefing")
        .step(Step::new("create_asset", |ctx, entity| {
            let asset = entity.create(BRIEFING_KIND, briefing_payload(ctx), None)?;
            Ok(ctx.with("asset_id", asset.id))
        }))
        .step(
            Step::new("render_markdown", move |ctx, entity| {
                let asset_id = ctx.require_str("asset_id")?;
                let asset = entity.read(asset_id)?;
                let markdown = transforms.apply(MARKDOWN_TRANSFORM, &Value::Map(asset.payload.clone()))?;

                let Some(dir) = ctx.str("output_dir") else {
                    return Ok(ctx.clone());
                };
                let project = asset
                    .field("project_name")
                    .and_then(Value::as_str)
                    .unwrap_or(asset_id);
                let path = io::write_text(
                    Path::new(dir).join(format!("{}_briefing.md", io::file_stem(project)?)),
                    markdown.as_str().unwrap_or_default(),
                )?;
                let output_path = path.display().to_string();

                let mut metadata = Metadata::new();
                metadata.insert("output_path".into(), output_path.clone());
                metadata.insert("format".into(), "markdown".into());
                entity.update_metadata(asset_id, metadata)?;
                Ok(ctx.with("output_path", output_path))
            })
            .retry(2),
        )
}

/// Generate one briefing; the Markdown file is written to `output_dir` when given
pub fn generate(toolkit: &Toolkit, data: &BriefingData, output_dir: Option<&Path>) -> anyhow::Result<Generated> {
    let job = toolkit
        .engine()
        .run_named(BRIEFING_WORKFLOW, data.to_context(output_dir))?;
    into_generated(toolkit, job)
}

/// One briefing per CSV row; `goals` and `deliverables` are `|`-separated
pub fn generate_batch(toolkit: &Toolkit, csv_path: &Path, output_dir: &Path) -> anyhow::Result<BatchReport> {
    let rows = io::read_csv(csv_path)?;
    Ok(batch::process_rows(
        toolkit.engine(),
        BRIEFING_WORKFLOW,
        rows,
        &batch::output_dir_entry(output_dir),
    )?)
}

/// Briefing fields from the context; text list fields are split on `|`
fn briefing_payload(ctx: &Context) -> Payload {
    let mut payload = Payload::new();
    for name in TEXT_FIELDS.iter().chain(["additional_notes"].iter()) {
        if let Some(value) = ctx.get(name) {
            payload.insert(name.to_string(), value.clone());
        }
    }
    for name in LIST_FIELDS {
        let value = match ctx.get(name) {
            Some(Value::Text(text)) => Value::from(split_list(text)),
            Some(other) => other.clone(),
            None => continue,
        };
        payload.insert(name.to_string(), value);
    }
    payload
}

fn split_list(text: &str) -> Vec<String> {
    text.split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render briefing data as a Markdown document
pub fn render_markdown(payload: &Payload) -> String {
    let text = |key: &str| payload.get(key).map(|v| v.to_string()).unwrap_or_default();
    let items = |key: &str| -> Vec<String> {
        payload
            .get(key)
            .and_then(Value::as_list)
            .map(|list| list.iter().map(|item| item.to_string()).collect())
            .unwrap_or_default()
    };
    let bullets = |key: &str| -> String {
        items(key).iter().map(|item| format!("- {}\n", item)).collect()
    };

    let mut md = format!(
        "# Project Briefing: {project}\n\n\
         ## Client\n\n**{client}**\n\n\
         ## Project Overview\n\n\
         - **Type**: {kind}\n\
         - **Timeline**: {timeline}\n\
         - **Budget**: {budget}\n\n\
         ## Goals\n\n{goals}\n\
         ## Target Audience\n\n{audience}\n\n\
         ## Deliverables\n\n{deliverables}",
        project = text("project_name"),
        client = text("client_name"),
        kind = text("project_type"),
        timeline = text("timeline"),
        budget = text("budget"),
        goals = bullets("goals"),
        audience = text("target_audience"),
        deliverables = bullets("deliverables"),
    );

    let notes = text("additional_notes");
    if !notes.is_empty() {
        md.push_str(&format!("\n## Additional Notes\n\n{}\n", notes));
    }
    md
}
