/// Project folder scaffolding
///
/// Creates a project root with a preset (or custom) list of folders. The structure
/// is recorded as an asset so it can be listed and audited later.

use crate::extensions::{into_generated, project_name_rule, Extension, Generated, PROJECT_NAME_RULE};
use crate::io;
use crate::{
    Constraint, Context, CoreResult, FieldSpec, Metadata, Payload, Rule, RuleInput, Schema, Step,
    Toolkit, TypeTag, Value, WorkflowDefinition,
};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

pub const STRUCTURE_KIND: &str = "folder_structure";
pub const CUSTOM_STRUCTURE_KIND: &str = "custom_folder_structure";
pub const STRUCTURE_WORKFLOW: &str = "folder_structure_generation";
pub const CUSTOM_STRUCTURE_WORKFLOW: &str = "custom_folder_structure";
pub const RELATIVE_FOLDERS_RULE: &str = "folders_are_relative";

/// A named, predefined folder layout
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FolderPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub folders: &'static [&'static str],
}

pub const PRESETS: [FolderPreset; 4] = [
    FolderPreset {
        key: "agency_standard",
        name: "Agency Standard",
        folders: &[
            "01_brief",
            "02_research",
            "03_concepts",
            "04_design",
            "05_final_delivery",
            "06_assets",
            "06_assets/logos",
            "06_assets/images",
            "06_assets/fonts",
            "07_archive",
        ],
    },
    FolderPreset {
        key: "social_media",
        name: "Social Media Campaign",
        folders: &[
            "01_brief_strategy",
            "02_content_calendar",
            "03_graphics",
            "03_graphics/posts",
            "03_graphics/stories",
            "03_graphics/ads",
            "04_copy",
            "05_final_exports",
            "06_analytics",
        ],
    },
    FolderPreset {
        key: "web_project",
        name: "Web Project",
        folders: &[
            "01_brief",
            "02_research_ux",
            "03_wireframes",
            "04_design_mockups",
            "05_assets",
            "05_assets/images",
            "05_assets/icons",
            "05_assets/fonts",
            "06_development_handoff",
            "07_final_delivery",
        ],
    },
    FolderPreset {
        key: "branding",
        name: "Branding Project",
        folders: &[
            "01_brief_research",
            "02_moodboards",
            "03_concepts",
            "04_logo_design",
            "05_brand_guidelines",
            "06_applications",
            "06_applications/business_cards",
            "06_applications/letterhead",
            "06_applications/social_media",
            "07_final_delivery",
        ],
    },
];

pub fn preset(key: &str) -> Option<&'static FolderPreset> {
    PRESETS.iter().find(|preset| preset.key == key)
}

/// Scaffold from a preset
#[derive(Debug, Clone)]
pub struct StructureRequest {
    pub project_name: String,
    pub structure_type: String,
    /// Where the project root is created; `None` only records the asset
    pub base_path: Option<PathBuf>,
    pub create_readme: bool,
}

impl StructureRequest {
    pub fn new(project_name: impl Into<String>, structure_type: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            structure_type: structure_type.into(),
            base_path: None,
            create_readme: true,
        }
    }

    pub fn under(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }
}

pub struct FolderStructures;

impl Extension for FolderStructures {
    fn name(&self) -> &'static str {
        "folder_structures"
    }

    fn install(&self, toolkit: &Toolkit) -> CoreResult<()> {
        let schemas = toolkit.schemas();
        schemas.register(
            Schema::new(STRUCTURE_KIND)
                .describe("Project folder structure from a preset")
                .field(project_name_field())
                .field(FieldSpec::required("structure_type", TypeTag::Text).with(Constraint::OneOf(
                    PRESETS.iter().map(|p| p.key.to_string()).collect(),
                )))
                .field(folders_field()),
        )?;
        schemas.register(
            Schema::new(CUSTOM_STRUCTURE_KIND)
                .describe("Project folder structure from a custom list")
                .field(project_name_field())
                .field(folders_field()),
        )?;

        toolkit.rules().register(
            Rule::new(RELATIVE_FOLDERS_RULE, folders_are_relative)
                .describe("Folders must be relative paths inside the project root"),
        );
        toolkit.rules().register(project_name_rule());
        let entity = toolkit.entity();
        entity.bind_rules(STRUCTURE_KIND, [RELATIVE_FOLDERS_RULE, PROJECT_NAME_RULE]);
        entity.bind_rules(CUSTOM_STRUCTURE_KIND, [RELATIVE_FOLDERS_RULE, PROJECT_NAME_RULE]);

        let workflows = toolkit.workflows();
        workflows.register(
            WorkflowDefinition::new(STRUCTURE_WORKFLOW)
                .describe("Scaffold a project folder structure from a preset")
                .step(Step::new("resolve_preset", resolve_preset))
                .step(create_asset_step(STRUCTURE_KIND, &["project_name", "structure_type", "folders"]))
                .step(create_folders_step(true)),
        )?;
        workflows.register(
            WorkflowDefinition::new(CUSTOM_STRUCTURE_WORKFLOW)
                .describe("Scaffold a project folder structure from a custom folder list")
                .step(create_asset_step(CUSTOM_STRUCTURE_KIND, &["project_name", "folders"]))
                .step(create_folders_step(false)),
        )?;
        Ok(())
    }
}

fn project_name_field() -> FieldSpec {
    FieldSpec::required("project_name", TypeTag::Text).with(Constraint::MinLength(1))
}

fn folders_field() -> FieldSpec {
    FieldSpec::required("folders", TypeTag::List).with(Constraint::MinItems(1))
}

/// Every folder must be non-empty text naming a path below the project root
fn folders_are_relative(input: &RuleInput<'_>) -> Result<(), String> {
    let Some(folders) = input.field("folders").and_then(Value::as_list) else {
        return Ok(());
    };
    let bad: Vec<String> = folders
        .iter()
        .filter(|folder| !folder.as_str().map_or(false, is_inside_root))
        .map(|folder| folder.to_string())
        .collect();
    if bad.is_empty() {
        Ok(())
    } else {
        Err(format!("folders escape the project root or are empty: {}", bad.join(", ")))
    }
}

fn is_inside_root(folder: &str) -> bool {
    let path = Path::new(folder);
    !folder.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn resolve_preset(ctx: &Context, _: &crate::AssetEntity) -> anyhow::Result<Context> {
    let key = ctx.str("structure_type").unwrap_or("agency_standard");
    let preset = preset(key).ok_or_else(|| {
        let available: Vec<&str> = PRESETS.iter().map(|p| p.key).collect();
        anyhow::anyhow!("unknown structure type '{}' (available: {})", key, available.join(", "))
    })?;
    Ok(ctx
        .with("structure_type", preset.key)
        .with("structure_name", preset.name)
        .with("folders", preset.folders.to_vec()))
}

fn create_asset_step(kind: &'static str, fields: &'static [&'static str]) -> Step {
    Step::new("create_asset", move |ctx, entity| {
        let payload: Payload = fields
            .iter()
            .filter_map(|field| ctx.get(field).map(|value| (field.to_string(), value.clone())))
            .collect();
        let asset = entity.create(kind, payload, None)?;
        Ok(ctx.with("asset_id", asset.id))
    })
}

/// Create the folders under `base_path` (if set) and record where they went
fn create_folders_step(readme_by_default: bool) -> Step {
    Step::new("create_folders", move |ctx, entity| {
        let Some(base_path) = ctx.str("base_path") else {
            return Ok(ctx.clone());
        };
        let asset_id = ctx.require_str("asset_id")?;
        let asset = entity.read(asset_id)?;
        let project_name = ctx.require_str("project_name")?;
        let folders: Vec<String> = asset
            .field("folders")
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let project_root = Path::new(base_path).join(io::file_stem(project_name)?);
        let mut created = Vec::with_capacity(folders.len());
        for folder in &folders {
            let path = project_root.join(folder);
            std::fs::create_dir_all(&path)
                .map_err(|e| anyhow::anyhow!("failed to create {}: {}", path.display(), e))?;
            created.push(path.display().to_string());
        }

        let create_readme = ctx
            .get("create_readme")
            .and_then(Value::as_bool)
            .unwrap_or(readme_by_default);
        if create_readme {
            let title = ctx.str("structure_name").unwrap_or("Custom Structure");
            io::write_text(project_root.join("README.md"), &readme(project_name, title, &folders))?;
        }

        let root = project_root.display().to_string();
        let mut metadata = Metadata::new();
        metadata.insert("project_root".into(), root.clone());
        metadata.insert("created_folders".into(), serde_json::to_string(&created)?);
        entity.update_metadata(asset_id, metadata)?;

        tracing::info!("📁 Created {} folders under {}", created.len(), root);
        Ok(ctx.with("project_root", root).with("created_folders", created))
    })
}

fn readme(project_name: &str, structure_name: &str, folders: &[String]) -> String {
    let mut md = format!("# {}\n\nProject type: **{}**\n\n## Folder Structure\n\n", project_name, structure_name);
    for folder in folders {
        let depth = folder.matches('/').count();
        let leaf = folder.rsplit('/').next().unwrap_or(folder);
        md.push_str(&format!("{}- `{}/`\n", "  ".repeat(depth), leaf));
    }
    md.push_str("\n## Conventions\n\n");
    md.push_str("- File work in the numbered folder for its phase\n");
    md.push_str("- Name files `<project>_<item>_v<version>`\n");
    md.push_str("- Move superseded versions to the archive folder\n");
    md
}

/// Scaffold a preset structure
pub fn generate(toolkit: &Toolkit, request: &StructureRequest) -> anyhow::Result<Generated> {
    let mut context = Context::new()
        .with("project_name", request.project_name.as_str())
        .with("structure_type", request.structure_type.as_str())
        .with("create_readme", request.create_readme);
    if let Some(base) = &request.base_path {
        context = context.with("base_path", base.display().to_string());
    }
    let job = toolkit.engine().run_named(STRUCTURE_WORKFLOW, context)?;
    into_generated(toolkit, job)
}

/// Scaffold a custom folder list
pub fn generate_custom(
    toolkit: &Toolkit,
    project_name: &str,
    folders: &[String],
    base_path: Option<&Path>,
    create_readme: bool,
) -> anyhow::Result<Generated> {
    let mut context = Context::new()
        .with("project_name", project_name)
        .with("folders", folders.to_vec())
        .with("create_readme", create_readme);
    if let Some(base) = base_path {
        context = context.with("base_path", base.display().to_string());
    }
    let job = toolkit.engine().run_named(CUSTOM_STRUCTURE_WORKFLOW, context)?;
    into_generated(toolkit, job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_addressable_by_key() {
        assert_eq!(preset("branding").unwrap().name, "Branding Project");
        assert!(preset("nope").is_none());
        assert!(PRESETS.iter().all(|p| p.folders.iter().all(|f| is_inside_root(f))));
    }

    #[test]
    fn escaping_folders_are_rejected() {
        assert!(is_inside_root("docs/specs"));
        assert!(!is_inside_root("../outside"));
        assert!(!is_inside_root("/etc"));
        assert!(!is_inside_root("  "));
    }

    #[test]
    fn readme_indents_nested_folders() {
        let folders = vec!["06_assets".to_string(), "06_assets/logos".to_string()];
        let md = readme("Launch", "Agency Standard", &folders);
        assert!(md.contains("- `06_assets/`\n  - `logos/`\n"));
    }
}
