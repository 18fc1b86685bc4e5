/// Social media post generation
///
/// A post is validated and stored as a `social_post` asset, then rendered to a
/// square SVG card whose typography follows the chosen style.

use crate::extensions::batch::{self, BatchReport};
use crate::extensions::{into_generated, Extension, Generated};
use crate::io;
use crate::{
    Constraint, Context, CoreResult, FieldSpec, Metadata, Payload, Schema, Step, Toolkit,
    Transform, TransformRegistry, TypeTag, Value, WorkflowDefinition,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SOCIAL_POST_KIND: &str = "social_post";
pub const SOCIAL_POST_WORKFLOW: &str = "social_post_generation";
pub const RENDER_TRANSFORM: &str = "text_to_social_image";

/// Visual styles a post can be rendered in
pub const STYLES: [&str; 3] = ["modern", "minimal", "bold"];

pub const DEFAULT_STYLE: &str = "modern";
pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";

const HEX_COLOR: &str = "^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$";
const CANVAS: u32 = 1080;

/// Input for one post; unset fields take the `social_post` schema defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialPostRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl SocialPostRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn colors(mut self, color: impl Into<String>, background: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self.background = Some(background.into());
        self
    }

    fn to_context(&self, output_dir: Option<&Path>) -> Context {
        let mut context = Context::new().with("text", self.text.as_str());
        let optional = [
            ("style", &self.style),
            ("color", &self.color),
            ("background", &self.background),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                context = context.with(key, value.as_str());
            }
        }
        match output_dir {
            Some(dir) => context.with("output_dir", dir.display().to_string()),
            None => context,
        }
    }
}

/// Installs the `social_post` schema, the SVG transform and the generation workflow
pub struct SocialPosts;

impl Extension for SocialPosts {
    fn name(&self) -> &'static str {
        "social_posts"
    }

    fn install(&self, toolkit: &Toolkit) -> CoreResult<()> {
        toolkit.schemas().register(schema())?;
        toolkit.transforms().register(Transform::new(
            RENDER_TRANSFORM,
            "social_post_data",
            "svg",
            |input| {
                let payload = input
                    .as_map()
                    .ok_or_else(|| anyhow::anyhow!("social post data must be a map"))?;
                Ok(Value::from(render_svg(payload)?))
            },
        ));
        toolkit
            .workflows()
            .register(workflow(Arc::clone(toolkit.transforms())))?;
        Ok(())
    }
}

pub fn schema() -> Schema {
    let hex = || Constraint::Pattern(HEX_COLOR.to_string());
    Schema::new(SOCIAL_POST_KIND)
        .describe("Social media post")
        .field(
            FieldSpec::required("text", TypeTag::Text)
                .with(Constraint::MinLength(1))
                .with(Constraint::MaxLength(2200)),
        )
        .field(
            FieldSpec::optional("style", TypeTag::Text)
                .with(Constraint::OneOf(STYLES.iter().map(|s| s.to_string()).collect()))
                .with_default(DEFAULT_STYLE),
        )
        .field(
            FieldSpec::optional("color", TypeTag::Text)
                .with(hex())
                .with_default(DEFAULT_COLOR),
        )
        .field(
            FieldSpec::optional("background", TypeTag::Text)
                .with(hex())
                .with_default(DEFAULT_BACKGROUND),
        )
}

/// `create_asset` then `render_image` (retried, since it touches the filesystem)
pub fn workflow(transforms: Arc<TransformRegistry>) -> WorkflowDefinition {
    WorkflowDefinition::new(SOCIAL_POST_WORKFLOW)
        .describe("Validate, store and render a social media post")
        .step(Step::new("create_asset", |ctx, entity| {
            let asset = entity.create(SOCIAL_POST_KIND, post_payload(ctx), None)?;
            Ok(ctx.with("asset_id", asset.id))
        }))
        .step(
            Step::new("render_image", move |ctx, entity| {
                let asset_id = ctx.require_str("asset_id")?;
                let asset = entity.read(asset_id)?;
                let svg = transforms.apply(RENDER_TRANSFORM, &Value::Map(asset.payload))?;

                let Some(dir) = ctx.str("output_dir") else {
                    return Ok(ctx.clone());
                };
                let path = io::write_text(
                    Path::new(dir).join(format!("{}.svg", asset_id)),
                    svg.as_str().unwrap_or_default(),
                )?;
                let output_path = path.display().to_string();

                let mut metadata = Metadata::new();
                metadata.insert("output_path".into(), output_path.clone());
                entity.update_metadata(asset_id, metadata)?;
                Ok(ctx.with("output_path", output_path))
            })
            .retry(2),
        )
}

/// Generate one post; the SVG is written to `output_dir` when given
pub fn generate(
    toolkit: &Toolkit,
    request: &SocialPostRequest,
    output_dir: Option<&Path>,
) -> anyhow::Result<Generated> {
    let job = toolkit
        .engine()
        .run_named(SOCIAL_POST_WORKFLOW, request.to_context(output_dir))?;
    into_generated(toolkit, job)
}

/// One post per CSV row (columns: text, style, color, background)
pub fn generate_batch(toolkit: &Toolkit, csv_path: &Path, output_dir: &Path) -> anyhow::Result<BatchReport> {
    let rows = io::read_csv(csv_path)?;
    Ok(batch::process_rows(
        toolkit.engine(),
        SOCIAL_POST_WORKFLOW,
        rows,
        &batch::output_dir_entry(output_dir),
    )?)
}

/// Post fields present in the context; the schema fills in the rest
fn post_payload(ctx: &Context) -> Payload {
    ["text", "style", "color", "background"]
        .into_iter()
        .filter_map(|key| ctx.get(key).map(|value| (key.to_string(), value.clone())))
        .collect()
}

struct Typography {
    family: &'static str,
    size: u32,
    weight: u32,
    /// Characters per line before wrapping
    line_chars: usize,
    uppercase: bool,
}

fn typography(style: &str) -> Typography {
    match style {
        "minimal" => Typography {
            family: "Helvetica, Arial, sans-serif",
            size: 44,
            weight: 300,
            line_chars: 32,
            uppercase: false,
        },
        "bold" => Typography {
            family: "Impact, 'Arial Black', sans-serif",
            size: 76,
            weight: 900,
            line_chars: 18,
            uppercase: true,
        },
        _ => Typography {
            family: "'Inter', 'Segoe UI', sans-serif",
            size: 56,
            weight: 600,
            line_chars: 24,
            uppercase: false,
        },
    }
}

/// Render a stored post as a square SVG card with centered, wrapped text
pub fn render_svg(payload: &Payload) -> anyhow::Result<String> {
    let text_of = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("social post field '{}' is missing or not text", key))
    };
    let style = typography(text_of("style")?);
    let mut text = text_of("text")?.to_string();
    if style.uppercase {
        text = text.to_uppercase();
    }

    let lines = wrap(&text, style.line_chars);
    let line_height = style.size * 5 / 4;
    let block = line_height * lines.len().saturating_sub(1) as u32;
    let first_y = (CANVAS / 2).saturating_sub(block / 2);

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{c}\" height=\"{c}\" viewBox=\"0 0 {c} {c}\">\n",
        c = CANVAS
    );
    svg.push_str(&format!(
        "  <rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
        escape(text_of("background")?)
    ));
    svg.push_str(&format!(
        "  <text x=\"{x}\" y=\"{y}\" font-family=\"{family}\" font-size=\"{size}\" font-weight=\"{weight}\" fill=\"{fill}\" text-anchor=\"middle\" dominant-baseline=\"middle\">\n",
        x = CANVAS / 2,
        y = first_y,
        family = style.family,
        size = style.size,
        weight = style.weight,
        fill = escape(text_of("color")?),
    ));
    for (index, line) in lines.iter().enumerate() {
        let dy = if index == 0 { 0 } else { line_height };
        svg.push_str(&format!(
            "    <tspan x=\"{}\" dy=\"{}\">{}</tspan>\n",
            CANVAS / 2,
            dy,
            escape(line)
        ));
    }
    svg.push_str("  </text>\n</svg>\n");
    Ok(svg)
}

/// Greedy word wrap; words longer than a line are kept whole
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if !current.is_empty() && needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Default location for rendered posts under a data directory
pub fn default_output_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("output").join("social_posts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_keeps_long_words() {
        assert_eq!(wrap("one two three four", 9), vec!["one two", "three", "four"]);
        assert_eq!(wrap("supercalifragilistic", 5), vec!["supercalifragilistic"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn svg_escapes_text_and_applies_style() {
        let mut payload = Payload::new();
        payload.insert("text".into(), Value::from("Fish & <Chips>"));
        payload.insert("style".into(), Value::from("bold"));
        payload.insert("color".into(), Value::from("#FFFFFF"));
        payload.insert("background".into(), Value::from("#112233"));

        let svg = render_svg(&payload).unwrap();
        assert!(svg.contains("FISH &amp; &lt;CHIPS&gt;"));
        assert!(svg.contains("font-weight=\"900\""));
        assert!(svg.contains("fill=\"#112233\""));

        payload.shift_remove("color");
        assert!(render_svg(&payload).is_err());
    }

    #[test]
    fn request_leaves_unset_fields_to_the_schema() {
        let ctx = SocialPostRequest::new("Hi").style("minimal").to_context(None);
        let payload = post_payload(&ctx);
        assert_eq!(payload["style"], Value::from("minimal"));
        assert!(!payload.contains_key("color"));

        let registry = crate::SchemaRegistry::new();
        registry.register(schema()).unwrap();
        let filled = registry.apply_defaults(SOCIAL_POST_KIND, payload).unwrap();
        assert_eq!(filled["style"], Value::from("minimal"));
        assert_eq!(filled["color"], Value::from(DEFAULT_COLOR));
        assert_eq!(filled["background"], Value::from(DEFAULT_BACKGROUND));
        assert!(render_svg(&filled).unwrap().contains("fill=\"#FFFFFF\""));
    }
}
