/// Command-line interface
///
/// `agency <area> <action>`; results are printed to stdout as pretty JSON, logs go
/// to stderr. Core calls are blocking, so they run on tokio's blocking pool.

use crate::extensions::batch::{self, BatchReport};
use crate::extensions::briefing::{self, BriefingData, BRIEFING_WORKFLOW};
use crate::extensions::folder_structure::{self, StructureRequest, PRESETS};
use crate::extensions::social_posts::{self, SocialPostRequest, SOCIAL_POST_WORKFLOW};
use crate::{io, AssetFilter, Config, JobFilter, JobStatus, Payload, Toolkit};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "agency", version, about = "Agency content-production toolkit")]
pub struct Cli {
    /// Directory for persisted assets and jobs (overrides AGENCY_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate social media posts
    Social {
        #[command(subcommand)]
        action: SocialCommand,
    },
    /// Generate project briefings
    Briefing {
        #[command(subcommand)]
        action: BriefingCommand,
    },
    /// Scaffold project folder structures
    Structure {
        #[command(subcommand)]
        action: StructureCommand,
    },
    /// Run any registered workflow over a CSV file
    Batch {
        #[command(subcommand)]
        action: BatchCommand,
    },
    /// Inspect stored assets
    Assets {
        #[command(subcommand)]
        action: AssetsCommand,
    },
    /// Inspect job records
    Jobs {
        #[command(subcommand)]
        action: JobsCommand,
    },
}

/// Options shared by CSV-driven commands
#[derive(Debug, Args)]
pub struct CsvArgs {
    /// CSV file with a header row
    pub csv: PathBuf,
    /// Where generated files are written
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Rows processed at the same time
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,
}

#[derive(Debug, Subcommand)]
pub enum SocialCommand {
    /// Generate one post
    Single {
        text: String,
        /// modern, minimal or bold
        #[arg(long)]
        style: Option<String>,
        /// Text color as hex
        #[arg(long)]
        color: Option<String>,
        /// Background color as hex
        #[arg(long)]
        background: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// One post per CSV row (text,style,color,background)
    Batch(CsvArgs),
}

#[derive(Debug, Subcommand)]
pub enum BriefingCommand {
    /// Generate one briefing
    Single {
        #[arg(long)]
        client: String,
        #[arg(long)]
        project: String,
        #[arg(long = "type")]
        project_type: String,
        /// Repeat for several goals
        #[arg(long = "goal", required = true)]
        goals: Vec<String>,
        #[arg(long)]
        audience: String,
        #[arg(long)]
        timeline: String,
        #[arg(long)]
        budget: String,
        /// Repeat for several deliverables
        #[arg(long = "deliverable", required = true)]
        deliverables: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// One briefing per CSV row; goals and deliverables are `|`-separated
    Batch(CsvArgs),
}

#[derive(Debug, Subcommand)]
pub enum StructureCommand {
    /// List the available presets
    List,
    /// Scaffold a preset structure
    Create {
        project_name: String,
        #[arg(long = "type", default_value = "agency_standard")]
        structure_type: String,
        #[arg(long, default_value = ".")]
        base_path: PathBuf,
        #[arg(long)]
        no_readme: bool,
    },
    /// Scaffold a custom folder list
    Custom {
        project_name: String,
        /// Repeat for each folder, e.g. --folder docs --folder src/components
        #[arg(long = "folder", required = true)]
        folders: Vec<String>,
        #[arg(long, default_value = ".")]
        base_path: PathBuf,
        #[arg(long)]
        readme: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum BatchCommand {
    /// One job of `workflow` per CSV row
    Run {
        #[arg(long)]
        workflow: String,
        #[command(flatten)]
        csv: CsvArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum AssetsCommand {
    List {
        #[arg(long)]
        kind: Option<String>,
    },
    Show {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    List {
        #[arg(long)]
        workflow: Option<String>,
        /// pending, running, succeeded or failed
        #[arg(long)]
        status: Option<JobStatus>,
    },
    Show {
        id: String,
    },
}

/// Execute a parsed command against the state described by `config`
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let toolkit = Arc::new(
        tokio::task::spawn_blocking(move || Toolkit::with_default_extensions(config)).await??,
    );

    match cli.command {
        Command::Social { action: SocialCommand::Batch(args) } => {
            let report = run_csv(&toolkit, SOCIAL_POST_WORKFLOW, args, default_social_dir(&toolkit)).await?;
            print_json(&report)
        }
        Command::Briefing { action: BriefingCommand::Batch(args) } => {
            let report = run_csv(&toolkit, BRIEFING_WORKFLOW, args, default_briefing_dir(&toolkit)).await?;
            print_json(&report)
        }
        Command::Batch { action: BatchCommand::Run { workflow, csv } } => {
            let fallback = toolkit.config().storage.data_dir.join("output").join(&workflow);
            let report = run_csv(&toolkit, &workflow, csv, fallback).await?;
            print_json(&report)
        }
        command => {
            let toolkit = Arc::clone(&toolkit);
            tokio::task::spawn_blocking(move || dispatch(&toolkit, command)).await?
        }
    }
}

/// Commands that run a single blocking operation
fn dispatch(toolkit: &Toolkit, command: Command) -> Result<()> {
    match command {
        Command::Social { action: SocialCommand::Single { text, style, color, background, output_dir } } => {
            let request = SocialPostRequest { text, style, color, background };
            let dir = output_dir.unwrap_or_else(|| default_social_dir(toolkit));
            print_json(&social_posts::generate(toolkit, &request, Some(&dir))?)
        }
        Command::Briefing {
            action:
                BriefingCommand::Single {
                    client,
                    project,
                    project_type,
                    goals,
                    audience,
                    timeline,
                    budget,
                    deliverables,
                    notes,
                    output_dir,
                },
        } => {
            let data = BriefingData {
                client_name: client,
                project_name: project,
                project_type,
                goals,
                target_audience: audience,
                timeline,
                budget,
                deliverables,
                additional_notes: notes,
            };
            let dir = output_dir.unwrap_or_else(|| default_briefing_dir(toolkit));
            print_json(&briefing::generate(toolkit, &data, Some(&dir))?)
        }
        Command::Structure { action } => structure(toolkit, action),
        Command::Assets { action } => assets(toolkit, action),
        Command::Jobs { action } => jobs(toolkit, action),
        Command::Social { action: SocialCommand::Batch(_) }
        | Command::Briefing { action: BriefingCommand::Batch(_) }
        | Command::Batch { .. } => anyhow::bail!("batch commands run on the async path"),
    }
}

fn structure(toolkit: &Toolkit, action: StructureCommand) -> Result<()> {
    match action {
        StructureCommand::List => print_json(&PRESETS),
        StructureCommand::Create { project_name, structure_type, base_path, no_readme } => {
            let mut request = StructureRequest::new(project_name, structure_type).under(base_path);
            request.create_readme = !no_readme;
            print_json(&folder_structure::generate(toolkit, &request)?)
        }
        StructureCommand::Custom { project_name, folders, base_path, readme } => {
            let generated =
                folder_structure::generate_custom(toolkit, &project_name, &folders, Some(&base_path), readme)?;
            print_json(&generated)
        }
    }
}

fn assets(toolkit: &Toolkit, action: AssetsCommand) -> Result<()> {
    let entity = toolkit.entity();
    match action {
        AssetsCommand::List { kind } => {
            let filter = AssetFilter { kind, ..AssetFilter::default() };
            let assets: Vec<_> = entity.list(filter).collect();
            print_json(&assets)
        }
        AssetsCommand::Show { id } => print_json(&entity.read(&id)?),
        AssetsCommand::Delete { id } => {
            entity.delete(&id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn jobs(toolkit: &Toolkit, action: JobsCommand) -> Result<()> {
    match action {
        JobsCommand::List { workflow, status } => {
            let filter = JobFilter { workflow_name: workflow, status };
            let jobs: Vec<_> = toolkit.jobs().list(filter).collect();
            print_json(&jobs)
        }
        JobsCommand::Show { id } => print_json(&toolkit.jobs().get(&id)?),
    }
}

async fn run_csv(toolkit: &Arc<Toolkit>, workflow: &str, args: CsvArgs, fallback_dir: PathBuf) -> Result<BatchReport> {
    let csv_path = args.csv.clone();
    let rows: Vec<Payload> = tokio::task::spawn_blocking(move || io::read_csv(&csv_path)).await??;
    let output_dir = args.output_dir.unwrap_or(fallback_dir);

    let report = batch::process_rows_parallel(
        Arc::clone(toolkit.engine()),
        workflow.to_string(),
        rows,
        batch::output_dir_entry(&output_dir),
        args.parallel,
    )
    .await?;
    Ok(report)
}

fn default_social_dir(toolkit: &Toolkit) -> PathBuf {
    social_posts::default_output_dir(&toolkit.config().storage.data_dir)
}

fn default_briefing_dir(toolkit: &Toolkit) -> PathBuf {
    output_dir_under(&toolkit.config().storage.data_dir, "briefings")
}

fn output_dir_under(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join("output").join(name)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_briefing_lists_and_job_status() {
        let cli = Cli::try_parse_from([
            "agency", "briefing", "single", "--client", "Acme", "--project", "Launch", "--type", "Web",
            "--goal", "Grow", "--goal", "Retain", "--audience", "SMBs", "--timeline", "Q3",
            "--budget", "$10,000", "--deliverable", "Site",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Briefing { action: BriefingCommand::Single { ref goals, .. } } if goals.len() == 2
        ));

        let cli = Cli::try_parse_from(["agency", "--data-dir", "/tmp/x", "jobs", "list", "--status", "failed"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(
            cli.command,
            Command::Jobs { action: JobsCommand::List { status: Some(JobStatus::Failed), .. } }
        ));
    }

    #[test]
    fn social_options_are_left_unset_when_omitted() {
        let cli = Cli::try_parse_from(["agency", "social", "single", "Hello", "--color", "#112233"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Social {
                action: SocialCommand::Single { style: None, color: Some(_), background: None, .. }
            }
        ));
    }
}
