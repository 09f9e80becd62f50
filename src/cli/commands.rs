//! CLI command definitions for bugforge.
//!
//! `build` harvests one query (or a YAML set of queries) into a dataset file;
//! `inspect` summarizes a dataset that already exists.

use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bugzilla::{BugSource, BugzillaClient};
use crate::export::{load_dataset, DatasetSummary, DatasetWriter};
use crate::metrics;
use crate::pipeline::{PipelineConfig, PipelineDriver, PipelineReport, QuerySet, DEFAULT_OUTPUT_FILE};

/// Bug-tracker feature dataset builder.
#[derive(Parser)]
#[command(name = "bugforge")]
#[command(about = "Build labelled feature datasets from Bugzilla search queries")]
#[command(version)]
#[command(
    long_about = "bugforge runs Bugzilla search queries, fetches metadata and comments for every matching bug, scores nine features per bug and appends one labelled line per bug to a dataset file.\n\nExample usage:\n  bugforge build --query 'https://bugzilla.mozilla.org/rest/bug?product=Core&limit=50' --label 1 --output output.ds\n  bugforge build --queries queries.yaml\n  bugforge inspect output.ds"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run search queries and append one labelled line per bug.
    Build(BuildArgs),

    /// Summarize an existing dataset file.
    Inspect(InspectArgs),
}

/// Arguments for `bugforge build`.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Search URL to harvest (requires --label).
    #[arg(short = 'q', long, conflicts_with = "queries", requires = "label")]
    pub query: Option<String>,

    /// Label written on every line produced by --query.
    #[arg(short = 'L', long, allow_negative_numbers = true)]
    pub label: Option<i32>,

    /// YAML file listing named queries, labels and outputs.
    #[arg(long, required_unless_present = "query")]
    pub queries: Option<PathBuf>,

    /// Dataset file to append to. With --queries, replaces the set's default output.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Maximum number of fetches in flight.
    #[arg(short = 'c', long, env = "BUGFORGE_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Bugzilla REST root.
    #[arg(long, env = "BUGFORGE_BASE_URL")]
    pub base_url: Option<String>,

    /// Write Prometheus metrics in text format to this file when done.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Output JSON to stdout instead of progress lines.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `bugforge inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Dataset file to read.
    pub dataset: PathBuf,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build(args) => run_build_command(args).await,
        Commands::Inspect(args) => run_inspect_command(args),
    }
}

// ============================================================================
// Build
// ============================================================================

#[derive(Debug, Serialize)]
struct BuildOutput {
    status: String,
    lines_emitted: usize,
    reports: Vec<PipelineReport>,
}

fn resolve_config(args: &BuildArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(ref base_url) = args.base_url {
        config = config.with_base_url(base_url.clone());
    }
    config.validate()?;
    Ok(config)
}

fn resolve_query_set(args: &BuildArgs) -> anyhow::Result<QuerySet> {
    match (&args.query, &args.queries) {
        (Some(query), _) => {
            let label = args
                .label
                .ok_or_else(|| anyhow::anyhow!("--label is required with --query"))?;
            let output = args
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE));
            Ok(QuerySet::single(label, query.clone(), output))
        }
        (None, Some(path)) => {
            let mut set = QuerySet::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;
            if let Some(ref output) = args.output {
                set.output = output.clone();
            }
            Ok(set)
        }
        (None, None) => anyhow::bail!("Either --query or --queries is required"),
    }
}

/// Writers are shared between queries that append to the same file.
async fn writer_for(
    writers: &mut HashMap<PathBuf, Arc<DatasetWriter>>,
    path: &Path,
) -> anyhow::Result<Arc<DatasetWriter>> {
    if let Some(writer) = writers.get(path) {
        return Ok(Arc::clone(writer));
    }
    let writer = Arc::new(DatasetWriter::open_append(path).await?);
    writers.insert(path.to_path_buf(), Arc::clone(&writer));
    Ok(writer)
}

async fn run_build_command(args: BuildArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let query_set = resolve_query_set(&args)?;

    if args.metrics_out.is_some() {
        metrics::init_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics: {}", e))?;
    }

    let client: Arc<dyn BugSource> = Arc::new(BugzillaClient::new(config.client_config())?);
    let endpoints = config.endpoints();
    info!(
        base_url = %endpoints.base_url(),
        concurrency = config.concurrency,
        queries = query_set.queries.len(),
        "Starting build"
    );

    let mut writers = HashMap::new();
    let mut reports = Vec::with_capacity(query_set.queries.len());

    for spec in &query_set.queries {
        let output = query_set.output_for(spec);
        let writer = writer_for(&mut writers, output).await?;
        let driver = PipelineDriver::new(
            Arc::clone(&client),
            endpoints.clone(),
            config.queue_config(),
            writer,
        );

        if !args.json {
            println!("Query '{}' (label {}) -> {}", spec.name, spec.label, output.display());
        }

        let mut handle = driver.start(spec.query.clone(), spec.label);
        while let Some(line) = handle.next_line().await {
            if !args.json {
                println!("  + bug {}", line.bug_id);
            }
        }

        let report = handle
            .wait()
            .await
            .map_err(|e| anyhow::anyhow!("Query '{}' failed: {}", spec.name, e))?;

        if !report.incomplete.is_empty() {
            warn!(
                query = %spec.name,
                bugs = ?report.incomplete,
                "Bugs left out of the dataset"
            );
        }

        if !args.json {
            println!(
                "  {} of {} bugs written, {} jobs dropped, {} write failures ({:.1}s, {}ms/job)",
                report.lines_emitted,
                report.bugs_found,
                report.jobs_dropped,
                report.write_failures,
                report.duration_secs(),
                report.average_job_ms
            );
        }
        reports.push(report);
    }

    if let Some(ref path) = args.metrics_out {
        fs::write(path, metrics::export_metrics())?;
        info!(path = %path.display(), "Wrote metrics");
    }

    let lines_emitted = reports.iter().map(|r| r.lines_emitted).sum();
    if args.json {
        let output = BuildOutput {
            status: "completed".to_string(),
            lines_emitted,
            reports,
        };
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize build JSON: {}", e))?;
        println!("{}", json_output);
    } else {
        println!("Done: {} lines appended", lines_emitted);
    }

    Ok(())
}

// ============================================================================
// Inspect
// ============================================================================

fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let lines = load_dataset(&args.dataset)?;
    let summary = DatasetSummary::from_lines(&lines);

    if args.json {
        let json_output = serde_json::to_string_pretty(&summary)
            .map_err(|e| anyhow::anyhow!("Failed to serialize summary JSON: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("{}", args.dataset.display());
    println!("  lines:         {}", summary.total_lines);
    println!("  distinct bugs: {}", summary.distinct_bugs);
    for (label, count) in &summary.per_label {
        println!("  label {:>3}:     {}", label, count);
    }
    if !summary.duplicate_bugs.is_empty() {
        let ids: Vec<String> = summary.duplicate_bugs.iter().map(|id| id.to_string()).collect();
        println!("  duplicates:    {}", ids.join(", "));
    }
    Ok(())
}
