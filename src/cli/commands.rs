//! CLI command definitions for dockhand.
//!
//! `run` executes a task file with bounded concurrency; `analyze` asks a
//! coding agent to produce a task file from a repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::analyzer::CodebaseAnalyzer;
use crate::config::{AppConfig, RuntimeKind};
use crate::execution::{ContainerRuntime, DockerApi, DockerCli};
use crate::metrics::OrchestratorMetrics;
use crate::orchestrator::{Orchestrator, OrchestratorStats};
use crate::runner::{AgentKind, AgentPlanner};
use crate::task::{Task, TaskResult, TaskStatus};
use crate::utils::origin_remote;

/// Run tasks in isolated containers with bounded concurrency.
#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Run tasks in isolated containers with bounded concurrency")]
#[command(version)]
#[command(
    long_about = "dockhand runs each task in its own disposable container, never keeping more than a fixed number of containers alive at once.\n\nExample usage:\n  dockhand run --tasks tasks.json --image alpine:3 --capacity 4 --output results.json\n  dockhand analyze --repo https://github.com/org/repo.git --output tasks.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file. `DOCKHAND_*` variables and flags override it.
    #[arg(short, long, global = true, env = "DOCKHAND_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run every task in a task file and collect the results.
    Run(RunArgs),

    /// Have a coding agent turn a repository into a task file.
    Analyze(AnalyzeArgs),
}

/// Arguments for `dockhand run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Task file: a JSON (or YAML) array of tasks.
    #[arg(short, long)]
    pub tasks: PathBuf,

    /// Container image for every task.
    #[arg(short, long)]
    pub image: Option<String>,

    /// Maximum number of live containers.
    #[arg(short = 'k', long)]
    pub capacity: Option<usize>,

    /// Per-task timeout in seconds.
    #[arg(long, conflicts_with = "no_timeout")]
    pub timeout: Option<u64>,

    /// Let tasks run without a time limit.
    #[arg(long)]
    pub no_timeout: bool,

    /// Container runtime client: cli or api.
    #[arg(long)]
    pub runtime: Option<RuntimeKind>,

    /// Solve each task with this coding agent instead of running its
    /// description as a shell script.
    #[arg(long)]
    pub agent: Option<AgentKind>,

    /// Repository the agent works on. Defaults to the origin remote of the
    /// current directory.
    #[arg(long, requires = "agent")]
    pub repo: Option<String>,

    /// Write results as JSON to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write Prometheus metrics to this file after the run.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Print the summary as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `dockhand analyze`.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Repository to analyze. Defaults to the origin remote of `--dir`.
    #[arg(long)]
    pub repo: Option<String>,

    /// Directory used for origin discovery.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Write the task list to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Coding agent to run.
    #[arg(long)]
    pub agent: Option<AgentKind>,

    /// Maximum number of tasks to keep.
    #[arg(long)]
    pub max_tasks: Option<usize>,

    /// Container image the agent runs in.
    #[arg(short, long)]
    pub image: Option<String>,

    /// Container runtime client: cli or api.
    #[arg(long)]
    pub runtime: Option<RuntimeKind>,
}

/// JSON document written by `dockhand run`.
#[derive(Debug, Serialize)]
struct RunOutput {
    interrupted: bool,
    stats: OrchestratorStats,
    results: Vec<TaskResult>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and
/// `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Run(args) => run_tasks_command(config, args).await,
        Commands::Analyze(args) => run_analyze_command(config, args).await,
    }
}

// ============================================================================
// Run Command Implementation
// ============================================================================

async fn run_tasks_command(mut config: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(image) = &args.image {
        config.image = image.clone();
    }
    if let Some(capacity) = args.capacity {
        config.max_containers = capacity;
    }
    if args.no_timeout {
        config.timeout_secs = None;
    } else if let Some(timeout) = args.timeout {
        config.timeout_secs = Some(timeout);
    }
    if let Some(runtime) = args.runtime {
        config.runtime = runtime;
    }
    if let Some(agent) = args.agent {
        config.agent = agent;
    }
    config.validate()?;

    let tasks = load_tasks(&args.tasks)?;
    if tasks.is_empty() {
        warn!(path = %args.tasks.display(), "Task file is empty");
    }
    info!(count = tasks.len(), path = %args.tasks.display(), "Loaded tasks");

    let runtime = build_runtime(&config).await?;
    let mut exec_config = config.execution_config();
    let metrics = match &args.metrics_file {
        Some(_) => Some(OrchestratorMetrics::new().context("Failed to register metrics")?),
        None => None,
    };

    let mut builder = if args.agent.is_some() {
        let repo = resolve_repo(args.repo.clone(), Path::new(".")).await?;
        match config.agent_api_key() {
            Some(key) => exec_config = exec_config.with_env(config.agent.api_key_env(), key),
            None => warn!(key = config.agent.api_key_env(), "No API key set for agent"),
        }
        info!(agent = %config.agent, repo = %repo, "Tasks will be solved by a coding agent");
        let planner = AgentPlanner::new(
            config.agent,
            repo,
            config.work_style_text(),
            config.coding_style_text(),
        );
        Orchestrator::builder(tasks, exec_config, runtime).planner(Arc::new(planner))
    } else {
        Orchestrator::builder(tasks, exec_config, runtime)
    };
    if let Some(metrics) = &metrics {
        builder = builder.metrics(metrics.clone());
    }

    let orchestrator = builder.build()?;
    orchestrator.start().await?;

    let interrupted = tokio::select! {
        res = orchestrator.wait_for_all_tasks() => {
            res?;
            false
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, stopping all tasks");
            orchestrator.stop_all().await;
            true
        }
    };

    let output = RunOutput {
        interrupted,
        stats: orchestrator.stats(),
        results: orchestrator.get_task_results(),
    };

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&output)
            .context("Failed to serialize results")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write output file {}", path.display()))?;
        info!(path = %path.display(), "Results written to file");
    }

    if let (Some(path), Some(metrics)) = (&args.metrics_file, &metrics) {
        fs::write(path, metrics.export())
            .with_context(|| format!("Failed to write metrics file {}", path.display()))?;
        info!(path = %path.display(), "Metrics written to file");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&output);
    }

    Ok(())
}

/// Reads a task list. `.yaml`/`.yml` files are parsed as YAML, anything
/// else as JSON.
fn load_tasks(path: &Path) -> anyhow::Result<Vec<Task>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let tasks = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid task file {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid task file {}", path.display()))?
    };
    Ok(tasks)
}

fn print_summary(output: &RunOutput) {
    let stats = &output.stats;

    println!();
    println!("============================================================");
    println!("                        RUN SUMMARY");
    println!("============================================================");
    for result in &output.results {
        let marker = match result.status {
            TaskStatus::Success => "✓",
            TaskStatus::Timeout => "⏱",
            _ => "✗",
        };
        println!(
            "  {} {:<24} {:<8} {:>8} ms",
            marker,
            result.task_id,
            result.status.as_str(),
            result.duration_ms
        );
        if let Some(detail) = &result.error_detail {
            if let Some(line) = detail.lines().rev().find(|l| !l.trim().is_empty()) {
                println!("      {}", line.trim());
            }
        }
    }
    println!("------------------------------------------------------------");
    println!(
        "  Tasks: {} | Succeeded: {} | Failed: {} | Timed out: {}",
        stats.total, stats.succeeded, stats.failed, stats.timed_out
    );
    println!(
        "  Success rate: {:.1}% | Peak containers: {} | Avg duration: {:.1}s",
        stats.success_rate(),
        stats.peak_live_environments,
        stats.average_task_duration.as_secs_f64()
    );
    if output.interrupted {
        println!("  Run was interrupted; unfinished tasks were cancelled.");
    }
    println!("============================================================");
}

// ============================================================================
// Analyze Command Implementation
// ============================================================================

async fn run_analyze_command(mut config: AppConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    if let Some(agent) = args.agent {
        config.agent = agent;
    }
    if let Some(max_tasks) = args.max_tasks {
        config.max_tasks = max_tasks;
    }
    if let Some(image) = &args.image {
        config.image = image.clone();
    }
    if let Some(runtime) = args.runtime {
        config.runtime = runtime;
    }
    config.validate()?;

    let repo = resolve_repo(args.repo.clone(), &args.dir).await?;
    let runtime = build_runtime(&config).await?;
    let analyzer = CodebaseAnalyzer::new(runtime, config);

    let cancel = analyzer.cancellation_token();
    let analysis = analyzer.analyze(&repo);
    tokio::pin!(analysis);
    let tasks = tokio::select! {
        res = &mut analysis => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, stopping analysis");
            cancel.cancel();
            // Let the analyzer tear its environment down before exiting.
            analysis.await?
        }
    };

    let json = serde_json::to_string_pretty(&tasks).context("Failed to serialize tasks")?;
    match &args.output {
        Some(path) => {
            fs::write(path, &json)
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
            info!(path = %path.display(), count = tasks.len(), "Task list written to file");
        }
        None => println!("{}", json),
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

async fn build_runtime(config: &AppConfig) -> anyhow::Result<Arc<dyn ContainerRuntime>> {
    match config.runtime {
        RuntimeKind::Cli => {
            let cli = DockerCli::with_binary(config.docker_binary.clone());
            if !cli.is_available().await {
                anyhow::bail!(
                    "Container runtime '{}' is not available. Is the daemon running?",
                    cli.binary()
                );
            }
            Ok(Arc::new(cli))
        }
        RuntimeKind::Api => {
            let api = DockerApi::new().context("Failed to connect to the Docker daemon")?;
            if !api.image_exists(&config.image).await {
                api.pull_image(&config.image).await?;
            }
            Ok(Arc::new(api))
        }
    }
}

/// Uses `explicit` when given, otherwise the origin remote of `dir`.
async fn resolve_repo(explicit: Option<String>, dir: &Path) -> anyhow::Result<String> {
    if let Some(repo) = explicit {
        return Ok(repo);
    }
    let remote = origin_remote(dir)
        .await
        .with_context(|| format!("Failed to run git in {}", dir.display()))?;
    if remote.fetch_url.is_empty() {
        anyhow::bail!(
            "No repository given and no origin remote found in {}; pass --repo",
            dir.display()
        );
    }
    info!(repo = %remote.fetch_url, "Using origin remote");
    Ok(remote.fetch_url)
}
