//! mcp-isolation command-line entry point
//!
//! Routes tasks to capability profiles and runs each one in an isolated
//! agent CLI session. Results go to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use mcp_isolation::agent::{BatchReport, Orchestrator, TaskOutcome, TaskReport};
use mcp_isolation::config::{AppConfig, FailurePolicy};
use mcp_isolation::observability::init_default_logging;
use mcp_isolation::routing::{ProfileRegistry, TaskClassifier};
use mcp_isolation::session::CliRuntime;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn, Level};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["mcp-isolation.toml", "config/mcp-isolation.toml"];

/// Route tasks to isolated agent sessions
#[derive(Parser)]
#[command(name = "mcp-isolation")]
#[command(about = "Give each agent task only the tool-servers its capability profile needs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "MCP_ISOLATION_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which profile a task routes to
    Route {
        task: String,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run tasks, each in its own isolated session
    Run {
        #[arg(required = true)]
        tasks: Vec<String>,
        /// Record failures and keep going instead of stopping at the first one
        #[arg(long)]
        continue_on_error: bool,
        /// Sessions in flight at once (overrides batch.max_concurrency)
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
    /// List in-process tool servers and their tools
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    init_default_logging(default_level);

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Route { task, json } => route_task(&config, &task, json),
        Commands::Run {
            tasks,
            continue_on_error,
            concurrency,
            json,
        } => run_tasks(config, tasks, continue_on_error, concurrency, json).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Tools => list_tools(&config),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Command failed: {}", e);
            process::exit(1);
        }
    }
}

fn load_configuration(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        info!("Loading configuration from: {}", path.display());
        return Ok(AppConfig::load_from_file(path)?);
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(AppConfig::load_from_file(path)?);
        }
    }

    info!("No configuration file found, using built-in profiles");
    Ok(AppConfig::default())
}

fn route_task(config: &AppConfig, task: &str, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let registry = Arc::new(ProfileRegistry::from_config(config)?);
    let analysis = TaskClassifier::new(registry, config.routing.match_mode).analyze(task);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("profile:    {}", analysis.profile);
        println!("complexity: {}", analysis.complexity);
        println!("servers:    {}", display_list(&analysis.tools));
        if let Some(keyword) = &analysis.matched_keyword {
            println!("keyword:    {keyword}");
        }
    }
    Ok(true)
}

async fn run_tasks(
    mut config: AppConfig,
    tasks: Vec<String>,
    continue_on_error: bool,
    concurrency: Option<usize>,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    if continue_on_error {
        config.batch.failure_policy = FailurePolicy::Continue;
    }
    if let Some(concurrency) = concurrency {
        config.batch.max_concurrency = concurrency;
    }

    let runtime = Arc::new(CliRuntime::from_config(&config.runtime));
    let orchestrator = Arc::new(Orchestrator::from_config(&config, runtime)?);

    if let [task] = tasks.as_slice() {
        let handle = orchestrator.spawn(task.clone());
        let canceller = handle.canceller();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling session");
                canceller.abort();
            }
        });

        // One task prints the same batch shape as many
        let batch = BatchReport::from(handle.join().await?);
        print_batch(&batch, json)?;
        return Ok(true);
    }

    let batch = tokio::select! {
        _ = signal::ctrl_c() => {
            warn!("Interrupted, dropping in-flight sessions");
            return Ok(false);
        }
        batch = orchestrator.run_all(&tasks) => batch?,
    };

    print_batch(&batch, json)?;
    Ok(batch.all_succeeded())
}

fn print_report(report: &TaskReport) {
    println!("[{}] {}", report.analysis.profile, report.task);
    let text = report.result.assistant_text();
    if !text.is_empty() {
        println!("{text}");
    } else if let Some(result) = report.result.final_text() {
        println!("{result}");
    }
}

fn print_batch(batch: &BatchReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(batch)?);
        return Ok(());
    }

    for outcome in &batch.outcomes {
        match outcome {
            TaskOutcome::Completed(report) => print_report(report),
            TaskOutcome::Failed(failure) => println!(
                "[{}] {}\nFAILED ({:?}): {}",
                failure.profile, failure.task, failure.kind, failure.message
            ),
        }
        println!();
    }
    Ok(())
}

fn handle_config_command(config: &AppConfig, show: bool) -> Result<bool, Box<dyn std::error::Error>> {
    // Building the registry resolves every server and builtin tool reference
    ProfileRegistry::from_config(config)?;

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(true)
}

fn list_tools(config: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let registry = ProfileRegistry::from_config(config)?;

    for server in registry.tool_servers() {
        println!("{} ({})", server.name(), server.version());
        for (tool, qualified) in server
            .list_tools()
            .iter()
            .zip(server.qualified_tool_names())
        {
            println!("  {}: {}", tool.name, tool.description);
            println!("    allow-list name: {qualified}");
        }
    }
    Ok(true)
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
