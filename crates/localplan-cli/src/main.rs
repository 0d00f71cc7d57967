//! localplan CLI tool.

use clap::{Parser, Subcommand};
use localplan_core::StageKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(name = "localplan")]
#[command(about = "Run Bicep deployment plans locally", long_about = None)]
struct Cli {
    /// Repository root holding templates and pipeline documents
    #[arg(long, env = "LOCALPLAN_ROOT", default_value = ".")]
    root: PathBuf,

    /// Pipeline document to read instead of discovering one
    #[arg(long, env = "LOCALPLAN_PIPELINE")]
    pipeline: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the environments a plan would run for
    Environments {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show the settings shared by every environment
    Settings {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Build, validate and preview deployments
    Plan {
        /// Environment to plan (repeatable; default all)
        #[arg(long = "env")]
        envs: Vec<String>,
        /// Comma-separated stages to run (default all)
        #[arg(long, value_delimiter = ',')]
        stages: Vec<StageKind>,
        /// Directory for run outputs, relative to the root
        #[arg(long, env = "LOCALPLAN_ARTIFACTS", default_value = "artifacts")]
        artifacts: PathBuf,
        /// Print commands instead of running them
        #[arg(long)]
        dry_run: bool,
        /// Do not remove the previous run's artifacts
        #[arg(long)]
        keep_artifacts: bool,
        /// Remove JSON files compiled next to templates
        #[arg(long)]
        clean_byproducts: bool,
        /// Azure CLI binary
        #[arg(long, env = "AZ_BIN", default_value = "az")]
        az_bin: String,
        /// PowerShell binary
        #[arg(long, env = "PWSH_BIN", default_value = "pwsh")]
        pwsh_bin: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let workspace = commands::Workspace::open(&cli.root, cli.pipeline)?;

    match cli.command {
        Commands::Environments { format } => {
            commands::environments::show(&workspace, format)?;
        }
        Commands::Settings { format } => {
            commands::settings::show(&workspace, format)?;
        }
        Commands::Plan {
            envs,
            stages,
            artifacts,
            dry_run,
            keep_artifacts,
            clean_byproducts,
            az_bin,
            pwsh_bin,
        } => {
            let args = commands::plan::PlanArgs {
                envs,
                stages,
                artifacts,
                dry_run,
                keep_artifacts,
                clean_byproducts,
                az_bin,
                pwsh_bin,
            };
            commands::plan::run(&workspace, args).await?;
        }
    }

    Ok(())
}
