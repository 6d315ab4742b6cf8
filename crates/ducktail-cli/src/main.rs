mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ducktail_types::SchemaEvolution;

#[derive(Parser)]
#[command(
    name = "ducktail",
    version,
    about = "Move data between files and databases through an embedded DuckDB"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline
    Run {
        /// Path to config YAML file
        config: PathBuf,
        /// Pipeline name
        pipeline: String,
        /// Reprocess all rows, ignoring the stored watermark
        #[arg(long)]
        full_refresh: bool,
        /// Skip reading the stored watermark for this run
        #[arg(long)]
        ignore_watermark: bool,
        /// Override the target's schema evolution policy (ignore, fail, evolve)
        #[arg(long)]
        schema_evolution: Option<SchemaEvolution>,
        /// Number of sample rows to collect
        #[arg(long)]
        sample_rows: Option<u32>,
        /// Compute a column summary of the batch
        #[arg(long)]
        summary: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run every pipeline in a config concurrently
    RunAll {
        /// Path to config YAML file
        config: PathBuf,
    },
    /// Validate configuration and connectivity
    Check {
        /// Path to config YAML file
        config: PathBuf,
        /// Only check this pipeline
        pipeline: Option<String>,
    },
    /// List configured pipelines
    List {
        /// Path to config YAML file
        config: PathBuf,
    },
    /// Inspect or reset stored watermarks
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// Show stored watermarks
    Show {
        /// Path to config YAML file
        config: PathBuf,
        /// Only show this pipeline
        pipeline: Option<String>,
    },
    /// Forget a pipeline's watermark so the next run reads everything
    Reset {
        /// Path to config YAML file
        config: PathBuf,
        /// Pipeline name
        pipeline: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            pipeline,
            full_refresh,
            ignore_watermark,
            schema_evolution,
            sample_rows,
            summary,
            json,
        } => {
            let overrides = commands::run::Overrides {
                full_refresh,
                ignore_watermark,
                schema_evolution,
                sample_rows,
                summary,
            };
            commands::run::execute(&config, &pipeline, overrides, json).await
        }
        Commands::RunAll { config } => commands::run_all::execute(&config).await,
        Commands::Check { config, pipeline } => {
            commands::check::execute(&config, pipeline.as_deref()).await
        }
        Commands::List { config } => commands::list::execute(&config),
        Commands::State { command } => match command {
            StateCommands::Show { config, pipeline } => {
                commands::state::show(&config, pipeline.as_deref())
            }
            StateCommands::Reset { config, pipeline } => {
                commands::state::reset(&config, &pipeline)
            }
        },
    }
}
