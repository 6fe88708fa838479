mod aggregator;
mod artifacts;
mod config;
mod model;
mod normalizer;
mod parser;
mod pipeline;
mod presenter;
mod scraper;
mod storage;
mod synthetic;
mod utils;

use clap::{Args, Parser, Subcommand};
use config::{load_config, AppConfig, StageConfig};
use model::PipelineError;
use presenter::{AnalysisType, Filter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agro-prices")]
#[command(about = "Commodity price pipeline: collect, normalize, aggregate, report")]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Per-invocation overrides for a stage's configuration.
#[derive(Args, Clone, Default)]
struct StageArgs {
    #[arg(long)]
    source: Option<PathBuf>,
    #[arg(long)]
    destination: Option<PathBuf>,
    /// SQLite database file used as relational sink
    #[arg(long)]
    sink: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl StageArgs {
    fn apply(&self, base: &StageConfig) -> StageConfig {
        let mut stage = base.clone();
        if let Some(source) = &self.source {
            stage.source_path = source.clone();
        }
        if let Some(destination) = &self.destination {
            stage.destination_path = destination.clone();
        }
        if let Some(sink) = &self.sink {
            stage.sink_connection = Some(sink.clone());
        }
        if let Some(timeout) = self.timeout {
            stage.timeout_secs = timeout;
        }
        stage
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the configured indicator pages into a raw CSV
    Collect(StageArgs),
    /// Append synthetic rows to a raw CSV
    Synthesize {
        #[command(flatten)]
        stage: StageArgs,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Clean raw rows and assign commodity ids
    Normalize {
        #[command(flatten)]
        stage: StageArgs,
        /// Keep ids from the previous commodity table and only append new names
        #[arg(long)]
        stable_ids: bool,
    },
    /// Build the monthly curated dataset
    Aggregate(StageArgs),
    /// Normalize then aggregate with the configured paths
    Run {
        #[arg(long)]
        sink: Option<String>,
        #[arg(long)]
        stable_ids: bool,
    },
    /// Print summary metrics for the curated dataset
    Report {
        /// Curated CSV; defaults to the aggregate destination
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long = "commodity")]
        commodities: Vec<String>,
        #[arg(long = "state")]
        states: Vec<String>,
        #[arg(long)]
        from_year: Option<i32>,
        #[arg(long)]
        to_year: Option<i32>,
        #[arg(long, value_enum, default_value_t = AnalysisType::Price)]
        analysis: AnalysisType,
        /// Write the filtered rows to this CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Config load error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, mut config: AppConfig) -> Result<(), PipelineError> {
    match command {
        Commands::Collect(args) => {
            let stage = args.apply(&config.collect);
            pipeline::run_collect(&config, &stage).await?;
        }
        Commands::Synthesize { stage, seed } => {
            let stage = stage.apply(&config.synthesize);
            if seed.is_some() {
                config.synthetic.seed = seed;
            }
            pipeline::run_synthesize(&config, &stage)?;
        }
        Commands::Normalize { stage, stable_ids } => {
            let stage = stage.apply(&config.normalize);
            pipeline::run_normalize(&stage, stable_ids || config.stable_ids)?;
        }
        Commands::Aggregate(args) => {
            let stage = args.apply(&config.aggregate);
            pipeline::run_aggregate(&stage)?;
        }
        Commands::Run { sink, stable_ids } => {
            let normalize = StageArgs {
                sink,
                ..StageArgs::default()
            }
            .apply(&config.normalize);
            let summary = pipeline::run_normalize(&normalize, stable_ids || config.stable_ids)?;
            info!("Normalized {} of {} rows", summary.written, summary.read);
            pipeline::run_aggregate(&config.aggregate)?;
        }
        Commands::Report {
            source,
            commodities,
            states,
            from_year,
            to_year,
            analysis,
            export,
        } => {
            let source = source.unwrap_or_else(|| config.aggregate.destination_path.clone());
            let years = match (from_year, to_year) {
                (None, None) => None,
                (from, to) => Some((from.unwrap_or(i32::MIN), to.unwrap_or(i32::MAX))),
            };
            let filter = Filter {
                commodities,
                states,
                years,
            };
            let text = pipeline::run_report(&source, &filter, analysis, export.as_deref())?;
            println!("{}", text);
        }
    }
    Ok(())
}
