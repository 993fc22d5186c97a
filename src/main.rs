use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dropwatch::config::{IngestConfig, SuccessPolicy};
use dropwatch::ingestion::{format_size, IngestHandler};
use dropwatch::telemetry;
use dropwatch::watch::WatchLoop;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dropwatch")]
#[command(about = "Watch a drop folder for CSV files, validate them against a YAML schema and convert them to Parquet")]
struct Args {
    /// YAML config file (every key optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch for dropped files
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory for Parquet artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Holding area for converted source files
    #[arg(long)]
    success_dir: Option<PathBuf>,

    /// Holding area for rejected source files
    #[arg(long)]
    failed_dir: Option<PathBuf>,

    /// YAML schema file
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// Field delimiter of the dropped files
    #[arg(short, long)]
    delimiter: Option<char>,

    /// What to do with a converted source file: move or delete
    #[arg(long)]
    on_success: Option<SuccessPolicy>,

    /// Quiet period in milliseconds before a new file is read
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Also process files already in the input directory at startup
    #[arg(long)]
    scan_existing: bool,

    /// Append a JSON line per processed file to this journal
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the input directory until interrupted (default)
    Watch,
    /// Run the given files through the pipeline once and exit
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Args {
    fn resolve_config(&self) -> Result<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::load(path)?,
            None => IngestConfig::default(),
        };

        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.success_dir {
            config.success_dir = dir.clone();
        }
        if let Some(dir) = &self.failed_dir {
            config.failed_dir = dir.clone();
        }
        if let Some(schema) = &self.schema {
            config.schema_file = schema.clone();
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(policy) = self.on_success {
            config.on_success = policy;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        if self.scan_existing {
            config.scan_existing = true;
        }
        if let Some(journal) = &self.journal {
            config.journal_file = Some(journal.clone());
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = args.resolve_config()?;

    telemetry::init_tracing(config.log_file.as_deref())?;

    let mut handler = IngestHandler::new(&config).context("Failed to start ingestion")?;

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            let watch_loop = WatchLoop::subscribe(&config, handler)?;
            println!(
                "Drop CSVs into {} (Ctrl-C to stop)",
                config.input_dir.display()
            );

            let summary = watch_loop
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await;

            println!(
                "Processed {} files: {} converted, {} skipped, {} failed ({} -> {})",
                summary.stats.files_seen(),
                summary.stats.files_succeeded,
                summary.stats.files_skipped,
                summary.stats.files_failed,
                format_size(summary.stats.source_bytes),
                format_size(summary.stats.artifact_bytes),
            );
        }
        Command::Ingest { files } => {
            let mut failed = 0usize;
            for file in &files {
                match handler.handle(file) {
                    Some(report) => {
                        if report.outcome.is_failure() || report.route_error.is_some() {
                            failed += 1;
                        }
                        println!("{}", serde_json::to_string(&report)?);
                    }
                    None => {
                        error!("{} is not a readable file", file.display());
                        failed += 1;
                    }
                }
            }

            info!("Ingested {} of {} files", files.len() - failed, files.len());
            if failed > 0 {
                bail!("{} of {} files failed", failed, files.len());
            }
        }
    }

    Ok(())
}
