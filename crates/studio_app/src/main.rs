mod config;
mod progress;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use studio_core::{JobRegistry, JobRow, Tier};
use studio_engine::{
    export_batches, sync_source, ExportOptions, GenerationScheduler, HttpAssetResolver,
    HttpGenerationService, ReqwestFetcher,
};
use studio_logging::{studio_info, studio_warn, LogDestination};
use tokio_util::sync::CancellationToken;

use config::{StudioConfig, DEFAULT_CONFIG_FILENAME};
use progress::{render_view, LogProgressSink, LoggingAccessGate};

#[derive(Parser)]
#[command(
    name = "redesign-studio",
    about = "Batch image redesign driven by a job sheet"
)]
struct Cli {
    /// Config file (RON); missing means defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Load a job sheet and list the batches it yields, without generating
    Sync {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Load a job sheet, generate every batch, then export the results
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// Generation tier: standard or enhanced (pro)
        #[arg(long)]
        tier: Option<Tier>,
        /// Outputs to generate per batch
        #[arg(long)]
        outputs: Option<usize>,
        /// Generation endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
        /// Export directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Google Sheets link, CSV URL or local file
    #[arg(long)]
    source: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Commands::Init { force } => {
            let path = config::write_default_config(&cli.config, force)?;
            println!("Wrote default config to {}", path.display());
        }
        Commands::Sync { source } => {
            let config = config::load_config(&cli.config)?;
            let rows = load_rows(&config, &source.source).await?;
            let mut registry = JobRegistry::new();
            registry.ingest(rows);
            print!("{}", render_view(&registry.view()));
        }
        Commands::Run {
            source,
            tier,
            outputs,
            endpoint,
            out,
        } => {
            let mut config = config::load_config(&cli.config)?;
            if let Some(tier) = tier {
                config.scheduler.tier = tier;
            }
            if let Some(outputs) = outputs {
                config.scheduler.outputs_per_batch = outputs;
            }
            if let Some(endpoint) = endpoint {
                config.generation.endpoint = endpoint;
            }
            if let Some(out) = out {
                config.export_dir = out;
            }
            run(config, &source.source).await?;
        }
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    studio_logging::initialize(destination, level);
}

async fn load_rows(config: &StudioConfig, source: &str) -> anyhow::Result<Vec<JobRow>> {
    let fetcher = ReqwestFetcher::new(config.fetch.to_settings());
    let resolver = HttpAssetResolver::new(fetcher.clone());
    sync_source(source, &config.columns, &fetcher, &resolver)
        .await
        .with_context(|| format!("failed to sync job sheet from {source}"))
}

async fn run(config: StudioConfig, source: &str) -> anyhow::Result<()> {
    config.scheduler.validate()?;
    let rows = load_rows(&config, source).await?;
    if rows.is_empty() {
        studio_warn!("Job sheet has no batches; nothing to generate");
        return Ok(());
    }

    let mut registry = JobRegistry::new();
    registry.ingest(rows);
    let registry = Arc::new(Mutex::new(registry));
    let service = HttpGenerationService::new(config.generation.clone())
        .context("failed to build generation client")?;
    let gate = Arc::new(LoggingAccessGate::default());
    let scheduler = GenerationScheduler::new(registry.clone(), Arc::new(service), gate.clone())
        .with_progress_sink(Arc::new(LogProgressSink));

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                studio_warn!("Interrupt received; stopping after the calls in flight");
                cancel.cancel();
            }
        })
    };
    let summary = scheduler.run_all(&config.scheduler, &cancel).await;
    interrupt.abort();
    let summary = summary?;
    studio_info!(
        "{} completed, {} stopped, {} failed, {} skipped",
        summary.completed,
        summary.stopped,
        summary.failed,
        summary.skipped
    );
    if gate.requests() > 0 {
        studio_warn!(
            "{} calls were refused for lack of elevated access",
            gate.requests()
        );
    }

    let registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
    print!("{}", render_view(&registry.view()));
    let export = export_batches(
        registry.batches(),
        &config.export_dir,
        ExportOptions {
            exported_utc: Utc::now().to_rfc3339(),
            ..ExportOptions::default()
        },
    )
    .with_context(|| format!("failed to export to {}", config.export_dir.display()))?;
    println!(
        "Exported {} batches ({} files) to {}",
        export.batch_count,
        export.file_count,
        export.output_dir.display()
    );
    if summary.interrupted {
        println!("Run was interrupted; remaining batches were left untouched.");
    }
    Ok(())
}
