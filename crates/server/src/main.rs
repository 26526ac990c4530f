use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billscan_ocr::{BackendKind, BatchOutcome, BillPipeline, FieldEngine, TextExtractor};

mod config;
mod handlers;
mod routes;
mod uploads;

use config::{AppConfig, DEFAULT_CONFIG_PATH};
use routes::{AppState, PipelineFactory};
use uploads::UploadStore;

#[derive(Parser)]
#[command(name = "billscan")]
#[command(about = "Extract bill fields from scanned images into spreadsheets")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./billscan.toml when present)
    #[arg(long, global = true, env = "BILLSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the upload front end
    Serve {
        /// Address to bind, overriding the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Process bill images into one spreadsheet
    Batch {
        /// Spreadsheet to write
        #[arg(short, long)]
        out: PathBuf,
        /// Discard existing rows instead of appending
        #[arg(long)]
        create_new: bool,
        /// Images, exported in the order given
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "billscan=debug,billscan_ocr=debug,billscan_storage=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path, true)?,
        None => AppConfig::load(&PathBuf::from(DEFAULT_CONFIG_PATH), false)?,
    };
    config.resolve_api_key(|name| std::env::var(name).ok());
    let pipeline = pipeline_factory(&config)?;

    match cli.command {
        Commands::Serve { bind } => {
            std::fs::create_dir_all(&config.excel_dir)?;
            let state = AppState {
                excel_dir: config.excel_dir.clone(),
                uploads: UploadStore::new(config.upload_dir.clone()),
                pipeline,
            };
            routes::serve(state, bind.as_deref().unwrap_or(&config.bind)).await
        }
        Commands::Batch { out, create_new, images } => {
            // The Vision client is blocking; keep it off the async workers.
            let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<BatchOutcome> {
                Ok(pipeline()?.process_files(&images, &out, create_new)?)
            })
            .await??;
            println!(
                "Exported {} row(s) to {}",
                outcome.rows_exported,
                outcome.destination.display()
            );
            Ok(())
        }
    }
}

/// Rules are compiled once up front; OCR clients are built per run.
fn pipeline_factory(config: &AppConfig) -> anyhow::Result<PipelineFactory> {
    anyhow::ensure!(
        config.ocr.backend != BackendKind::Vision || config.ocr.api_key.is_some(),
        "vision backend selected but no API key found (set {} or ocr.api_key)",
        config.api_key_env
    );
    let rules = config.compiled_rules()?;
    let layout = config.layout;
    let ocr = config.ocr.clone();
    let factory: PipelineFactory = Arc::new(move || -> anyhow::Result<BillPipeline> {
        let extractor = TextExtractor::from_config(&ocr)?;
        Ok(BillPipeline::new(extractor, FieldEngine::new(layout, rules.clone())))
    });
    Ok(factory)
}
