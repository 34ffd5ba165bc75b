//! Command-line entry point for `eia-pipeline`.
//!
//! Subcommands:
//! - `run` (default) – extract, transform and load in one go
//! - `extract` / `transform` / `load` – rerun a single stage; `transform` and
//!   `load` pick the newest file on disk unless `--input` is given
//! - `serve` – start the query API
//!
//! # Environment Variables
//! See [`eia_pipeline::config::load_from_env`] for pipeline settings. Logging:
//! - `PIPELINE_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `PIPELINE_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – force ANSI colours on or off
use std::{env, io::IsTerminal, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use eia_pipeline::{config, ingest, load, pipeline, routes, schema, transform, warehouse};

#[derive(Parser, Debug)]
#[command(author, version, about = "EIA electricity demand ETL pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run extract, transform and load in sequence
    Run,
    /// Fetch one page from the EIA API into the raw data directory
    Extract,
    /// Transform a raw payload into a CSV
    Transform {
        /// Raw JSON file to transform (default: newest in RAW_DATA_DIR)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Replace the warehouse tables from a transformed CSV
    Load {
        /// CSV file to load (default: newest in TRANSFORMED_DATA_DIR)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Serve the query API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },
}

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_from_env()?;
    cfg.log_config();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let report = pipeline::run(&cfg).await?;
            tracing::info!(
                "Run {} loaded {} regions and {} facts from {}",
                report.run_id,
                report.load.regions.rows,
                report.load.facts.rows,
                report.transformed_file.display()
            );
        }
        Command::Extract => {
            ingest::fetch(&cfg).await?;
        }
        Command::Transform { input } => {
            match input {
                Some(path) => transform::transform_file(&cfg, &path)?,
                None => transform::transform_latest(&cfg)?,
            };
        }
        Command::Load { input } => {
            let report = match input {
                Some(path) => load::load_file(&cfg, &path).await?,
                None => load::load_latest(&cfg).await?,
            };
            tracing::info!("Load complete: {:?}", report);
        }
        Command::Serve { addr } => serve(cfg, addr).await?,
    }

    Ok(())
}

async fn serve(cfg: config::Config, addr: SocketAddr) -> Result<()> {
    // ---
    let pool = warehouse::connect_lazy(&cfg)?;

    // Best effort: the API reports warehouse problems per request
    if let Err(e) = schema::create_schema(&pool).await {
        tracing::warn!("Could not ensure warehouse schema: {}", e);
    }

    let app = routes::router(pool, cfg);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `PIPELINE_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else `PIPELINE_LOG_LEVEL`
///
/// Called once at start-up, after `.env` is loaded and before any logging.
fn init_tracing() {
    // ---
    let span_events = match env::var("PIPELINE_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("PIPELINE_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
