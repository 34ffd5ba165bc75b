//! Orchestrator: extract → transform → load, strictly in sequence.
//!
//! Each stage receives the exact artifact the previous stage produced, so a
//! run never picks up another run's files. The first failing stage stops the
//! run; files already written by earlier stages are kept.

use std::{fmt, path::PathBuf};

use thiserror::Error;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    error::PipelineError,
    ingest,
    load::{self, LoadReport},
    transform, Config,
};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extract => "Extraction",
            Stage::Transform => "Transformation",
            Stage::Load => "Load",
        })
    }
}

/// The stage that stopped a run, and why.
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

/// Artifacts and warehouse counts from a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub raw_file: PathBuf,
    pub transformed_file: PathBuf,
    pub load: LoadReport,
}

/// Run the full pipeline once.
pub async fn run(config: &Config) -> Result<PipelineReport, StageFailure> {
    // ---
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline", %run_id);

    let result = run_stages(config, run_id).instrument(span.clone()).await;

    span.in_scope(|| match &result {
        Ok(_) => info!("Pipeline completed successfully"),
        Err(failure) => error!("Pipeline aborted: {}", failure),
    });
    result
}

async fn run_stages(config: &Config, run_id: Uuid) -> Result<PipelineReport, StageFailure> {
    // ---
    let raw_file = report(Stage::Extract, ingest::fetch(config).await)?;

    let transformed_file = report(Stage::Transform, transform::transform_file(config, &raw_file))?;

    let load = report(Stage::Load, load::load_file(config, &transformed_file).await)?;

    Ok(PipelineReport {
        run_id,
        raw_file,
        transformed_file,
        load,
    })
}

/// Log the one-line status of a stage and tag a failure with it.
fn report<T>(stage: Stage, result: Result<T, PipelineError>) -> Result<T, StageFailure> {
    // ---
    match result {
        Ok(value) => {
            info!("{} succeeded", stage);
            Ok(value)
        }
        Err(source) => {
            error!("{} failed ({:?}): {}", stage, source.kind(), source);
            Err(StageFailure { stage, source })
        }
    }
}
