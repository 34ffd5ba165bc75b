//! Error type shared by every pipeline stage.
//!
//! Each stage returns [`Result<T>`]; the orchestrator decides what to do with
//! a failure based on [`PipelineError::kind`].

use std::path::PathBuf;

use thiserror::Error;

// ---

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream API returned HTTP {status}")]
    UpstreamStatus { status: reqwest::StatusCode },

    #[error("No input file matching `*{suffix}` in {}", dir.display())]
    NoInput { dir: PathBuf, suffix: &'static str },

    #[error("No data found in payload")]
    NoRecords,

    #[error("Malformed record {index}: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("Unparseable timestamp `{0}`")]
    Timestamp(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Warehouse query failed: {0}")]
    Warehouse(#[from] sqlx::Error),
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// External call failed (HTTP or warehouse); a later run may succeed.
    Transient,
    /// The input data itself is unusable.
    DataQuality,
    /// File discovery found nothing to process.
    NoInput,
    Config,
    /// Local filesystem or encoding failure.
    Storage,
}

impl PipelineError {
    // ---
    pub fn kind(&self) -> ErrorKind {
        // ---
        match self {
            Self::Http(_) | Self::UpstreamStatus { .. } | Self::Warehouse(_) => ErrorKind::Transient,
            Self::NoRecords | Self::Malformed { .. } | Self::Timestamp(_) | Self::Csv(_) => {
                ErrorKind::DataQuality
            }
            Self::NoInput { .. } => ErrorKind::NoInput,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
