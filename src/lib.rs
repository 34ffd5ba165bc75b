//! `eia-pipeline`: batch ETL of EIA hourly electricity demand into a
//! fact/dimension warehouse schema, plus a small query API over the result.
//!
//! Stages communicate through files on disk:
//! - [`ingest`] writes the raw API payload
//! - [`transform`] flattens it into a CSV
//! - [`load`] splits the CSV into `REGIONS_DIM` / `POWER_USAGE_FACT`
//!
//! [`pipeline`] chains the three; [`routes`] serves the warehouse over HTTP.
//! Every stage takes the same [`Config`] and returns
//! [`error::Result`].

pub mod artifacts;
pub mod config;
pub mod error;
pub mod ingest;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod transform;
pub mod warehouse;

pub use config::Config;
pub use error::{ErrorKind, PipelineError};

// Re-exported so routes/*.rs only depend on the crate root, not on models.rs
pub use models::{FlatRecord, PowerUsageFact, RegionDim, UsageReading};
