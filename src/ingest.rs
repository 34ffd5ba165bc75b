//! Extraction stage: pull one page of demand data from the EIA API and keep
//! the payload verbatim on disk.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{debug, error, info};

use crate::{
    artifacts::{self, RAW_LABEL},
    error::{PipelineError, Result},
    Config,
};

// ---

/// Fetch the configured page and write it to `<raw_dir>/<ts>_eia_hourly_data.json`.
///
/// Any transport error, decode error or non-success status fails the stage
/// and leaves no file behind. Only one page is requested; `offset`/`length`
/// come from the configuration as-is.
pub async fn fetch(config: &Config) -> Result<PathBuf> {
    // ---
    let result = fetch_inner(config).await;
    match &result {
        Ok(path) => info!("Data saved to {}", path.display()),
        Err(e) => error!("Failed to fetch EIA data: {}", e),
    }
    result
}

async fn fetch_inner(config: &Config) -> Result<PathBuf> {
    // ---
    let api_key = config
        .eia_api_key
        .as_deref()
        .ok_or_else(|| PipelineError::Config("EIA_API_KEY must be set in .env or environment".into()))?;

    info!("Fetching EIA data from {}", config.eia_api_url);

    let offset = config.eia_page_offset.to_string();
    let length = config.eia_page_length.to_string();
    let params = [
        ("api_key", api_key),
        ("frequency", config.eia_frequency.as_str()),
        ("data[0]", "value"),
        ("sort[0][column]", "period"),
        ("sort[0][direction]", "desc"),
        ("offset", offset.as_str()),
        ("length", length.as_str()),
    ];

    let client = Client::new();
    let response = client.get(&config.eia_api_url).query(&params).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::UpstreamStatus { status });
    }

    let payload: serde_json::Value = response.json().await?;
    debug!(
        "Payload received with {} records",
        payload
            .pointer("/response/data")
            .and_then(|d| d.as_array())
            .map_or(0, |d| d.len())
    );

    let name = artifacts::raw_file_name(RAW_LABEL);
    artifacts::write_atomic(&config.raw_dir, &name, |out| {
        serde_json::to_writer_pretty(&mut *out, &payload)?;
        Ok(())
    })
}
