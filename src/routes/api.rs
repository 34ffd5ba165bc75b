//! Read-only query endpoints consumed by the dashboard frontend.
//!
//! Failures are reported as `200 OK` with an `{"error": "..."}` body; the
//! frontend relies on that shape instead of HTTP error codes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error};

use crate::{Config, UsageReading};

/// Maximum number of readings returned by `/api/data`.
pub const MAX_READINGS: i64 = 100;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/api/data", get(get_data))
        .route("/api/regions", get(get_regions))
}

/// Query parameters for `/api/data`.
#[derive(Debug, Deserialize)]
pub struct DataQuery {
    /// Sub-region code; empty means no filter.
    region: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(context: &str, err: impl std::fmt::Display) -> Response {
    // ---
    error!("{}: {}", context, err);
    (
        StatusCode::OK,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// `GET /api/data?region=<code>` – newest readings first, at most [`MAX_READINGS`].
async fn get_data(
    Query(params): Query<DataQuery>,
    State((pool, _config)): State<(PgPool, Config)>,
) -> Response {
    // ---
    let region = params.region.filter(|r| !r.trim().is_empty());
    debug!("GET /api/data region={:?}", region);

    match fetch_readings(&pool, region.as_deref()).await {
        Ok(readings) => {
            debug!("GET /api/data - returning {} readings", readings.len());
            (StatusCode::OK, Json(readings)).into_response()
        }
        Err(e) => error_response("Failed to query readings", e),
    }
}

/// `GET /api/regions` – distinct sub-region codes, sorted.
async fn get_regions(State((pool, _config)): State<(PgPool, Config)>) -> Response {
    // ---
    debug!("GET /api/regions");

    match fetch_regions(&pool).await {
        Ok(regions) => (StatusCode::OK, Json(regions)).into_response(),
        Err(e) => error_response("Failed to query regions", e),
    }
}

pub async fn fetch_readings(
    pool: &PgPool,
    region: Option<&str>,
) -> Result<Vec<UsageReading>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, UsageReading>(
        r#"
        SELECT "SUB_REGION_CODE" AS region,
               "TIMESTAMP"       AS datetime,
               "DEMAND_MWH"      AS usage_mw
        FROM "POWER_USAGE_FACT"
        WHERE $1::TEXT IS NULL OR "SUB_REGION_CODE" = $1
        ORDER BY "TIMESTAMP" DESC, "USAGE_ID" ASC
        LIMIT $2
        "#,
    )
    .bind(region)
    .bind(MAX_READINGS)
    .fetch_all(pool)
    .await
}

pub async fn fetch_regions(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    // ---
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT "SUB_REGION_CODE"
        FROM "REGIONS_DIM"
        ORDER BY "SUB_REGION_CODE"
        "#,
    )
    .fetch_all(pool)
    .await
}
