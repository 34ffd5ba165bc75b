//! Warehouse schema management for `eia-pipeline`.
//!
//! Ensures the dimension and fact tables exist. Called by the load stage
//! before it writes, and by the query server at start-up.
//!
//! Identifiers are quoted uppercase so the tables read `REGIONS_DIM` and
//! `POWER_USAGE_FACT` exactly, with uppercase column names.

use sqlx::PgPool;

use crate::error::Result;

pub const REGIONS_DIM: &str = "REGIONS_DIM";
pub const POWER_USAGE_FACT: &str = "POWER_USAGE_FACT";

// ---

/// Create the warehouse tables if they are missing (idempotent).
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Region metadata, one row per sub-region
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS "REGIONS_DIM" (
            "SUB_REGION_CODE" TEXT PRIMARY KEY,
            "SUBBA_NAME"      TEXT,
            "PARENT"          TEXT,
            "PARENT_NAME"     TEXT,
            "TIMEZONE"        TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Demand observations; USAGE_ID is only unique within one load
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS "POWER_USAGE_FACT" (
            "USAGE_ID"        BIGINT           PRIMARY KEY,
            "TIMESTAMP"       TIMESTAMP        NOT NULL,
            "DEMAND_MWH"      DOUBLE PRECISION NOT NULL,
            "VALUE_UNITS"     TEXT,
            "SUB_REGION_CODE" TEXT             NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Serves `/api/data` (newest first, optionally per region)
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_power_usage_fact_region_ts
            ON "POWER_USAGE_FACT" ("SUB_REGION_CODE", "TIMESTAMP" DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_power_usage_fact_ts
            ON "POWER_USAGE_FACT" ("TIMESTAMP" DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
