//! Load stage: split a transformed CSV into the region dimension and the
//! demand fact table, then replace both warehouse tables.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};

use crate::{
    artifacts::{self, TRANSFORMED_SUFFIX},
    error::{PipelineError, Result},
    models::{PowerUsageFact, RegionDim, StagedRow},
    schema::{self, POWER_USAGE_FACT, REGIONS_DIM},
    warehouse, Config,
};

/// Rows per multi-row INSERT; keeps bind parameters well under the protocol limit.
const INSERT_CHUNK: usize = 1000;

// ---

/// Outcome of writing one warehouse table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoad {
    pub table: &'static str,
    /// True when every row of the batch was inserted.
    pub success: bool,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: PathBuf,
    pub regions: TableLoad,
    pub facts: TableLoad,
}

/// In-memory dimensional split of one transformed file.
#[derive(Debug, Clone, PartialEq)]
pub struct Tables {
    pub regions: Vec<RegionDim>,
    pub facts: Vec<PowerUsageFact>,
}

/// Load the newest `*_transformed.csv` in the transformed directory.
pub async fn load_latest(config: &Config) -> Result<LoadReport> {
    // ---
    let latest = artifacts::latest_file(&config.transformed_dir, TRANSFORMED_SUFFIX)?;
    load_file(config, &latest).await
}

/// Load `csv_path` into the warehouse, replacing both tables.
pub async fn load_file(config: &Config, csv_path: &Path) -> Result<LoadReport> {
    // ---
    info!("Loading file: {}", csv_path.display());

    let rows = read_staged(csv_path)?;
    let tables = split_tables(rows);

    let pool = warehouse::connect(config).await?;
    let outcome = write_tables(&pool, &tables).await;
    pool.close().await;

    let (regions, facts) = outcome?;
    info!("{} uploaded: {} ({} rows)", regions.table, regions.success, regions.rows);
    info!("{} uploaded: {} ({} rows)", facts.table, facts.success, facts.rows);

    Ok(LoadReport {
        source: csv_path.to_path_buf(),
        regions,
        facts,
    })
}

async fn write_tables(pool: &PgPool, tables: &Tables) -> Result<(TableLoad, TableLoad)> {
    schema::create_schema(pool).await?;
    replace_tables(pool, tables).await
}

/// Warehouse form of a CSV header: hyphens become underscores, all uppercase.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().replace('-', "_").to_uppercase()
}

/// Read a transformed CSV, normalizing its headers before decoding rows.
///
/// A row with a blank `SUB_REGION_CODE` is `Malformed`; it would otherwise
/// become a region keyed by the empty string.
pub fn read_staged(path: &Path) -> Result<Vec<StagedRow>> {
    // ---
    let mut reader = csv::Reader::from_path(path)?;
    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(normalize_column_name)
        .collect();
    reader.set_headers(headers);

    let rows = reader
        .deserialize::<StagedRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if let Some(index) = rows.iter().position(|r| r.sub_region_code.trim().is_empty()) {
        return Err(PipelineError::Malformed {
            index,
            reason: "blank SUB_REGION_CODE".into(),
        });
    }
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Split staged rows into the dimension and fact tables.
///
/// Regions are deduplicated by `SUB_REGION_CODE`; the first row seen for a
/// code defines its attributes. Facts keep file order and are numbered from 1.
pub fn split_tables(rows: Vec<StagedRow>) -> Tables {
    // ---
    let mut regions: Vec<RegionDim> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for row in &rows {
        let candidate = RegionDim::from(row);
        match seen.get(&row.sub_region_code) {
            Some(&idx) => {
                if regions[idx] != candidate {
                    warn!(
                        "Conflicting attributes for region {}; keeping first seen {:?}, ignoring {:?}",
                        row.sub_region_code, regions[idx], candidate
                    );
                }
            }
            None => {
                seen.insert(row.sub_region_code.clone(), regions.len());
                regions.push(candidate);
            }
        }
    }

    let facts = rows
        .into_iter()
        .zip(1_i64..)
        .map(|(row, usage_id)| PowerUsageFact {
            usage_id,
            timestamp: row.timestamp,
            demand_mwh: row.demand_mwh,
            value_units: row.value_units,
            sub_region_code: row.sub_region_code,
        })
        .collect();

    Tables { regions, facts }
}

/// Replace the contents of both tables in a single transaction.
///
/// Either both tables hold the new batch afterwards or neither changed.
pub async fn replace_tables(pool: &PgPool, tables: &Tables) -> Result<(TableLoad, TableLoad)> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(r#"TRUNCATE TABLE "REGIONS_DIM", "POWER_USAGE_FACT""#)
        .execute(&mut *tx)
        .await?;

    let mut region_rows = 0;
    for chunk in tables.regions.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"INSERT INTO "REGIONS_DIM" ("SUB_REGION_CODE", "SUBBA_NAME", "PARENT", "PARENT_NAME", "TIMEZONE") "#,
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(&r.sub_region_code)
                .push_bind(&r.subba_name)
                .push_bind(&r.parent)
                .push_bind(&r.parent_name)
                .push_bind(&r.timezone);
        });
        region_rows += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    let mut fact_rows = 0;
    for chunk in tables.facts.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"INSERT INTO "POWER_USAGE_FACT" ("USAGE_ID", "TIMESTAMP", "DEMAND_MWH", "VALUE_UNITS", "SUB_REGION_CODE") "#,
        );
        qb.push_values(chunk, |mut b, f| {
            b.push_bind(f.usage_id)
                .push_bind(f.timestamp)
                .push_bind(f.demand_mwh)
                .push_bind(&f.value_units)
                .push_bind(&f.sub_region_code);
        });
        fact_rows += qb.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;

    Ok((
        TableLoad {
            table: REGIONS_DIM,
            success: region_rows == tables.regions.len() as u64,
            rows: region_rows,
        },
        TableLoad {
            table: POWER_USAGE_FACT,
            success: fact_rows == tables.facts.len() as u64,
            rows: fact_rows,
        },
    ))
}
