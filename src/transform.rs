//! Transformation stage: flatten a raw EIA payload into a typed CSV.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    artifacts::{self, RAW_SUFFIX},
    error::{PipelineError, Result},
    models::{FlatRecord, RawRecord},
    Config,
};

// ---

/// Transform the newest `*_eia_hourly_data.json` in the raw directory.
pub fn transform_latest(config: &Config) -> Result<PathBuf> {
    // ---
    let latest = artifacts::latest_file(&config.raw_dir, RAW_SUFFIX).inspect_err(|e| {
        error!("Transformation failed: {}", e);
    })?;
    transform_file(config, &latest)
}

/// Transform `raw_path` and write the result under the transformed directory.
///
/// Returns the path of the new CSV. Nothing is written on failure.
pub fn transform_file(config: &Config, raw_path: &Path) -> Result<PathBuf> {
    // ---
    let result = load_raw_json(raw_path)
        .and_then(|payload| flatten_payload(&payload))
        .and_then(|rows| save_transformed(config, &rows, raw_path));

    match &result {
        Ok(path) => info!("Transformed data saved to {}", path.display()),
        Err(e) => error!("Transformation failed for {}: {}", raw_path.display(), e),
    }
    result
}

pub fn load_raw_json(path: &Path) -> Result<Value> {
    // ---
    info!("Loading raw payload {}", path.display());
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Flatten `response.data` into rows, dropping records without a demand value.
///
/// Fails on a missing or empty record list, a malformed record (including
/// one without a sub-region code), or any unparseable period. Records that
/// would be dropped are still checked.
pub fn flatten_payload(payload: &Value) -> Result<Vec<FlatRecord>> {
    // ---
    let records = payload
        .pointer("/response/data")
        .and_then(Value::as_array)
        .filter(|records| !records.is_empty())
        .ok_or(PipelineError::NoRecords)?;

    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if !record.is_object() {
            return Err(PipelineError::Malformed {
                index,
                reason: format!("expected an object, got `{record}`"),
            });
        }
        let raw = RawRecord::deserialize(record).map_err(|e| PipelineError::Malformed {
            index,
            reason: e.to_string(),
        })?;
        if let Some(row) = raw.flatten(index)? {
            rows.push(row);
        }
    }

    let dropped = records.len() - rows.len();
    if dropped > 0 {
        info!("Dropped {} of {} records with no demand value", dropped, records.len());
    }
    if rows.is_empty() {
        warn!("Every record was dropped; output will contain only the header");
    }
    Ok(rows)
}

fn save_transformed(config: &Config, rows: &[FlatRecord], raw_path: &Path) -> Result<PathBuf> {
    // ---
    let name = artifacts::transformed_file_name(raw_path);
    artifacts::write_atomic(&config.transformed_dir, &name, |out| {
        let mut writer = csv::Writer::from_writer(out);
        if rows.is_empty() {
            writer.write_record(CSV_HEADERS)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Header row of the transformed CSV, in [`FlatRecord`] field order.
pub const CSV_HEADERS: [&str; 9] = [
    "timestamp",
    "demand_mwh",
    "region_code",
    "sub_region_code",
    "subba-name",
    "parent",
    "parent-name",
    "timezone",
    "value-units",
];

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn scenario_payload() -> Value {
        json!({"response": {"data": [
            {"period": "2024-01-01T00:00", "value": "120.5", "region": "US", "subba": "SUB1"}
        ]}})
    }

    #[test]
    fn test_scenario_single_row() {
        // ---
        let rows = flatten_payload(&scenario_payload()).unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(row.timestamp, expected);
        assert_eq!(row.demand_mwh, 120.5);
        assert_eq!(row.sub_region_code, "SUB1");
        assert_eq!(row.region_code.as_deref(), Some("US"));
    }

    #[test]
    fn test_null_demand_never_survives() {
        // ---
        let payload = json!({"response": {"data": [
            {"period": "2024-01-01T00", "value": 10, "subba": "A"},
            {"period": "2024-01-01T01", "value": null, "subba": "A"},
            {"period": "2024-01-01T02", "subba": "A"},
            {"period": "2024-01-01T03", "value": "", "subba": "A"},
            {"period": "2024-01-01T04", "value": "7.25", "subba": "B"}
        ]}});
        let input_len = 5;

        let rows = flatten_payload(&payload).unwrap();
        assert!(rows.len() <= input_len);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.demand_mwh.is_finite()));
    }

    #[test]
    fn test_empty_or_missing_records_fail() {
        // ---
        for payload in [
            json!({"response": {"data": []}}),
            json!({"response": {}}),
            json!({}),
            json!({"response": {"data": "nope"}}),
        ] {
            assert!(matches!(flatten_payload(&payload), Err(PipelineError::NoRecords)));
        }
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        // ---
        let payload = json!({"response": {"data": [
            {"period": "2024-01-01T00", "value": 1, "subba": "A"},
            {"period": "someday", "value": null, "subba": "A"}
        ]}});
        assert!(matches!(
            flatten_payload(&payload),
            Err(PipelineError::Timestamp(ref p)) if p == "someday"
        ));
    }

    #[test]
    fn test_malformed_record_reports_index() {
        // ---
        let payload = json!({"response": {"data": [
            {"period": "2024-01-01T00", "value": 1, "subba": "A"},
            {"value": 2, "subba": "A"}
        ]}});
        assert!(matches!(
            flatten_payload(&payload),
            Err(PipelineError::Malformed { index: 1, .. })
        ));

        let payload = json!({"response": {"data": [42]}});
        assert!(matches!(
            flatten_payload(&payload),
            Err(PipelineError::Malformed { index: 0, .. })
        ));
    }

    #[test]
    fn test_record_without_sub_region_is_rejected() {
        // ---
        let payload = json!({"response": {"data": [
            {"period": "2024-01-01T00", "value": 4, "subba": "A"},
            {"period": "2024-01-01T00", "value": 5, "region": "US"}
        ]}});
        assert!(matches!(
            flatten_payload(&payload),
            Err(PipelineError::Malformed { index: 1, .. })
        ));
    }

    #[test]
    fn test_transform_file_writes_hyphenated_csv() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            raw_dir: dir.path().join("raw"),
            transformed_dir: dir.path().join("out"),
            ..Config::default()
        };
        fs::create_dir_all(&config.raw_dir).unwrap();
        let raw_path = config.raw_dir.join("20240101_000000_000_eia_hourly_data.json");
        fs::write(
            &raw_path,
            json!({"response": {"data": [{
                "period": "2024-01-01T00", "value": "120.5", "subba": "SUB1",
                "subba-name": "Sub One", "parent": "P", "parent-name": "Parent",
                "value-units": "megawatthours"
            }]}})
            .to_string(),
        )
        .unwrap();

        let out = transform_latest(&config).unwrap();
        assert!(out.starts_with(&config.transformed_dir));
        assert!(out.to_string_lossy().ends_with("_20240101_000000_000_transformed.csv"));

        let text = fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADERS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "2024-01-01T00:00:00,120.5,,SUB1,Sub One,P,Parent,,megawatthours"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_transform_empty_payload_writes_nothing() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            raw_dir: dir.path().join("raw"),
            transformed_dir: dir.path().join("out"),
            ..Config::default()
        };
        fs::create_dir_all(&config.raw_dir).unwrap();
        let raw_path = config.raw_dir.join("20240101_000000_000_eia_hourly_data.json");
        fs::write(&raw_path, r#"{"response": {"data": []}}"#).unwrap();

        let err = transform_file(&config, &raw_path).unwrap_err();
        assert!(matches!(err, PipelineError::NoRecords));
        assert!(!config.transformed_dir.exists());
    }

    #[test]
    fn test_transform_latest_without_input() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            raw_dir: dir.path().to_path_buf(),
            transformed_dir: dir.path().join("out"),
            ..Config::default()
        };
        assert!(matches!(
            transform_latest(&config),
            Err(PipelineError::NoInput { .. })
        ));
    }
}
