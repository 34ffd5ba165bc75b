//! Data models for the EIA demand pipeline.
//!
//! The raw side mirrors the upstream JSON field names; everything after the
//! transformation stage uses our own column names.

use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::{PipelineError, Result};

/// Timestamp layouts seen in EIA `period` values, most specific first.
const PERIOD_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// ---

/// One measurement record from `response.data` in the raw payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    // ---
    pub period: String,
    #[serde(default, deserialize_with = "deserialize_demand")]
    pub value: Option<f64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub subba: Option<String>,
    #[serde(default, rename = "subba-name")]
    pub subba_name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, rename = "parent-name")]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, rename = "value-units")]
    pub value_units: Option<String>,
}

/// A flattened, typed row as written to the transformed CSV.
///
/// Passthrough columns keep their upstream hyphenated headers; the load
/// stage normalizes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    // ---
    pub timestamp: NaiveDateTime,
    pub demand_mwh: f64,
    pub region_code: Option<String>,
    pub sub_region_code: String,
    #[serde(rename = "subba-name")]
    pub subba_name: Option<String>,
    pub parent: Option<String>,
    #[serde(rename = "parent-name")]
    pub parent_name: Option<String>,
    pub timezone: Option<String>,
    #[serde(rename = "value-units")]
    pub value_units: Option<String>,
}

/// A transformed CSV row after header normalization (`subba-name` → `SUBBA_NAME`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StagedRow {
    // ---
    pub timestamp: NaiveDateTime,
    pub demand_mwh: f64,
    pub sub_region_code: String,
    #[serde(default)]
    pub subba_name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub value_units: Option<String>,
}

/// Row of the `REGIONS_DIM` dimension table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDim {
    pub sub_region_code: String,
    pub subba_name: Option<String>,
    pub parent: Option<String>,
    pub parent_name: Option<String>,
    pub timezone: Option<String>,
}

/// Row of the `POWER_USAGE_FACT` fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerUsageFact {
    pub usage_id: i64,
    pub timestamp: NaiveDateTime,
    pub demand_mwh: f64,
    pub value_units: Option<String>,
    pub sub_region_code: String,
}

/// Reading served by `GET /api/data`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UsageReading {
    // ---
    pub region: String,
    #[serde(serialize_with = "serialize_minutes")]
    pub datetime: NaiveDateTime,
    pub usage_mw: f64,
}

// ---

impl RawRecord {
    // ---
    /// Parse the timestamp and rename columns.
    ///
    /// Returns `Ok(None)` for a record without a demand value. The timestamp
    /// and sub-region code are checked first, so a bad period or a missing
    /// `subba` fails even on a dropped row. `index` locates the record in
    /// error messages.
    pub fn flatten(self, index: usize) -> Result<Option<FlatRecord>> {
        // ---
        let timestamp = parse_period(&self.period)?;
        let sub_region_code = match self.subba.map(|s| s.trim().to_string()) {
            Some(code) if !code.is_empty() => code,
            _ => {
                return Err(PipelineError::Malformed {
                    index,
                    reason: "missing sub-region code (`subba`)".into(),
                })
            }
        };
        let Some(demand_mwh) = self.value else {
            return Ok(None);
        };

        Ok(Some(FlatRecord {
            timestamp,
            demand_mwh,
            region_code: self.region,
            sub_region_code,
            subba_name: self.subba_name,
            parent: self.parent,
            parent_name: self.parent_name,
            timezone: self.timezone,
            value_units: self.value_units,
        }))
    }
}

impl From<&StagedRow> for RegionDim {
    fn from(row: &StagedRow) -> Self {
        Self {
            sub_region_code: row.sub_region_code.clone(),
            subba_name: row.subba_name.clone(),
            parent: row.parent.clone(),
            parent_name: row.parent_name.clone(),
            timezone: row.timezone.clone(),
        }
    }
}

/// Parse an EIA `period` string.
///
/// Accepts full and minute-precision date-times, EIA hourly periods
/// (`2024-01-01T05`) and bare dates (midnight).
pub fn parse_period(period: &str) -> Result<NaiveDateTime> {
    // ---
    let s = period.trim();

    for fmt in PERIOD_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    // `%H` alone does not satisfy NaiveDateTime parsing; pad the minutes.
    if s.len() == 13 && s.as_bytes()[10] == b'T' {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&format!("{s}:00"), "%Y-%m-%dT%H:%M") {
            return Ok(ts);
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    Err(PipelineError::Timestamp(period.to_string()))
}

/// Demand arrives as a number, a numeric string, an empty string or null.
fn deserialize_demand<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Demand {
        Number(f64),
        Text(String),
    }

    match Option::<Demand>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Demand::Number(v)) => Ok(Some(v)),
        Some(Demand::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Demand::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(|v| Some(v).filter(|v| !v.is_nan()))
            .map_err(|_| de::Error::custom(format!("non-numeric demand value `{s}`"))),
    }
}

fn serialize_minutes<S>(ts: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(&ts.format("%Y-%m-%dT%H:%M"))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use serde_json::json;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_period_variants() {
        // ---
        assert_eq!(parse_period("2024-01-01T00:00").unwrap(), ts(2024, 1, 1, 0, 0));
        assert_eq!(parse_period("2024-01-01T05").unwrap(), ts(2024, 1, 1, 5, 0));
        assert_eq!(parse_period("2024-01-01").unwrap(), ts(2024, 1, 1, 0, 0));
        assert_eq!(parse_period("2024-01-01 13:30:00").unwrap(), ts(2024, 1, 1, 13, 30));
        assert_eq!(parse_period("2024-01-01T13:30:15").unwrap().second(), 15);
    }

    #[test]
    fn test_parse_period_rejects_garbage() {
        // ---
        for bad in ["", "yesterday", "2024-13-01", "2024-01-01T25"] {
            assert!(
                matches!(parse_period(bad), Err(PipelineError::Timestamp(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_demand_accepts_numbers_and_strings() {
        // ---
        let r: RawRecord = serde_json::from_value(json!({"period": "2024-01-01", "value": "120.5"})).unwrap();
        assert_eq!(r.value, Some(120.5));

        let r: RawRecord = serde_json::from_value(json!({"period": "2024-01-01", "value": 88})).unwrap();
        assert_eq!(r.value, Some(88.0));

        let r: RawRecord = serde_json::from_value(json!({"period": "2024-01-01", "value": null})).unwrap();
        assert_eq!(r.value, None);

        let r: RawRecord = serde_json::from_value(json!({"period": "2024-01-01", "value": " "})).unwrap();
        assert_eq!(r.value, None);

        let r: RawRecord = serde_json::from_value(json!({"period": "2024-01-01"})).unwrap();
        assert_eq!(r.value, None);

        let r: RawRecord = serde_json::from_value(json!({"period": "2024-01-01", "value": "NaN"})).unwrap();
        assert_eq!(r.value, None);
    }

    #[test]
    fn test_demand_rejects_text() {
        // ---
        let r = serde_json::from_value::<RawRecord>(json!({"period": "2024-01-01", "value": "n/a"}));
        assert!(r.is_err());
    }

    #[test]
    fn test_flatten_renames_columns() {
        // ---
        let raw: RawRecord = serde_json::from_value(json!({
            "period": "2024-01-01T00",
            "value": "120.5",
            "region": "US",
            "subba": "SUB1",
            "subba-name": "Sub One",
            "parent": "PJM",
            "parent-name": "PJM Interconnection",
            "value-units": "megawatthours"
        }))
        .unwrap();

        let flat = raw.flatten(0).unwrap().expect("row has demand");
        assert_eq!(flat.demand_mwh, 120.5);
        assert_eq!(flat.timestamp, ts(2024, 1, 1, 0, 0));
        assert_eq!(flat.region_code.as_deref(), Some("US"));
        assert_eq!(flat.sub_region_code, "SUB1");
        assert_eq!(flat.subba_name.as_deref(), Some("Sub One"));
        assert_eq!(flat.parent_name.as_deref(), Some("PJM Interconnection"));
        assert_eq!(flat.value_units.as_deref(), Some("megawatthours"));
        assert_eq!(flat.timezone, None);
    }

    #[test]
    fn test_flatten_drops_missing_demand_after_timestamp_check() {
        // ---
        let raw: RawRecord =
            serde_json::from_value(json!({"period": "2024-01-01", "value": null, "subba": "A"})).unwrap();
        assert_eq!(raw.flatten(0).unwrap(), None);

        let raw: RawRecord =
            serde_json::from_value(json!({"period": "not a date", "value": null, "subba": "A"})).unwrap();
        assert!(matches!(raw.flatten(0), Err(PipelineError::Timestamp(_))));
    }

    #[test]
    fn test_flatten_requires_sub_region_code() {
        // ---
        for record in [
            json!({"period": "2024-01-01T00", "value": 5, "region": "US"}),
            json!({"period": "2024-01-01T00", "value": 5, "subba": ""}),
            json!({"period": "2024-01-01T00", "value": 5, "subba": "  "}),
            json!({"period": "2024-01-01T00", "value": null, "subba": null}),
        ] {
            let raw: RawRecord = serde_json::from_value(record.clone()).unwrap();
            assert!(
                matches!(raw.flatten(3), Err(PipelineError::Malformed { index: 3, .. })),
                "{record} should be rejected"
            );
        }
    }

    #[test]
    fn test_usage_reading_json_shape() {
        // ---
        let reading = UsageReading {
            region: "SUB1".into(),
            datetime: ts(2024, 1, 1, 0, 0),
            usage_mw: 120.5,
        };
        assert_eq!(
            serde_json::to_value(&reading).unwrap(),
            json!({"region": "SUB1", "datetime": "2024-01-01T00:00", "usage_mw": 120.5})
        );
    }
}
