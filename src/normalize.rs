//! Normalization of raw fetched records into canonical observations.
//!
//! Providers return loosely-typed JSON rows whose date and value fields hide
//! under a handful of alternate names. Normalization resolves those aliases,
//! parses dates (dropping rows it cannot parse), coerces values to numeric
//! (turning unparsable values into missing, not errors), and sorts by date.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::SyncError;
use crate::types::Observation;

/// Recognized aliases for the date field, canonical name first.
const DATE_ALIASES: &[&str] = &["date", "period", "timestamp", "Date", "time"];

/// Recognized aliases for the value field, canonical name first.
const VALUE_ALIASES: &[&str] = &["value", "Value", "series", "data", "v"];

/// Optional series discriminator carried through when present.
const SERIES_ID_FIELD: &str = "series_id";

/// Normalize a batch of raw records into canonical observations.
///
/// The date and value field names are resolved once per batch: the first
/// alias present in any record wins. Per record, an unparsable or missing
/// date drops the row, while an unparsable value is kept as missing. The
/// output is sorted ascending by date.
///
/// # Errors
/// Returns `SyncError::Normalization` if the batch is non-empty but no
/// recognized date or value field exists in any record: a data-contract
/// violation, reported rather than silently dropped.
pub fn normalize_records(records: &[Value]) -> Result<Vec<Observation>, SyncError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let date_field = resolve_field(records, DATE_ALIASES);
    let value_field = resolve_field(records, VALUE_ALIASES);
    let (Some(date_field), Some(value_field)) = (date_field, value_field) else {
        return Err(SyncError::normalization(format!(
            "expected a date field ({DATE_ALIASES:?}) and a value field ({VALUE_ALIASES:?}); got fields: {:?}",
            seen_fields(records)
        )));
    };

    let mut rows: Vec<Observation> = Vec::with_capacity(records.len());
    for record in records {
        let Some(obj) = record.as_object() else {
            continue;
        };
        let Some(date) = obj.get(date_field).and_then(parse_date) else {
            continue;
        };
        let value = obj.get(value_field).and_then(coerce_numeric);
        let series_id = obj
            .get(SERIES_ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned);
        rows.push(Observation {
            date,
            value,
            series_id,
        });
    }
    rows.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(rows)
}

/// First alias present in any record of the batch.
fn resolve_field<'a>(records: &[Value], aliases: &[&'a str]) -> Option<&'a str> {
    aliases.iter().copied().find(|alias| {
        records
            .iter()
            .filter_map(Value::as_object)
            .any(|obj| obj.contains_key(*alias))
    })
}

/// Union of field names seen across the batch, for error reporting.
fn seen_fields(records: &[Value]) -> Vec<String> {
    let mut fields: Vec<String> = records
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|obj| obj.keys().cloned())
        .collect();
    fields.sort_unstable();
    fields.dedup();
    fields
}

/// Parse a date-like JSON value to a calendar date, stripping any
/// time-of-day component.
fn parse_date(v: &Value) -> Option<NaiveDate> {
    let s = v.as_str()?.trim();
    if let Ok(d) = s.parse::<NaiveDate>() {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    None
}

/// Coerce a JSON value to `f64`; unparsable values become missing.
fn coerce_numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
