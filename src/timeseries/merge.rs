use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{Observation, SeriesTable};

/// Merge newly fetched rows into an existing table.
///
/// Rows are keyed by `(date, series_id)`; the new rows overwrite cached rows
/// with the same key. Providers revise historical values, so the most
/// recently fetched value supersedes stale cached data. The output is sorted
/// ascending by `(date, series_id)` with no duplicate keys.
#[must_use]
pub fn merge_tables(old: SeriesTable, new: Vec<Observation>) -> SeriesTable {
    let mut map: BTreeMap<(NaiveDate, Option<String>), Observation> = BTreeMap::new();
    for row in old.into_rows() {
        map.insert(row.key(), row);
    }
    for row in new {
        map.insert(row.key(), row);
    }
    SeriesTable::from_rows(map.into_values().collect())
}
