//! Core data types: observations, cached tables, segments, cadence, and the
//! per-request report envelope.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single time-indexed numeric observation.
///
/// `value` is optional because normalization coerces unparsable values to
/// missing rather than dropping the row. `series_id` discriminates rows when
/// one cache table holds multiple series; it is `None` for single-series
/// tables and defaults to `None` when absent from a cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar date of the observation (no time-of-day).
    pub date: NaiveDate,
    /// Numeric value; `None` when the source value could not be coerced.
    pub value: Option<f64>,
    /// Optional series discriminator within a multi-series table.
    #[serde(default)]
    pub series_id: Option<String>,
}

impl Observation {
    /// Build a single-series observation.
    #[must_use]
    pub const fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            date,
            value,
            series_id: None,
        }
    }

    /// Dedupe key for merging: `(date, series_id)`.
    #[must_use]
    pub fn key(&self) -> (NaiveDate, Option<String>) {
        (self.date, self.series_id.clone())
    }
}

/// An ordered table of observations, sorted ascending by `(date, series_id)`.
///
/// This is the unit the cache store persists and the merge engine folds into.
/// Tables grow monotonically: rows are only superseded by same-key rows on
/// merge, never deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesTable {
    rows: Vec<Observation>,
}

impl SeriesTable {
    /// Build an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Build a table from rows, restoring the ascending sort order.
    #[must_use]
    pub fn from_rows(mut rows: Vec<Observation>) -> Self {
        rows.sort_by(|a, b| a.key().cmp(&b.key()));
        Self { rows }
    }

    /// Rows in ascending `(date, series_id)` order.
    #[must_use]
    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    /// Consume the table and return its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Observation> {
        self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose date falls inside `[start, end]`, as a new table.
    #[must_use]
    pub fn slice_window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|o| o.date >= start && o.date <= end)
            .cloned()
            .collect();
        // rows is already sorted; filtering preserves order
        Self { rows }
    }

    /// Distinct dates inside `[start, end]`, ascending.
    #[must_use]
    pub fn distinct_dates_within(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .rows
            .iter()
            .map(|o| o.date)
            .filter(|d| *d >= start && *d <= end)
            .collect();
        dates.dedup();
        dates
    }
}

/// An inclusive, contiguous date range identified as missing from the cache.
///
/// Invariant: `start <= end`. Segment lists produced by gap detection are
/// pairwise disjoint and sorted ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First date of the range (inclusive).
    pub start: NaiveDate,
    /// Last date of the range (inclusive).
    pub end: NaiveDate,
}

impl Segment {
    /// Build a segment. Callers must uphold `start <= end`.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Native cadence of a series, estimated from its observed day-deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Consecutive observations one day apart.
    Daily,
    /// Consecutive observations seven days apart.
    Weekly,
    /// Consecutive observations 28 to 31 days apart.
    Monthly,
    /// No dominant step, or too few points to tell.
    Irregular,
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Irregular => "irregular",
        };
        f.write_str(s)
    }
}

/// Estimated cadence of a series, recomputed per request from the cached
/// dates inside the requested window. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyInfo {
    /// Estimated cadence class.
    pub cadence: Cadence,
    /// Modal step in days, when at least one positive delta was observed.
    pub step_days: Option<i64>,
    /// Share of deltas matching the mode, less a small-sample penalty. In [0, 1].
    pub confidence: f64,
    /// Number of distinct dates the estimate was computed from.
    pub sample_size: usize,
}

/// One fetched sub-range and the number of rows it contributed after
/// normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedSegment {
    /// First date fetched (inclusive).
    pub start: NaiveDate,
    /// Last date fetched (inclusive).
    pub end: NaiveDate,
    /// Normalized row count returned by the collaborator for this segment.
    pub row_count: usize,
}

/// Informational summary of one `fetch_window` call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Resolved cache file path for the request.
    pub cache_path: PathBuf,
    /// True only if a non-empty cache existed and zero segments were fetched.
    pub cache_hit: bool,
    /// Segments fetched, in ascending order.
    pub fetched_segments: Vec<FetchedSegment>,
    /// Cadence estimate from the in-window cached dates, if any existed.
    pub inferred_frequency: Option<FrequencyInfo>,
}

/// A windowed request for one series/facet combination.
///
/// Facets are named parameters (e.g. region) that, combined with the series
/// key, identify a distinct cache file. They are held in a `BTreeMap` so the
/// derived path is deterministic regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    /// Identifier of the series (e.g. a metric key).
    pub series_key: String,
    /// Facet parameters discriminating the cache file.
    pub facets: BTreeMap<String, String>,
    /// First requested date (inclusive).
    pub start: NaiveDate,
    /// Last requested date (inclusive).
    pub end: NaiveDate,
    /// Whether internal gaps may be fetched for daily-cadence series.
    ///
    /// When false (or for non-daily cadences) only the edges of the cached
    /// range are extended; internal holes are assumed to be legitimate
    /// absence (holidays, non-trading periods).
    pub allow_internal_gap_fill_daily: bool,
}

impl WindowRequest {
    /// Build a request with no facets and daily internal gap-fill enabled.
    pub fn new(series_key: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            series_key: series_key.into(),
            facets: BTreeMap::new(),
            start,
            end,
            allow_internal_gap_fill_daily: true,
        }
    }

    /// Add a facet parameter.
    #[must_use]
    pub fn with_facet(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facets.insert(key.into(), value.into());
        self
    }

    /// Disable internal gap-fill; only extend coverage at the edges.
    #[must_use]
    pub fn edge_fill_only(mut self) -> Self {
        self.allow_internal_gap_fill_daily = false;
        self
    }
}
