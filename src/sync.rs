//! The sync orchestrator: the public entry point composing the cache store,
//! frequency inference, gap detection, fetch collaborator, and merge engine.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::SyncError;
use crate::normalize::normalize_records;
use crate::store::CacheStore;
use crate::timeseries::gaps::missing_segments;
use crate::timeseries::infer::{DEFAULT_MIN_SAMPLE_SIZE, infer_frequency};
use crate::timeseries::merge::merge_tables;
use crate::types::{FetchedSegment, Observation, SeriesTable, SyncReport, WindowRequest};

/// Focused role trait for collaborators that fetch raw observations for an
/// inclusive date range from a remote source.
///
/// The engine calls `fetch_segment` once per missing sub-range, strictly in
/// sequence. Implementations own all remote concerns (credentials, rate
/// limits, timeouts); a caller wanting timeouts wraps its fetcher.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    /// Fetch raw records covering exactly `[start, end]`.
    ///
    /// Records are loosely-typed JSON objects; the engine normalizes
    /// recognized date/value field aliases into canonical observations.
    ///
    /// # Errors
    /// Any error aborts the whole request without persisting partial results.
    async fn fetch_segment(&self, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<Value>, SyncError>;

    /// Normalize one fetched batch into canonical observations.
    ///
    /// The default resolves alternate date/value field names, drops rows with
    /// unparsable dates, and coerces unparsable values to missing. Sources
    /// with unusual payload shapes override this.
    ///
    /// # Errors
    /// Returns `SyncError::Normalization` when the batch has no recognizable
    /// date/value field pair.
    fn normalize(&self, records: &[Value]) -> Result<Vec<Observation>, SyncError> {
        normalize_records(records)
    }
}

/// Cache-backed synchronization engine for time-indexed numeric series.
///
/// Given a requested window, returns the observations for that window while
/// fetching from the remote source only the sub-ranges missing from the
/// on-disk cache, then merges, persists, and slices.
///
/// Each cache file is assumed to have at most one writer at a time; the
/// engine does not implement cross-process locking. Concurrent requests for
/// distinct series/facet keys are fully independent.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: CacheStore,
    min_sample: usize,
}

impl SyncEngine {
    /// Build an engine persisting under `cache_dir`.
    pub fn new(cache_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: CacheStore::new(cache_dir),
            min_sample: DEFAULT_MIN_SAMPLE_SIZE,
        }
    }

    /// Override the minimum distinct-date count below which frequency
    /// estimates carry a small-sample confidence penalty.
    #[must_use]
    pub const fn with_min_sample_size(mut self, min_sample: usize) -> Self {
        self.min_sample = min_sample;
        self
    }

    /// The underlying cache store.
    #[must_use]
    pub const fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Return the observations for exactly `[req.start, req.end]`, fetching
    /// only the missing sub-ranges, plus a report of what was done.
    ///
    /// Steps: load the cache, infer cadence from the in-window cached dates,
    /// detect gaps, fetch each gap sequentially via `fetcher`, merge with
    /// last-write-wins semantics, persist atomically, and slice the requested
    /// window. A second identical call against an unchanged source performs
    /// zero fetches and reports `cache_hit`.
    ///
    /// # Errors
    /// - `SyncError::InvalidRange` if `req.end < req.start` (before any I/O).
    /// - `SyncError::Fetch` if the collaborator fails for any segment; the
    ///   request aborts and nothing is persisted.
    /// - `SyncError::Normalization` if a fetched batch has no recognizable
    ///   date/value fields.
    /// - `SyncError::Persist` if the atomic write fails; the prior cache file
    ///   is left untouched.
    ///
    /// A corrupt cache file is not an error: it degrades to an empty cache
    /// and the window is re-fetched in full.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tscache::sync::fetch_window",
            skip(self, fetcher),
            fields(
                series_key = %req.series_key,
                start = %req.start,
                end = %req.end,
            ),
        )
    )]
    pub async fn fetch_window(
        &self,
        req: &WindowRequest,
        fetcher: &dyn SegmentFetcher,
    ) -> Result<(SeriesTable, SyncReport), SyncError> {
        if req.end < req.start {
            return Err(SyncError::InvalidRange {
                start: req.start,
                end: req.end,
            });
        }

        let cache_path = self.store.cache_path(&req.series_key, &req.facets);
        // True while a committed, readable cache file backs this request.
        let mut cache_committed = cache_path.exists();
        let cache_table = match self.store.load(&cache_path) {
            Ok(table) => table,
            Err(_e) => {
                // Availability over failure: a corrupt cache degrades to a
                // full-window fetch instead of failing the request.
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %cache_path.display(), error = %_e, "discarding unreadable cache");
                cache_committed = false;
                SeriesTable::new()
            }
        };

        let in_window_dates = cache_table.distinct_dates_within(req.start, req.end);
        let freq = if in_window_dates.is_empty() {
            None
        } else {
            Some(infer_frequency(&in_window_dates, self.min_sample))
        };

        let segments = missing_segments(
            &cache_table,
            req.start,
            req.end,
            freq.as_ref(),
            req.allow_internal_gap_fill_daily,
        );
        let cache_hit = !cache_table.is_empty() && segments.is_empty();

        let mut fetched_segments: Vec<FetchedSegment> = Vec::with_capacity(segments.len());
        let mut merged = cache_table;
        for seg in &segments {
            let raw = fetcher
                .fetch_segment(seg.start, seg.end)
                .await
                .map_err(|e| match e {
                    fetch @ SyncError::Fetch { .. } => fetch,
                    other => SyncError::fetch(seg.start, seg.end, other.to_string()),
                })?;
            let rows = fetcher.normalize(&raw)?;
            fetched_segments.push(FetchedSegment {
                start: seg.start,
                end: seg.end,
                row_count: rows.len(),
            });
            merged = merge_tables(merged, rows);
        }

        if !fetched_segments.is_empty() || !cache_committed {
            self.store.save(&cache_path, &merged)?;
        }

        let window = merged.slice_window(req.start, req.end);
        let report = SyncReport {
            cache_path,
            cache_hit,
            fetched_segments,
            inferred_frequency: freq,
        };
        Ok((window, report))
    }
}
