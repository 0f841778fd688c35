use std::collections::BTreeMap;
use std::fs;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tempfile::tempdir;
use tscache::{SegmentFetcher, SyncEngine, SyncError, WindowRequest};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Returns one row per day of the requested segment, recording every call.
struct DailyFetcher {
    value: f64,
    calls: AtomicUsize,
    segments: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl DailyFetcher {
    fn new(value: f64) -> Self {
        Self {
            value,
            calls: AtomicUsize::new(0),
            segments: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn segments(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.segments.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentFetcher for DailyFetcher {
    async fn fetch_segment(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.segments.lock().unwrap().push((start, end));
        Ok(start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| json!({ "date": day.to_string(), "value": self.value }))
            .collect())
    }
}

/// Returns rows only on dates divisible by seven days from an epoch, like a
/// weekly storage report.
struct WeeklyFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl SegmentFetcher for WeeklyFetcher {
    async fn fetch_segment(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| (*day - d(2024, 1, 7)).num_days() % 7 == 0)
            .map(|day| json!({ "date": day.to_string(), "value": 3000.0 }))
            .collect())
    }
}

struct FailingFetcher;

#[async_trait]
impl SegmentFetcher for FailingFetcher {
    async fn fetch_segment(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Value>, SyncError> {
        Err(SyncError::normalization("provider unavailable"))
    }
}

/// Replays a fixed payload regardless of the requested segment.
struct ScriptedFetcher {
    rows: Vec<Value>,
}

#[async_trait]
impl SegmentFetcher for ScriptedFetcher {
    async fn fetch_segment(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Value>, SyncError> {
        Ok(self.rows.clone())
    }
}

#[tokio::test]
async fn empty_cache_fetches_the_full_window() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(42.0);
    let req = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 10));

    let (window, report) = engine.fetch_window(&req, &fetcher).await.unwrap();

    assert_eq!(window.len(), 10);
    assert!(!report.cache_hit);
    assert_eq!(report.fetched_segments.len(), 1);
    assert_eq!(report.fetched_segments[0].start, d(2024, 1, 1));
    assert_eq!(report.fetched_segments[0].end, d(2024, 1, 10));
    assert_eq!(report.fetched_segments[0].row_count, 10);
    assert!(report.inferred_frequency.is_none());
    assert!(report.cache_path.exists());
}

#[tokio::test]
async fn second_identical_call_is_a_cache_hit() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(42.0);
    let req = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 10));

    engine.fetch_window(&req, &fetcher).await.unwrap();
    let (window, report) = engine.fetch_window(&req, &fetcher).await.unwrap();

    assert_eq!(fetcher.calls(), 1, "second call must not fetch");
    assert!(report.cache_hit);
    assert!(report.fetched_segments.is_empty());
    assert_eq!(window.len(), 10);
    let freq = report.inferred_frequency.unwrap();
    assert_eq!(freq.cadence, tscache::Cadence::Daily);
}

#[tokio::test]
async fn any_subrange_of_a_covered_window_needs_no_fetch() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(1.0);

    let full = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 31));
    engine.fetch_window(&full, &fetcher).await.unwrap();

    let sub = WindowRequest::new("hh_spot", d(2024, 1, 10), d(2024, 1, 20));
    let (window, report) = engine.fetch_window(&sub, &fetcher).await.unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert!(report.cache_hit);
    assert_eq!(window.len(), 11);
    assert_eq!(window.rows().first().unwrap().date, d(2024, 1, 10));
    assert_eq!(window.rows().last().unwrap().date, d(2024, 1, 20));
}

#[tokio::test]
async fn widening_a_daily_window_fetches_only_the_two_edges() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(7.0);

    let seed = WindowRequest::new("hh_spot", d(2024, 1, 3), d(2024, 1, 8));
    engine.fetch_window(&seed, &fetcher).await.unwrap();

    let wide = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 10));
    let (window, report) = engine.fetch_window(&wide, &fetcher).await.unwrap();

    assert_eq!(window.len(), 10);
    assert!(!report.cache_hit);
    let fetched: Vec<(NaiveDate, NaiveDate)> = report
        .fetched_segments
        .iter()
        .map(|s| (s.start, s.end))
        .collect();
    assert_eq!(
        fetched,
        vec![
            (d(2024, 1, 1), d(2024, 1, 2)),
            (d(2024, 1, 9), d(2024, 1, 10)),
        ]
    );
    // Seed plus the two edge segments.
    assert_eq!(fetcher.segments().len(), 3);
}

#[tokio::test]
async fn weekly_series_extends_at_the_edges_only() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = WeeklyFetcher {
        calls: AtomicUsize::new(0),
    };

    let seed = WindowRequest::new("ng_storage", d(2024, 1, 7), d(2024, 1, 28));
    let (window, _) = engine.fetch_window(&seed, &fetcher).await.unwrap();
    assert_eq!(window.len(), 4);

    let wide = WindowRequest::new("ng_storage", d(2024, 1, 1), d(2024, 2, 4));
    let (window, report) = engine.fetch_window(&wide, &fetcher).await.unwrap();

    let freq = report.inferred_frequency.unwrap();
    assert_eq!(freq.cadence, tscache::Cadence::Weekly);
    let fetched: Vec<(NaiveDate, NaiveDate)> = report
        .fetched_segments
        .iter()
        .map(|s| (s.start, s.end))
        .collect();
    assert_eq!(
        fetched,
        vec![(d(2024, 1, 1), d(2024, 1, 6)), (d(2024, 1, 29), d(2024, 2, 4))]
    );
    // Feb 4 is a report day; Jan 1..6 holds none.
    assert_eq!(window.len(), 5);
}

#[tokio::test]
async fn fetch_failure_aborts_without_creating_a_cache() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let req = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 10));

    let err = engine.fetch_window(&req, &FailingFetcher).await.unwrap_err();
    match err {
        SyncError::Fetch { start, end, .. } => {
            assert_eq!(start, d(2024, 1, 1));
            assert_eq!(end, d(2024, 1, 10));
        }
        other => panic!("expected Fetch, got {other:?}"),
    }
    assert!(!engine.store().cache_path("hh_spot", &BTreeMap::new()).exists());
}

#[tokio::test]
async fn fetch_failure_leaves_the_existing_cache_untouched() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(5.0);

    let seed = WindowRequest::new("hh_spot", d(2024, 1, 3), d(2024, 1, 8));
    engine.fetch_window(&seed, &fetcher).await.unwrap();
    let path = engine.store().cache_path("hh_spot", &BTreeMap::new());
    let before = fs::read(&path).unwrap();

    let wide = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 10));
    let err = engine.fetch_window(&wide, &FailingFetcher).await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch { .. }));

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn inverted_range_is_rejected_before_any_io() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(1.0);
    let req = WindowRequest::new("hh_spot", d(2024, 1, 10), d(2024, 1, 1));

    let err = engine.fetch_window(&req, &fetcher).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidRange { .. }));
    assert_eq!(fetcher.calls(), 0);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn alternate_field_names_are_normalized() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = ScriptedFetcher {
        rows: vec![
            json!({ "period": "2024-01-02", "Value": "3.5" }),
            json!({ "period": "2024-01-01", "Value": 2.25 }),
            json!({ "period": "not a date", "Value": 9.0 }),
            json!({ "period": "2024-01-03", "Value": "n/a" }),
        ],
    };
    let req = WindowRequest::new("lng_exports", d(2024, 1, 1), d(2024, 1, 3));

    let (window, report) = engine.fetch_window(&req, &fetcher).await.unwrap();

    // The unparsable date is dropped; the unparsable value survives as missing.
    assert_eq!(report.fetched_segments[0].row_count, 3);
    let rows = window.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].date, d(2024, 1, 1));
    assert_eq!(rows[0].value, Some(2.25));
    assert_eq!(rows[1].value, Some(3.5));
    assert_eq!(rows[2].value, None);
}

#[tokio::test]
async fn unrecognizable_payload_is_a_contract_violation() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = ScriptedFetcher {
        rows: vec![json!({ "foo": 1, "bar": 2 })],
    };
    let req = WindowRequest::new("lng_exports", d(2024, 1, 1), d(2024, 1, 3));

    let err = engine.fetch_window(&req, &fetcher).await.unwrap_err();
    assert!(matches!(err, SyncError::Normalization(_)), "got {err:?}");
}

#[tokio::test]
async fn corrupt_cache_degrades_to_a_full_window_fetch() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(4.0);
    let req = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 5));

    let path = engine.store().cache_path("hh_spot", &BTreeMap::new());
    fs::create_dir_all(dir.path()).unwrap();
    fs::write(&path, "date,value\nnot-a-date,1.0\n").unwrap();

    let (window, report) = engine.fetch_window(&req, &fetcher).await.unwrap();

    assert!(!report.cache_hit);
    assert_eq!(report.fetched_segments.len(), 1);
    assert_eq!(window.len(), 5);
    // The corrupt file has been replaced with a readable one.
    assert_eq!(engine.store().load(&path).unwrap().len(), 5);
}

#[tokio::test]
async fn provider_revisions_overwrite_cached_values() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());

    let seed = WindowRequest::new("hh_spot", d(2024, 1, 3), d(2024, 1, 6));
    engine
        .fetch_window(&seed, &DailyFetcher::new(1.0))
        .await
        .unwrap();

    // The provider answers the [7, 8] edge fetch with a revised superset.
    let revised = ScriptedFetcher {
        rows: (5..=8)
            .map(|day| json!({ "date": d(2024, 1, day).to_string(), "value": 2.0 }))
            .collect(),
    };
    let wide = WindowRequest::new("hh_spot", d(2024, 1, 3), d(2024, 1, 8));
    let (window, _) = engine.fetch_window(&wide, &revised).await.unwrap();

    let values: Vec<Option<f64>> = window.rows().iter().map(|o| o.value).collect();
    assert_eq!(
        values,
        vec![Some(1.0), Some(1.0), Some(2.0), Some(2.0), Some(2.0), Some(2.0)]
    );
}

#[tokio::test]
async fn facets_isolate_cache_files() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let east = DailyFetcher::new(10.0);
    let west = DailyFetcher::new(20.0);

    let req_east =
        WindowRequest::new("ng_storage", d(2024, 1, 1), d(2024, 1, 5)).with_facet("region", "east");
    let req_west =
        WindowRequest::new("ng_storage", d(2024, 1, 1), d(2024, 1, 5)).with_facet("region", "west");

    let (_, rep_east) = engine.fetch_window(&req_east, &east).await.unwrap();
    let (_, rep_west) = engine.fetch_window(&req_west, &west).await.unwrap();

    assert_ne!(rep_east.cache_path, rep_west.cache_path);
    assert!(rep_east.cache_path.to_string_lossy().ends_with("ng_storage__region=east.csv"));

    // Each facet key is an independent cache.
    let (window, report) = engine.fetch_window(&req_east, &east).await.unwrap();
    assert!(report.cache_hit);
    assert_eq!(window.rows()[0].value, Some(10.0));
}

#[tokio::test]
async fn edge_fill_only_requests_skip_internal_daily_holes() {
    let dir = tempdir().unwrap();
    let engine = SyncEngine::new(dir.path());
    let fetcher = DailyFetcher::new(1.0);

    // Seed two islands so the wide window has an internal hole.
    let left = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 3));
    let right = WindowRequest::new("hh_spot", d(2024, 1, 7), d(2024, 1, 9));
    engine.fetch_window(&left, &fetcher).await.unwrap();
    engine.fetch_window(&right, &fetcher).await.unwrap();

    let wide = WindowRequest::new("hh_spot", d(2024, 1, 1), d(2024, 1, 9)).edge_fill_only();
    let (_, report) = engine.fetch_window(&wide, &fetcher).await.unwrap();

    // Edges are already covered and the hole is deliberately left alone.
    assert!(report.fetched_segments.is_empty());
    assert!(report.cache_hit);
}
