//! tscache
//!
//! Cache-backed synchronization engine for time-indexed numeric series
//! (daily/weekly/monthly observations) retrieved from a remote, rate/cost
//! constrained data source.
//!
//! Given a requested date window, [`SyncEngine::fetch_window`] returns the
//! observations for that window while fetching from the remote source only
//! the sub-ranges not already present in a local on-disk cache, then merges,
//! deduplicates, persists, and returns a consistent cached superset.
//!
//! - `types`: observations, tables, segments, cadence, reports, requests.
//! - `timeseries`: cadence inference, gap detection, and merging.
//! - `normalize`: canonicalization of loosely-typed provider records.
//! - `store`: deterministic cache paths and atomic CSV persistence.
//! - `sync`: the [`SegmentFetcher`] collaborator trait and the orchestrator.
//!
//! The remote source is abstracted behind [`SegmentFetcher`], an async trait
//! invoked once per missing sub-range, strictly in sequence. The engine
//! itself has no internal parallelism; its only suspension points are the
//! collaborator calls and the cache write. Cross-process locking of a cache
//! file is a caller responsibility.
//!
//! ```rust,ignore
//! use tscache::{SyncEngine, WindowRequest};
//!
//! let engine = SyncEngine::new("data/cache");
//! let req = WindowRequest::new("ng_storage_lower48", start, end)
//!     .with_facet("region", "lower48");
//! let (window, report) = engine.fetch_window(&req, &fetcher).await?;
//! ```
#![warn(missing_docs)]

pub mod error;
pub mod normalize;
pub mod store;
pub mod sync;
pub mod timeseries;
pub mod types;

pub use error::SyncError;
pub use normalize::normalize_records;
pub use store::CacheStore;
pub use sync::{SegmentFetcher, SyncEngine};
pub use timeseries::gaps::missing_segments;
pub use timeseries::infer::{DEFAULT_MIN_SAMPLE_SIZE, infer_frequency};
pub use timeseries::merge::merge_tables;
pub use types::{
    Cadence, FetchedSegment, FrequencyInfo, Observation, Segment, SeriesTable, SyncReport,
    WindowRequest,
};
