//! Time-series utilities shared by the store and the orchestrator.
//!
//! Modules include:
//! - `infer`: estimate series cadence from observed day-deltas
//! - `gaps`: compute the missing sub-ranges of a requested window
//! - `merge`: fold fetched rows into a cached table with last-write-wins

/// Missing-coverage detection (daily internal fill, edge fill).
pub mod gaps;
/// Cadence inference from modal day-deltas.
pub mod infer;
/// Merge utilities for folding fetched rows into cached tables.
pub mod merge;
