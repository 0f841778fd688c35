//! The typed failure taxonomy of the engine.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

/// Unified error type for the tscache engine.
///
/// Each variant carries enough context (series path, failing segment bounds)
/// to retry or diagnose a failed request. Only `CacheRead` is ever recovered
/// internally: a corrupt cache file degrades to an empty cache rather than
/// failing the request.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested window is inverted (`end` precedes `start`).
    ///
    /// Rejected before any I/O takes place.
    #[error("invalid range: end {end} precedes start {start}")]
    InvalidRange {
        /// Requested window start.
        start: NaiveDate,
        /// Requested window end.
        end: NaiveDate,
    },

    /// The cache file exists but could not be read or parsed.
    #[error("unreadable cache file {path}: {msg}")]
    CacheRead {
        /// Path of the offending cache file.
        path: PathBuf,
        /// Human-readable parse/read failure.
        msg: String,
    },

    /// The fetch collaborator failed for one segment.
    ///
    /// Aborts the whole request; nothing is persisted.
    #[error("fetch failed for segment [{start}, {end}]: {msg}")]
    Fetch {
        /// Start of the segment that failed.
        start: NaiveDate,
        /// End of the segment that failed.
        end: NaiveDate,
        /// Human-readable failure from the collaborator.
        msg: String,
    },

    /// Fetched data lacks a recognizable date/value column pair.
    #[error("normalization failed: {0}")]
    Normalization(String),

    /// Writing or atomically replacing the cache file failed.
    ///
    /// The previously committed cache file is left untouched.
    #[error("failed to persist cache file {path}: {msg}")]
    Persist {
        /// Target cache file path.
        path: PathBuf,
        /// Underlying I/O or serialization failure.
        msg: String,
    },
}

impl SyncError {
    /// Helper: build a `CacheRead` error for a path and message.
    pub fn cache_read(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::CacheRead {
            path: path.as_ref().to_path_buf(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Fetch` error tagged with the failing segment.
    pub fn fetch(start: NaiveDate, end: NaiveDate, msg: impl Into<String>) -> Self {
        Self::Fetch {
            start,
            end,
            msg: msg.into(),
        }
    }

    /// Helper: build a `Normalization` error.
    pub fn normalization(msg: impl Into<String>) -> Self {
        Self::Normalization(msg.into())
    }

    /// Helper: build a `Persist` error for a path and message.
    pub fn persist(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::Persist {
            path: path.as_ref().to_path_buf(),
            msg: msg.into(),
        }
    }
}
