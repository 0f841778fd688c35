//! On-disk cache store: deterministic path derivation and atomic CSV
//! persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::types::{Observation, SeriesTable};

/// Maps series/facet keys to cache files and handles their (atomic) I/O.
///
/// The store owns its cache directory exclusively: one file per
/// series/facet combination, created on first sync and never deleted by the
/// engine. The CSV file is the sole persisted state; there is no index or
/// metadata sidecar.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Build a store rooted at `cache_dir`. The directory is created lazily
    /// on first save.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// The directory this store persists into.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Derive the cache file path for a series key and its facet parameters.
    ///
    /// Facets are appended as `__{key}={value}` in key order (the `BTreeMap`
    /// iterates sorted), so identical logical requests resolve to the same
    /// path regardless of the order facets were supplied in. Path separators
    /// and spaces are replaced to keep the name filesystem-safe.
    #[must_use]
    pub fn cache_path(&self, series_key: &str, facets: &BTreeMap<String, String>) -> PathBuf {
        let mut parts: Vec<String> = vec![series_key.to_owned()];
        for (k, v) in facets {
            parts.push(format!("{k}={v}"));
        }
        let safe = parts.join("__").replace(['/', ' '], "_");
        self.cache_dir.join(format!("{safe}.csv"))
    }

    /// Load a table from a cache file.
    ///
    /// A missing file is an empty cache, not an error.
    ///
    /// # Errors
    /// Returns `SyncError::CacheRead` if the file exists but cannot be read
    /// or parsed. Callers may degrade this to an empty cache.
    pub fn load(&self, path: &Path) -> Result<SeriesTable, SyncError> {
        if !path.exists() {
            return Ok(SeriesTable::new());
        }
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| SyncError::cache_read(path, e.to_string()))?;
        let mut rows: Vec<Observation> = Vec::new();
        for record in reader.deserialize() {
            let row: Observation =
                record.map_err(|e| SyncError::cache_read(path, e.to_string()))?;
            rows.push(row);
        }
        Ok(SeriesTable::from_rows(rows))
    }

    /// Persist a table to a cache file atomically.
    ///
    /// The table is written to a temporary file in the same directory and
    /// renamed over the target, so no reader ever observes a partially
    /// written file even if the process is interrupted mid-write.
    ///
    /// # Errors
    /// Returns `SyncError::Persist` if the write or the rename fails. The
    /// previously committed file, if any, is left untouched.
    pub fn save(&self, path: &Path, table: &SeriesTable) -> Result<(), SyncError> {
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| SyncError::persist(path, e.to_string()))?;

        let tmp = path.with_extension("csv.tmp");
        let write_result = write_csv(&tmp, table);
        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp);
            return Err(SyncError::persist(path, e));
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(SyncError::persist(path, e.to_string()));
        }
        Ok(())
    }
}

fn write_csv(tmp: &Path, table: &SeriesTable) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(tmp).map_err(|e| e.to_string())?;
    for row in table.rows() {
        writer.serialize(row).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}
