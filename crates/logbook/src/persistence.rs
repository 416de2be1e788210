//! Durable snapshots of the logbook store.
//!
//! All logbooks serialise into one self-describing JSON document, written
//! atomically (new file, fsync, rename) so readers always observe either
//! the previous or the new snapshot, never a torn one. Document bytes live
//! in the content-addressed tree and are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::logbook::SubmissionLogbook;
use crate::store::LogbookStore;

/// Snapshot document schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialisation error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported snapshot schema version {0}")]
    UnsupportedSchema(u32),
}

/// The on-disk snapshot document.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub logbooks: Vec<SubmissionLogbook>,
}

/// Write the store to `path` atomically.
pub fn save_snapshot(store: &LogbookStore, path: &Path) -> Result<(), PersistenceError> {
    let snapshot = SnapshotFile {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        saved_at: Utc::now(),
        logbooks: store.all(),
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&bytes)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    tracing::info!(
        path = %path.display(),
        logbooks = snapshot.logbooks.len(),
        "logbook snapshot written"
    );
    Ok(())
}

/// Reconstruct a store from a snapshot written by `save_snapshot`.
pub fn load_snapshot(path: &Path) -> Result<LogbookStore, PersistenceError> {
    let bytes = fs::read(path)?;
    let snapshot: SnapshotFile = serde_json::from_slice(&bytes)?;
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedSchema(snapshot.schema_version));
    }
    Ok(LogbookStore::restore(snapshot.logbooks))
}
