//! Durable per-source raw tables with identity-based deduplication
//!
//! Each source owns one JSON file holding a top-level array of raw records.
//! Appends rewrite the whole file atomically. A missing file is an empty
//! table; an unreadable one is logged as corruption, read as empty and
//! overwritten by the next append that adds something.

use crate::error::{PipelineError, PipelineResult};
use crate::normalize::split_records;
use crate::sources::SourceKind;
use crate::utils::write_atomic;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of one append
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// New records written
    pub added: usize,
    /// Records whose identity was already stored (or repeated in the batch)
    pub duplicates: usize,
    /// Table size after the append
    pub total: usize,
}

/// Directory of per-source raw tables
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, source: SourceKind) -> PathBuf {
        self.root.join(source.table_file())
    }

    /// Every stored entry for `source`; never fails
    pub fn load(&self, source: SourceKind) -> Vec<Value> {
        let path = self.table_path(source);
        match read_table(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    source = %source,
                    error_kind = e.kind(),
                    error = %e,
                    "Durable table unreadable, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Append the records whose identity is not stored yet
    ///
    /// Identities of existing entries are computed over the records split out
    /// of them, so tables holding whole payloads dedup the same way as tables
    /// holding single records. The file is only rewritten when something is
    /// added, which makes a repeated batch a no-op.
    pub fn append<F>(
        &self,
        source: SourceKind,
        new_records: Vec<Value>,
        identity_fn: F,
    ) -> PipelineResult<AppendOutcome>
    where
        F: Fn(&Value) -> String,
    {
        let mut entries = self.load(source);

        let mut seen: HashSet<String> = entries
            .iter()
            .flat_map(|entry| split_records(entry, source.collection_key()).records)
            .map(&identity_fn)
            .collect();

        let mut added = 0usize;
        let mut duplicates = 0usize;
        for record in new_records {
            if seen.insert(identity_fn(&record)) {
                entries.push(record);
                added += 1;
            } else {
                duplicates += 1;
            }
        }

        if added > 0 {
            let path = self.table_path(source);
            write_atomic::<_, PipelineError>(&path, |writer| {
                serde_json::to_writer_pretty(writer, &entries)?;
                Ok(())
            })?;
            debug!(source = %source, path = %path.display(), entries = entries.len(), "Durable table rewritten");
        }

        Ok(AppendOutcome {
            added,
            duplicates,
            total: entries.len(),
        })
    }
}

fn read_table(path: &Path) -> PipelineResult<Vec<Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(corruption(path, e.to_string())),
    };

    let value: Value =
        serde_json::from_str(&content).map_err(|e| corruption(path, e.to_string()))?;

    match value {
        Value::Array(entries) => Ok(entries),
        other => {
            warn!(
                path = %path.display(),
                error_kind = "storage_corruption",
                "Durable table is not an array, wrapping the stored value"
            );
            Ok(vec![other])
        }
    }
}

fn corruption(path: &Path, reason: String) -> PipelineError {
    PipelineError::StorageCorruption {
        path: path.display().to_string(),
        reason,
    }
}
