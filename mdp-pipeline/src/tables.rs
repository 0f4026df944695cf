//! Tabular outputs
//!
//! Normalised and fused tables are written as CSV with a fixed header. Files
//! are replaced atomically, so a reader never sees a half-written table.

use crate::error::{PipelineError, PipelineResult};
use crate::utils::write_atomic;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

pub const VESSEL_TABLE: &str = "vessel_data.csv";
pub const SEA_STATE_TABLE: &str = "sea_state_data.csv";
pub const PORT_CALL_TABLE: &str = "port_call_data.csv";
pub const FUSED_TABLE: &str = "fused_data.csv";

/// A row with a fixed column layout
pub trait TabularRow {
    /// Column names, in output order
    fn columns() -> &'static [&'static str];

    /// Cell values, one per column; absent values are empty strings
    fn cells(&self) -> Vec<String>;
}

/// Locations of the tabular outputs under `<data_dir>/transformed`
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("transformed"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vessels(&self) -> PathBuf {
        self.root.join(VESSEL_TABLE)
    }

    pub fn sea_states(&self) -> PathBuf {
        self.root.join(SEA_STATE_TABLE)
    }

    pub fn port_calls(&self) -> PathBuf {
        self.root.join(PORT_CALL_TABLE)
    }

    pub fn fused(&self) -> PathBuf {
        self.root.join(FUSED_TABLE)
    }
}

/// Write `rows` to `path` as CSV, replacing any previous file
pub fn write_table<R: TabularRow>(path: &Path, rows: &[R]) -> PipelineResult<()> {
    write_atomic::<_, PipelineError>(path, |writer| {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(R::columns())?;
        for row in rows {
            csv_writer.write_record(row.cells())?;
        }
        csv_writer.flush()?;
        Ok(())
    })?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "Table written");
    Ok(())
}

pub fn cell_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn cell_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn cell_bool(value: Option<bool>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn cell_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub fn cell_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|v| v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}
