//! Source normalisation
//!
//! One normaliser per source type turns raw records into fixed-shape rows.
//! They share a single driver: envelope splitting, per-record error
//! containment and the summary log line.

pub mod envelope;
pub mod lenient;
pub mod port_call;
pub mod sea_state;
pub mod vessel;

pub use envelope::{split_records, SplitRecords};
pub use port_call::{PortCall, PortCallNormalizer};
pub use sea_state::{SeaStateNormalizer, SeaStateObservation};
pub use vessel::{VesselNormalizer, VesselPosition};

use crate::error::SchemaShapeError;
use crate::sources::SourceKind;
use serde_json::Value;
use tracing::{info, warn};

/// Maps one raw record of a source into zero or more typed rows
pub trait SourceNormalizer {
    type Row;

    /// Source whose records this normaliser understands
    const SOURCE: SourceKind;

    fn normalize_record(&self, record: &Value) -> Result<Vec<Self::Row>, SchemaShapeError>;
}

/// Typed rows plus what was dropped on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub rows: Vec<T>,
    /// Raw records seen after envelope splitting
    pub records: usize,
    /// Malformed records and rejected envelope fragments
    pub skipped: usize,
}

/// Normalise a whole durable table
///
/// A malformed record is logged and skipped; it never aborts the rest.
pub fn normalize_table<N: SourceNormalizer>(normalizer: &N, entries: &[Value]) -> Normalized<N::Row> {
    let source = N::SOURCE;
    let mut rows = Vec::new();
    let mut records = 0usize;
    let mut skipped = 0usize;

    for entry in entries {
        let split = split_records(entry, source.collection_key());
        if split.rejected > 0 {
            warn!(
                source = %source,
                error_kind = "schema_shape",
                rejected = split.rejected,
                "Skipping envelope fragments that hold no records"
            );
            skipped += split.rejected;
        }

        for record in split.records {
            records += 1;
            match normalizer.normalize_record(record) {
                Ok(mut normalized) => rows.append(&mut normalized),
                Err(e) => {
                    warn!(
                        source = %source,
                        error_kind = "schema_shape",
                        error = %e,
                        "Skipping malformed record"
                    );
                    skipped += 1;
                }
            }
        }
    }

    info!(
        source = %source,
        records,
        rows = rows.len(),
        skipped,
        "Normalised source table"
    );

    Normalized { rows, records, skipped }
}

/// Deserialise a raw record into its lenient serde shape
pub(crate) fn decode_record<'a, T: serde::Deserialize<'a>>(record: &'a Value) -> Result<T, SchemaShapeError> {
    if !record.is_object() {
        return Err(SchemaShapeError::NotAnObject);
    }
    T::deserialize(record).map_err(|e| SchemaShapeError::BadField {
        field: "record",
        reason: e.to_string(),
    })
}
