//! Envelope splitting
//!
//! The same conceptual payload reaches us in several wrappings: a bare list
//! of records, `{"<key>": [...]}`, a list holding one such object, or (in
//! older durable tables) whole payloads appended one after another. All of
//! them flatten to the same list of raw records here.

use serde_json::Value;

/// Raw records found in one value
#[derive(Debug, Default)]
pub struct SplitRecords<'a> {
    pub records: Vec<&'a Value>,
    /// Scalars, nulls, or wrappers whose collection key is not an array
    pub rejected: usize,
}

/// Flatten `value` into records, unwrapping arrays and `collection_key` wrappers
pub fn split_records<'a>(value: &'a Value, collection_key: &str) -> SplitRecords<'a> {
    let mut split = SplitRecords::default();
    collect(value, collection_key, &mut split);
    split
}

fn collect<'a>(value: &'a Value, collection_key: &str, split: &mut SplitRecords<'a>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, collection_key, split);
            }
        }
        Value::Object(map) => match map.get(collection_key) {
            Some(inner) if inner.is_array() => collect(inner, collection_key, split),
            Some(_) => split.rejected += 1,
            None => split.records.push(value),
        },
        _ => split.rejected += 1,
    }
}
