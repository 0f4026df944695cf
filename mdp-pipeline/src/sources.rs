//! Source registry
//!
//! The three upstream feeds, their durable table names, the key their
//! payloads wrap records in, and how a raw record's identity is computed for
//! deduplication.

use mdp_common::config::{EndpointConfig, ScheduleConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Upstream feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// AIS vessel positions
    Positions,
    /// Sea-state station observations
    SeaState,
    /// Port-call records
    PortCalls,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Positions,
        SourceKind::SeaState,
        SourceKind::PortCalls,
    ];

    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Positions => "positions",
            SourceKind::SeaState => "sea_state",
            SourceKind::PortCalls => "port_calls",
        }
    }

    /// File name of the durable raw table
    pub fn table_file(&self) -> &'static str {
        match self {
            SourceKind::Positions => "vessel_location_data.json",
            SourceKind::SeaState => "sea_state_estimation_data.json",
            SourceKind::PortCalls => "port_call_data.json",
        }
    }

    /// Key under which a payload object wraps its record array
    pub fn collection_key(&self) -> &'static str {
        match self {
            SourceKind::Positions | SourceKind::SeaState => "features",
            SourceKind::PortCalls => "portCalls",
        }
    }

    pub fn url<'a>(&self, endpoints: &'a EndpointConfig) -> &'a str {
        match self {
            SourceKind::Positions => &endpoints.positions,
            SourceKind::SeaState => &endpoints.sea_state,
            SourceKind::PortCalls => &endpoints.port_calls,
        }
    }

    pub fn interval(&self, schedule: &ScheduleConfig) -> Duration {
        match self {
            SourceKind::Positions => schedule.positions_interval(),
            SourceKind::SeaState => schedule.sea_state_interval(),
            SourceKind::PortCalls => schedule.port_calls_interval(),
        }
    }

    /// Only vessel positions are restricted to the bounding box
    pub fn is_geo_filtered(&self) -> bool {
        matches!(self, SourceKind::Positions)
    }

    /// Deduplication identity of one raw record
    ///
    /// - Positions: hash of the full raw feature, so every distinct report
    ///   of a vessel accumulates while exact repeats are dropped
    /// - SeaState: `siteNumber` + `lastUpdate`
    /// - PortCalls: `portCallId`
    ///
    /// Records missing their identity fields fall back to the full-record hash.
    pub fn identity(&self, record: &Value) -> String {
        match self {
            SourceKind::Positions => record_hash(record),
            SourceKind::SeaState => {
                let properties = record.get("properties");
                let site = properties.and_then(|p| p.get("siteNumber"));
                let updated = properties.and_then(|p| p.get("lastUpdate"));
                match (site, updated) {
                    (None, None) => record_hash(record),
                    _ => format!("{}|{}", identity_part(site), identity_part(updated)),
                }
            }
            SourceKind::PortCalls => match record.get("portCallId") {
                Some(id) if !id.is_null() => identity_part(Some(id)),
                _ => record_hash(record),
            },
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SHA-256 of the canonical JSON serialisation (object keys are sorted)
pub fn record_hash(record: &Value) -> String {
    let canonical = record.to_string();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

fn identity_part(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}
