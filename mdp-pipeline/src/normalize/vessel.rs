//! AIS vessel position normaliser

use super::lenient::{self, RawGeometry};
use super::{decode_record, SourceNormalizer};
use crate::error::SchemaShapeError;
use crate::sources::SourceKind;
use crate::tables::{cell_bool, cell_f64, cell_i64, TabularRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One AIS position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselPosition {
    pub mmsi: String,
    /// Speed over ground (knots)
    pub sog: Option<f64>,
    /// Course over ground (degrees)
    pub cog: Option<f64>,
    pub nav_stat: Option<i64>,
    pub rot: Option<f64>,
    pub pos_acc: Option<bool>,
    pub raim: Option<bool>,
    pub heading: Option<f64>,
    pub timestamp: Option<i64>,
    /// Epoch milliseconds at which the upstream service received the report
    pub timestamp_external: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl VesselPosition {
    /// `(lat, lon)` when both are known
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Deserialize)]
struct RawVesselFeature {
    #[serde(default, deserialize_with = "lenient::opt_identity")]
    mmsi: Option<String>,
    #[serde(default)]
    properties: Option<RawVesselProperties>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVesselProperties {
    #[serde(default, deserialize_with = "lenient::opt_identity")]
    mmsi: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    sog: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    cog: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    nav_stat: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    rot: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pos_acc: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    raim: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    timestamp_external: Option<i64>,
}

/// Normaliser for AIS location features
#[derive(Debug, Default, Clone, Copy)]
pub struct VesselNormalizer;

impl SourceNormalizer for VesselNormalizer {
    type Row = VesselPosition;
    const SOURCE: SourceKind = SourceKind::Positions;

    fn normalize_record(&self, record: &Value) -> Result<Vec<VesselPosition>, SchemaShapeError> {
        let raw: RawVesselFeature = decode_record(record)?;
        let properties = raw.properties.ok_or(SchemaShapeError::MissingField("properties"))?;

        let mmsi = properties
            .mmsi
            .or(raw.mmsi)
            .ok_or(SchemaShapeError::MissingField("mmsi"))?;
        let coordinates = raw.geometry.and_then(|g| g.coordinates);

        Ok(vec![VesselPosition {
            mmsi,
            sog: properties.sog,
            cog: properties.cog,
            nav_stat: properties.nav_stat,
            rot: properties.rot,
            pos_acc: properties.pos_acc,
            raim: properties.raim,
            heading: properties.heading,
            timestamp: properties.timestamp,
            timestamp_external: properties.timestamp_external,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lon)| lon),
        }])
    }
}

pub const VESSEL_COLUMNS: &[&str] = &[
    "mmsi",
    "sog",
    "cog",
    "nav_stat",
    "rot",
    "pos_acc",
    "raim",
    "heading",
    "timestamp",
    "timestamp_external",
    "latitude",
    "longitude",
];

impl TabularRow for VesselPosition {
    fn columns() -> &'static [&'static str] {
        VESSEL_COLUMNS
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.mmsi.clone(),
            cell_f64(self.sog),
            cell_f64(self.cog),
            cell_i64(self.nav_stat),
            cell_f64(self.rot),
            cell_bool(self.pos_acc),
            cell_bool(self.raim),
            cell_f64(self.heading),
            cell_i64(self.timestamp),
            cell_i64(self.timestamp_external),
            cell_f64(self.latitude),
            cell_f64(self.longitude),
        ]
    }
}
