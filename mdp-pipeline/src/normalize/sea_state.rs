//! Sea-state station observation normaliser

use super::lenient::{self, RawGeometry};
use super::{decode_record, SourceNormalizer};
use crate::error::SchemaShapeError;
use crate::sources::SourceKind;
use crate::tables::{cell_f64, cell_i64, cell_str, cell_time, TabularRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sea-state estimation from a measuring site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeaStateObservation {
    pub site_number: Option<i64>,
    pub site_name: Option<String>,
    pub site_type: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub sea_state: Option<String>,
    pub trend: Option<String>,
    pub wind_wave_dir: Option<f64>,
    pub confidence: Option<String>,
    pub heel_angle: Option<f64>,
    pub light_status: Option<String>,
    pub temperature: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl SeaStateObservation {
    /// `(lat, lon)` when both are known
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Deserialize)]
struct RawSeaStateFeature {
    #[serde(default)]
    properties: Option<RawSeaStateProperties>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeaStateProperties {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    site_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    site_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    site_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    last_update: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    sea_state: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    trend: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    wind_wave_dir: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    confidence: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    heel_angle: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    light_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    temperature: Option<f64>,
}

/// Normaliser for sea-state estimation features
#[derive(Debug, Default, Clone, Copy)]
pub struct SeaStateNormalizer;

impl SourceNormalizer for SeaStateNormalizer {
    type Row = SeaStateObservation;
    const SOURCE: SourceKind = SourceKind::SeaState;

    fn normalize_record(&self, record: &Value) -> Result<Vec<SeaStateObservation>, SchemaShapeError> {
        let raw: RawSeaStateFeature = decode_record(record)?;
        let p = raw.properties.ok_or(SchemaShapeError::MissingField("properties"))?;
        let coordinates = raw.geometry.and_then(|g| g.coordinates);

        Ok(vec![SeaStateObservation {
            site_number: p.site_number,
            site_name: p.site_name,
            site_type: p.site_type,
            last_update: p.last_update,
            sea_state: p.sea_state,
            trend: p.trend,
            wind_wave_dir: p.wind_wave_dir,
            confidence: p.confidence,
            heel_angle: p.heel_angle,
            light_status: p.light_status,
            temperature: p.temperature,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lon)| lon),
        }])
    }
}

pub const SEA_STATE_COLUMNS: &[&str] = &[
    "site_number",
    "site_name",
    "site_type",
    "last_update",
    "sea_state",
    "trend",
    "wind_wave_dir",
    "confidence",
    "heel_angle",
    "light_status",
    "temperature",
    "latitude",
    "longitude",
];

/// Number of leading sea-state columns copied into fused rows (all but lat/lon)
pub const SEA_STATE_FUSED_COLUMNS: usize = 11;

impl TabularRow for SeaStateObservation {
    fn columns() -> &'static [&'static str] {
        SEA_STATE_COLUMNS
    }

    fn cells(&self) -> Vec<String> {
        vec![
            cell_i64(self.site_number),
            cell_str(&self.site_name),
            cell_str(&self.site_type),
            cell_time(self.last_update),
            cell_str(&self.sea_state),
            cell_str(&self.trend),
            cell_f64(self.wind_wave_dir),
            cell_str(&self.confidence),
            cell_f64(self.heel_angle),
            cell_str(&self.light_status),
            cell_f64(self.temperature),
            cell_f64(self.latitude),
            cell_f64(self.longitude),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_table;
    use serde_json::json;

    fn site(number: i64, lat: f64, lon: f64) -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [lon, lat]},
            "properties": {
                "siteNumber": number,
                "siteName": "Kalbådagrund",
                "siteType": "FIXED",
                "lastUpdate": "2024-05-01T10:00:00Z",
                "seaState": "CALM",
                "trend": "NO_CHANGE",
                "windWaveDir": 180,
                "confidence": "GOOD",
                "heelAngle": 1.5,
                "lightStatus": "ON",
                "temperature": 7
            }
        })
    }

    #[test]
    fn test_feature_collection_payload() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [site(1, 60.0, 24.9), site(2, 10.0, 10.0)]
        });
        let normalized = normalize_table(&SeaStateNormalizer, &[payload]);

        assert_eq!(normalized.rows.len(), 2);
        let first = &normalized.rows[0];
        assert_eq!(first.site_number, Some(1));
        assert_eq!(first.site_name.as_deref(), Some("Kalbådagrund"));
        assert_eq!(first.sea_state.as_deref(), Some("CALM"));
        assert_eq!(first.wind_wave_dir, Some(180.0));
        assert_eq!(first.temperature, Some(7.0));
        assert_eq!(first.lat_lon(), Some((60.0, 24.9)));
        assert_eq!(
            first.last_update.map(|t| t.timestamp()),
            Some(1_714_557_600)
        );
    }

    #[test]
    fn test_missing_geometry_keeps_row_without_coordinates() {
        let record = json!({"properties": {"siteNumber": 3}});
        let rows = SeaStateNormalizer.normalize_record(&record).unwrap();
        assert_eq!(rows[0].site_number, Some(3));
        assert_eq!(rows[0].lat_lon(), None);
        assert_eq!(rows[0].sea_state, None);
    }

    #[test]
    fn test_fused_column_count_excludes_coordinates() {
        assert_eq!(SEA_STATE_COLUMNS[SEA_STATE_FUSED_COLUMNS], "latitude");
        assert_eq!(SEA_STATE_COLUMNS.len(), SEA_STATE_FUSED_COLUMNS + 2);
    }
}
