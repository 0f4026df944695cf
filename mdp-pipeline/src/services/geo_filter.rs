//! Bounding-box filter for vessel positions

use crate::normalize::lenient;
use mdp_common::config::BoundingBox;
use serde_json::Value;

/// `true` when `(lat, lon)` lies inside `bbox`, edges included
pub fn contains(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    bbox.min_lat <= lat && lat <= bbox.max_lat && bbox.min_lon <= lon && lon <= bbox.max_lon
}

/// `(lat, lon)` of a raw GeoJSON feature, from `geometry.coordinates = [lon, lat]`
pub fn position_of(record: &Value) -> Option<(f64, f64)> {
    record
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(lenient::lat_lon_of)
}

/// Keep records positioned inside `bbox`
///
/// Records without a readable position are dropped with the out-of-box ones,
/// since they cannot be shown to be inside. Returns the kept records and the
/// number dropped.
pub fn retain_in_box(records: Vec<Value>, bbox: &BoundingBox) -> (Vec<Value>, usize) {
    let before = records.len();
    let kept: Vec<Value> = records
        .into_iter()
        .filter(|record| matches!(position_of(record), Some((lat, lon)) if contains(lat, lon, bbox)))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gulf_of_finland() -> BoundingBox {
        BoundingBox {
            min_lat: 59.4,
            max_lat: 65.0,
            min_lon: 19.9,
            max_lon: 27.0,
        }
    }

    fn at(lat: f64, lon: f64) -> Value {
        json!({"geometry": {"type": "Point", "coordinates": [lon, lat]}, "properties": {}})
    }

    #[test]
    fn test_contains_is_inclusive() {
        let bbox = gulf_of_finland();
        assert!(contains(60.1, 24.9, &bbox));
        assert!(contains(59.4, 19.9, &bbox));
        assert!(contains(65.0, 27.0, &bbox));
        assert!(!contains(59.39, 24.9, &bbox));
        assert!(!contains(60.1, 27.01, &bbox));
        assert!(!contains(10.0, 10.0, &bbox));
    }

    #[test]
    fn test_position_is_lat_lon_from_geojson_order() {
        assert_eq!(position_of(&at(60.1, 24.9)), Some((60.1, 24.9)));
        assert_eq!(position_of(&json!({"properties": {}})), None);
        assert_eq!(
            position_of(&json!({"geometry": {"coordinates": "60,24"}})),
            None
        );
    }

    #[test]
    fn test_retain_drops_outside_and_unpositioned() {
        let records = vec![
            at(60.1, 24.9),
            at(10.0, 10.0),
            json!({"properties": {"mmsi": 1}}),
            at(64.9, 20.0),
        ];
        let (kept, dropped) = retain_in_box(records, &gulf_of_finland());
        assert_eq!(kept, vec![at(60.1, 24.9), at(64.9, 20.0)]);
        assert_eq!(dropped, 2);
    }
}
