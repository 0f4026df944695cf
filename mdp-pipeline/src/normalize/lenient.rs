//! Lenient field decoding
//!
//! Upstream payloads drift: numbers arrive as strings, identifiers as floats,
//! leaves go missing. Every helper here maps an absent or unusable value to
//! `None` instead of failing, so one odd leaf never costs the whole record.

use chrono::{DateTime, Utc};
use mdp_common::time::{from_epoch_millis, parse_rfc3339};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn f64_of(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn i64_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn bool_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Textual form of an identifier such as an MMSI
///
/// `230`, `230.0` and `" 230 "` all become `"230"` so numeric and string
/// encodings compare equal.
pub fn identity_of(value: &Value) -> Option<String> {
    match value {
        Value::Number(_) => i64_of(value).map(|v| v.to_string()),
        Value::String(s) => normalize_identity(s),
        _ => None,
    }
}

/// Canonical text for an identifier already held as a string
pub fn normalize_identity(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(f)
            if f.is_finite()
                && f.fract() == 0.0
                && f.abs() < 9.0e15
                && !trimmed.chars().all(|c| c.is_ascii_digit()) =>
        {
            Some(format!("{}", f as i64))
        }
        _ => Some(trimmed.to_string()),
    }
}

/// RFC 3339 string or epoch milliseconds
pub fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_rfc3339(s),
        Value::Number(_) => i64_of(value).and_then(from_epoch_millis),
        _ => None,
    }
}

/// GeoJSON `[lon, lat]` pair as `(lat, lon)`
///
/// Out-of-range values (AIS uses 91/181 for "not available") are rejected.
pub fn lat_lon_of(coordinates: &Value) -> Option<(f64, f64)> {
    let pair = coordinates.as_array()?;
    let lon = pair.first().and_then(f64_of)?;
    let lat = pair.get(1).and_then(f64_of)?;
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some((lat, lon))
    } else {
        None
    }
}

fn decode<'de, D, T>(deserializer: D, convert: fn(&Value) -> Option<T>) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(convert))
}

pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    decode(d, f64_of)
}

pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    decode(d, i64_of)
}

pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    decode(d, bool_of)
}

pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    decode(d, string_of)
}

pub fn opt_identity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    decode(d, identity_of)
}

pub fn opt_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    decode(d, timestamp_of)
}

pub fn opt_lat_lon<'de, D: Deserializer<'de>>(d: D) -> Result<Option<(f64, f64)>, D::Error> {
    decode(d, lat_lon_of)
}

/// `geometry` object holding GeoJSON coordinates
#[derive(Debug, Default, Deserialize)]
pub struct RawGeometry {
    #[serde(default, deserialize_with = "opt_lat_lon")]
    pub coordinates: Option<(f64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_from_strings() {
        assert_eq!(f64_of(&json!("12.5")), Some(12.5));
        assert_eq!(f64_of(&json!("NaN")), None);
        assert_eq!(i64_of(&json!(7.0)), Some(7));
        assert_eq!(i64_of(&json!(7.5)), None);
        assert_eq!(i64_of(&json!(" 42 ")), Some(42));
    }

    #[test]
    fn test_bool_variants() {
        assert_eq!(bool_of(&json!(true)), Some(true));
        assert_eq!(bool_of(&json!(0)), Some(false));
        assert_eq!(bool_of(&json!("TRUE")), Some(true));
        assert_eq!(bool_of(&json!("maybe")), None);
    }

    #[test]
    fn test_identity_normalization() {
        assert_eq!(identity_of(&json!(230)), Some("230".to_string()));
        assert_eq!(identity_of(&json!(230.0)), Some("230".to_string()));
        assert_eq!(identity_of(&json!("230.0")), Some("230".to_string()));
        assert_eq!(identity_of(&json!(" 230 ")), Some("230".to_string()));
        // Leading zeros in a digit-only string are kept verbatim
        assert_eq!(identity_of(&json!("0230")), Some("0230".to_string()));
        assert_eq!(identity_of(&json!("")), None);
        // Beyond exact integer range the text is kept as given
        assert_eq!(identity_of(&json!("1e20")), Some("1e20".to_string()));
        assert_eq!(identity_of(&json!("-2.5e18")), Some("-2.5e18".to_string()));
        assert_eq!(identity_of(&json!("2.3e8")), Some("230000000".to_string()));
        assert_eq!(identity_of(&json!(null)), None);
    }

    #[test]
    fn test_timestamps() {
        let from_ms = timestamp_of(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(from_ms.timestamp(), 1_700_000_000);

        let from_str = timestamp_of(&json!("2024-05-01T10:00:00.000Z")).unwrap();
        assert_eq!(from_str.timestamp(), 1_714_557_600);

        assert!(timestamp_of(&json!("not a time")).is_none());
    }

    #[test]
    fn test_lat_lon_order_and_range() {
        assert_eq!(lat_lon_of(&json!([24.9, 60.1])), Some((60.1, 24.9)));
        assert_eq!(lat_lon_of(&json!([181.0, 91.0])), None);
        assert_eq!(lat_lon_of(&json!([24.9])), None);
        assert_eq!(lat_lon_of(&json!("24.9,60.1")), None);
    }

    #[test]
    fn test_geometry_tolerates_bad_coordinates() {
        let geometry: RawGeometry = serde_json::from_value(json!({"coordinates": "oops"})).unwrap();
        assert!(geometry.coordinates.is_none());

        let geometry: RawGeometry = serde_json::from_value(json!({})).unwrap();
        assert!(geometry.coordinates.is_none());
    }
}
