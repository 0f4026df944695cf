//! Raw payload fixtures shaped like the upstream feeds

use httpmock::MockServer;
use mdp_common::config::TomlConfig;
use serde_json::{json, Value};
use std::path::PathBuf;

pub const POSITIONS_PATH: &str = "/api/ais/v1/locations";
pub const SEA_STATE_PATH: &str = "/api/sse/v1/measurements";
pub const PORT_CALLS_PATH: &str = "/api/port-call/v1/port-calls";

pub fn position_feature(mmsi: i64, lat: f64, lon: f64) -> Value {
    json!({
        "mmsi": mmsi,
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [lon, lat]},
        "properties": {
            "mmsi": mmsi,
            "sog": 10.2,
            "cog": 87.5,
            "navStat": 0,
            "rot": 0,
            "posAcc": true,
            "raim": false,
            "heading": 88,
            "timestamp": 41,
            "timestampExternal": 1714557600000i64
        }
    })
}

pub fn positions_payload(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "dataUpdatedTime": "2024-05-01T10:00:00Z",
        "features": features
    })
}

pub fn sea_state_feature(site: i64, lat: f64, lon: f64) -> Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [lon, lat]},
        "properties": {
            "siteNumber": site,
            "siteName": format!("Site {}", site),
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

pub fn sea_state_payload(features: Vec<Value>) -> Value {
    json!({"type": "FeatureCollection", "features": features})
}

/// Port call with `areas` port-area details
pub fn port_call(id: i64, mmsi: i64, areas: usize) -> Value {
    let details: Vec<Value> = (0..areas)
        .map(|i| {
            json!({
                "berthName": format!("Berth {}", i + 1),
                "portAreaName": format!("Area {}", i + 1),
                "eta": "2024-05-01T12:00:00Z",
                "etd": "2024-05-01T18:00:00Z"
            })
        })
        .collect();

    json!({
        "portCallId": id,
        "portCallTimestamp": "2024-05-01T08:00:00Z",
        "portToVisit": "FIHEL",
        "prevPort": "EETLL",
        "nextPort": "SEARN",
        "vesselName": format!("VESSEL {}", id),
        "imoLloyds": 9000000 + id,
        "mmsi": mmsi,
        "agentInfo": [{"role": 1, "name": "Agent A"}],
        "portAreaDetails": details
    })
}

pub fn port_calls_payload(calls: Vec<Value>) -> Value {
    json!({"dataUpdatedTime": "2024-05-01T08:00:00Z", "portCalls": calls})
}

/// Config pointing every endpoint at `server`, with fast retries
pub fn test_config(server: &MockServer, data_dir: PathBuf) -> TomlConfig {
    let mut config = TomlConfig {
        data_dir: Some(data_dir),
        ..TomlConfig::default()
    };
    config.endpoints.positions = server.url(POSITIONS_PATH);
    config.endpoints.sea_state = server.url(SEA_STATE_PATH);
    config.endpoints.port_calls = server.url(PORT_CALLS_PATH);
    config.http.timeout_ms = 2_000;
    config.http.backoff_base_ms = 10;
    config.http.user_agent = "mdp-tests/1.0".to_string();
    config
}
