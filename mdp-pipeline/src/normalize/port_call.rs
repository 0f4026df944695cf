//! Port-call normaliser
//!
//! A port call carries call-level fields plus a list of port-area details.
//! Each area detail becomes its own row sharing the call-level fields. A
//! call without any area detail contributes no rows.

use super::lenient;
use super::{decode_record, SourceNormalizer};
use crate::error::SchemaShapeError;
use crate::sources::SourceKind;
use crate::tables::{cell_bool, cell_i64, cell_str, cell_time, TabularRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One port-call row (call-level fields + one port-area detail)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortCall {
    pub port_call_id: i64,
    pub port_call_timestamp: Option<DateTime<Utc>>,
    pub customs_reference: Option<String>,
    pub port_to_visit: Option<String>,
    pub prev_port: Option<String>,
    pub next_port: Option<String>,
    pub domestic_traffic_arrival: Option<bool>,
    pub domestic_traffic_departure: Option<bool>,
    pub arrival_with_cargo: Option<bool>,
    pub discharge: Option<i64>,
    pub vessel_name: Option<String>,
    pub imo: Option<i64>,
    pub nationality: Option<String>,
    pub vessel_type_code: Option<i64>,
    pub mmsi: Option<String>,
    pub agent_names: Vec<String>,
    pub berth_name: Option<String>,
    pub port_area_name: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    pub etd: Option<DateTime<Utc>>,
    pub ata: Option<DateTime<Utc>>,
    pub atd: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPortCall {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    port_call_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    port_call_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    customs_reference: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    port_to_visit: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    prev_port: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    next_port: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    domestic_traffic_arrival: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    domestic_traffic_departure: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    arrival_with_cargo: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    discharge: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    vessel_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    imo_lloyds: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    nationality: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    vessel_type_code: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_identity")]
    mmsi: Option<String>,
    #[serde(default)]
    agent_info: Option<Value>,
    #[serde(default)]
    port_area_details: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPortAreaDetail {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    berth_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    port_area_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    eta: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    etd: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    ata: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    atd: Option<DateTime<Utc>>,
}

/// Agent names in payload order; entries without a name are ignored
fn agent_names(agent_info: Option<&Value>) -> Vec<String> {
    agent_info
        .and_then(Value::as_array)
        .map(|agents| {
            agents
                .iter()
                .filter_map(|agent| agent.get("name").and_then(lenient::string_of))
                .collect()
        })
        .unwrap_or_default()
}

/// Normaliser for port-call records
#[derive(Debug, Default, Clone, Copy)]
pub struct PortCallNormalizer;

impl SourceNormalizer for PortCallNormalizer {
    type Row = PortCall;
    const SOURCE: SourceKind = SourceKind::PortCalls;

    fn normalize_record(&self, record: &Value) -> Result<Vec<PortCall>, SchemaShapeError> {
        let raw: RawPortCall = decode_record(record)?;
        let port_call_id = raw
            .port_call_id
            .ok_or(SchemaShapeError::MissingField("portCallId"))?;

        let details = match raw.port_area_details.as_ref() {
            None | Some(Value::Null) => {
                debug!(port_call_id, "Port call has no port area details; no rows emitted");
                return Ok(Vec::new());
            }
            Some(Value::Array(details)) => details,
            Some(_) => {
                return Err(SchemaShapeError::BadField {
                    field: "portAreaDetails",
                    reason: "expected an array".to_string(),
                })
            }
        };

        let agents = agent_names(raw.agent_info.as_ref());
        let mut rows = Vec::with_capacity(details.len());

        for detail in details {
            let area: RawPortAreaDetail = match decode_record(detail) {
                Ok(area) => area,
                Err(e) => {
                    debug!(port_call_id, error = %e, "Skipping unreadable port area detail");
                    continue;
                }
            };

            rows.push(PortCall {
                port_call_id,
                port_call_timestamp: raw.port_call_timestamp,
                customs_reference: raw.customs_reference.clone(),
                port_to_visit: raw.port_to_visit.clone(),
                prev_port: raw.prev_port.clone(),
                next_port: raw.next_port.clone(),
                domestic_traffic_arrival: raw.domestic_traffic_arrival,
                domestic_traffic_departure: raw.domestic_traffic_departure,
                arrival_with_cargo: raw.arrival_with_cargo,
                discharge: raw.discharge,
                vessel_name: raw.vessel_name.clone(),
                imo: raw.imo_lloyds,
                nationality: raw.nationality.clone(),
                vessel_type_code: raw.vessel_type_code,
                mmsi: raw.mmsi.clone(),
                agent_names: agents.clone(),
                berth_name: area.berth_name,
                port_area_name: area.port_area_name,
                eta: area.eta,
                etd: area.etd,
                ata: area.ata,
                atd: area.atd,
            });
        }

        Ok(rows)
    }
}

pub const PORT_CALL_COLUMNS: &[&str] = &[
    "port_call_id",
    "port_call_timestamp",
    "customs_reference",
    "port_to_visit",
    "prev_port",
    "next_port",
    "domestic_traffic_arrival",
    "domestic_traffic_departure",
    "arrival_with_cargo",
    "discharge",
    "vessel_name",
    "imo",
    "nationality",
    "vessel_type_code",
    "mmsi",
    "agent_names",
    "berth_name",
    "port_area_name",
    "eta",
    "etd",
    "ata",
    "atd",
];

/// Position of `mmsi` in [`PORT_CALL_COLUMNS`]; the fused table keeps the vessel's copy
pub const PORT_CALL_MMSI_COLUMN: usize = 14;

impl TabularRow for PortCall {
    fn columns() -> &'static [&'static str] {
        PORT_CALL_COLUMNS
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.port_call_id.to_string(),
            cell_time(self.port_call_timestamp),
            cell_str(&self.customs_reference),
            cell_str(&self.port_to_visit),
            cell_str(&self.prev_port),
            cell_str(&self.next_port),
            cell_bool(self.domestic_traffic_arrival),
            cell_bool(self.domestic_traffic_departure),
            cell_bool(self.arrival_with_cargo),
            cell_i64(self.discharge),
            cell_str(&self.vessel_name),
            cell_i64(self.imo),
            cell_str(&self.nationality),
            cell_i64(self.vessel_type_code),
            cell_str(&self.mmsi),
            self.agent_names.join(", "),
            cell_str(&self.berth_name),
            cell_str(&self.port_area_name),
            cell_time(self.eta),
            cell_time(self.etd),
            cell_time(self.ata),
            cell_time(self.atd),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_table;
    use serde_json::json;

    fn call_with_areas(id: i64, areas: Value) -> Value {
        json!({
            "portCallId": id,
            "portCallTimestamp": "2024-05-01T08:00:00Z",
            "customsReference": "C-1",
            "portToVisit": "FIHEL",
            "prevPort": "EETLL",
            "nextPort": "SEARN",
            "domesticTrafficArrival": false,
            "domesticTrafficDeparture": false,
            "arrivalWithCargo": true,
            "discharge": 1,
            "vesselName": "FINNSTAR",
            "imoLloyds": 9468906,
            "nationality": "FI",
            "vesselTypeCode": 20,
            "mmsi": 230629000,
            "agentInfo": [{"role": 1, "name": "Agent A"}, {"role": 2, "name": "Agent B"}, "junk"],
            "portAreaDetails": areas
        })
    }

    #[test]
    fn test_one_row_per_area_detail() {
        let record = call_with_areas(
            7,
            json!([
                {"berthName": "B1", "portAreaName": "West", "eta": "2024-05-01T10:00:00Z"},
                {"berthName": "B2", "portAreaName": "East", "ata": "2024-05-01T11:00:00Z"}
            ]),
        );
        let rows = PortCallNormalizer.normalize_record(&record).unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.port_call_id, 7);
            assert_eq!(row.mmsi.as_deref(), Some("230629000"));
            assert_eq!(row.imo, Some(9468906));
            assert_eq!(row.vessel_name.as_deref(), Some("FINNSTAR"));
            assert_eq!(row.agent_names, vec!["Agent A", "Agent B"]);
        }
        assert_eq!(rows[0].berth_name.as_deref(), Some("B1"));
        assert!(rows[0].eta.is_some());
        assert!(rows[0].ata.is_none());
        assert_eq!(rows[1].port_area_name.as_deref(), Some("East"));
        assert!(rows[1].ata.is_some());

        // Call-level cells are identical; only per-area cells differ
        let (a, b) = (rows[0].cells(), rows[1].cells());
        assert_eq!(&a[..16], &b[..16]);
        assert_ne!(&a[16..], &b[16..]);
    }

    #[test]
    fn test_absent_area_details_yield_no_rows() {
        let mut record = call_with_areas(8, json!(null));
        assert!(PortCallNormalizer.normalize_record(&record).unwrap().is_empty());

        record.as_object_mut().unwrap().remove("portAreaDetails");
        assert!(PortCallNormalizer.normalize_record(&record).unwrap().is_empty());

        let record = call_with_areas(9, json!([]));
        assert!(PortCallNormalizer.normalize_record(&record).unwrap().is_empty());
    }

    #[test]
    fn test_non_array_area_details_is_schema_error() {
        let record = call_with_areas(10, json!({"berthName": "B1"}));
        assert!(matches!(
            PortCallNormalizer.normalize_record(&record),
            Err(SchemaShapeError::BadField { field: "portAreaDetails", .. })
        ));
    }

    #[test]
    fn test_missing_port_call_id_is_schema_error() {
        let record = json!({"mmsi": 1, "portAreaDetails": [{}]});
        assert_eq!(
            PortCallNormalizer.normalize_record(&record),
            Err(SchemaShapeError::MissingField("portCallId"))
        );
    }

    #[test]
    fn test_payload_wrapper_shapes() {
        let calls = json!([call_with_areas(1, json!([{"berthName": "B1"}]))]);
        let wrapped = json!({"dataUpdatedTime": "2024-05-01T08:00:00Z", "portCalls": calls.clone()});
        let list_wrapped = json!([{"portCalls": calls.clone()}]);

        let a = normalize_table(&PortCallNormalizer, &[calls]);
        let b = normalize_table(&PortCallNormalizer, &[wrapped]);
        let c = normalize_table(&PortCallNormalizer, &[list_wrapped]);
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.rows, c.rows);
        assert_eq!(a.rows.len(), 1);
    }

    #[test]
    fn test_agent_names_cell_is_joined() {
        let record = call_with_areas(11, json!([{}]));
        let rows = PortCallNormalizer.normalize_record(&record).unwrap();
        assert_eq!(rows[0].cells()[15], "Agent A, Agent B");
        assert_eq!(PORT_CALL_COLUMNS[PORT_CALL_MMSI_COLUMN], "mmsi");
    }
}
