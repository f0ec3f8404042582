//! Snapshot report parser
//!
//! The upstream sensor serves an XML `<report>` document; a JSON rendition
//! of the same document is accepted as well. The format is picked from the
//! first non-blank byte. In both forms every value may arrive as text, so
//! numbers are accepted as numeric strings, and a single `drone` element may
//! appear without an enclosing array.

use chrono::{DateTime, Utc};
use ndz_common::Coordinate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Batch, FeedDevice, Observation};
use crate::error::{NdzError, Result};
use crate::zone::NoFlyZone;

/// Wrapper for the JSON report
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    #[serde(default)]
    device_information: Option<Value>,
    capture: RawCapture,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCapture {
    snapshot_timestamp: String,
    #[serde(default)]
    drone: Value,
}

/// `<report>` as served by the sensor
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlReport {
    #[serde(default)]
    device_information: Option<XmlDevice>,
    capture: XmlCapture,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XmlDevice {
    #[serde(rename = "@deviceId", default)]
    device_id: Option<String>,
    listen_range: Option<String>,
    device_started: Option<String>,
    uptime_seconds: Option<String>,
    update_interval_ms: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlCapture {
    #[serde(rename = "@snapshotTimestamp")]
    snapshot_timestamp: String,
    #[serde(default)]
    drone: Vec<XmlDrone>,
}

/// Drone element kept as text so one bad value only drops its own record
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct XmlDrone {
    serial_number: Option<String>,
    model: Option<String>,
    manufacturer: Option<String>,
    position_x: Option<String>,
    position_y: Option<String>,
    altitude: Option<String>,
}

/// Report reduced to what both formats share
struct ParsedReport {
    snapshot_timestamp: String,
    device: Option<FeedDevice>,
    drones: Vec<Value>,
}

/// Why a single record was left out of the batch
#[derive(Debug, Error, PartialEq)]
enum RecordError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a finite number: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

fn number_field(record: &Map<String, Value>, field: &'static str) -> Result<f64, RecordError> {
    let value = record.get(field).ok_or(RecordError::MissingField(field))?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return Err(RecordError::MissingField(field)),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(RecordError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn text_field(record: &Map<String, Value>, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Validate one raw drone record.
///
/// `serialNumber`, `positionX`, `positionY` and `altitude` are required;
/// `model` and `manufacturer` default to an empty string.
fn parse_record(
    raw: &Value,
    observed_at: DateTime<Utc>,
    zone: &NoFlyZone,
) -> Result<Observation, RecordError> {
    let record = raw.as_object().ok_or(RecordError::NotAnObject)?;

    let id = text_field(record, "serialNumber")
        .filter(|s| !s.is_empty())
        .ok_or(RecordError::MissingField("serialNumber"))?;
    let position = Coordinate::new(
        number_field(record, "positionX")?,
        number_field(record, "positionY")?,
    );
    let altitude = number_field(record, "altitude")?;
    let distance = zone.distance_km(position);

    Ok(Observation {
        id,
        model: text_field(record, "model").unwrap_or_default(),
        manufacturer: text_field(record, "manufacturer").unwrap_or_default(),
        position,
        altitude,
        observed_at,
        distance,
        is_violation: zone.is_violation(distance),
    })
}

fn parse_device(raw: &Value) -> Option<FeedDevice> {
    let record = raw.as_object()?;
    Some(FeedDevice {
        device_id: text_field(record, "deviceId"),
        listen_range: number_field(record, "listenRange").ok(),
        device_started: text_field(record, "deviceStarted"),
        uptime_seconds: number_field(record, "uptimeSeconds").ok(),
        update_interval_ms: number_field(record, "updateIntervalMs").ok(),
    })
}

fn parse_text_number(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<XmlDevice> for FeedDevice {
    fn from(raw: XmlDevice) -> Self {
        Self {
            listen_range: parse_text_number(raw.listen_range.as_ref()),
            uptime_seconds: parse_text_number(raw.uptime_seconds.as_ref()),
            update_interval_ms: parse_text_number(raw.update_interval_ms.as_ref()),
            device_id: trimmed(raw.device_id),
            device_started: trimmed(raw.device_started),
        }
    }
}

fn read_json(body: &str) -> Result<ParsedReport> {
    let report: RawReport = serde_json::from_str(body)
        .map_err(|e| NdzError::malformed(format!("unexpected report shape: {}", e)))?;

    let drones = match report.capture.drone {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single @ Value::Object(_) => vec![single],
        other => {
            return Err(NdzError::malformed(format!(
                "'drone' must be an array or object, got {}",
                other
            )));
        }
    };

    Ok(ParsedReport {
        snapshot_timestamp: report.capture.snapshot_timestamp,
        device: report.device_information.as_ref().and_then(parse_device),
        drones,
    })
}

fn read_xml(body: &str) -> Result<ParsedReport> {
    let report: XmlReport = quick_xml::de::from_str(body)
        .map_err(|e| NdzError::malformed(format!("unexpected report document: {}", e)))?;

    let drones = report
        .capture
        .drone
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| NdzError::malformed(format!("unreadable drone element: {}", e)))?;

    Ok(ParsedReport {
        snapshot_timestamp: report.capture.snapshot_timestamp,
        device: report.device_information.map(FeedDevice::from),
        drones,
    })
}

/// Parse one snapshot report into a [`Batch`].
///
/// Fails with [`NdzError::MalformedFeed`] only when the report as a whole is
/// unusable; bad drone records are skipped and counted.
pub fn parse_report(body: &str, zone: &NoFlyZone) -> Result<Batch> {
    let body = body.trim_start_matches('\u{feff}').trim_start();
    let report = if body.starts_with('<') {
        read_xml(body)?
    } else {
        read_json(body)?
    };

    let observed_at = DateTime::parse_from_rfc3339(report.snapshot_timestamp.trim())
        .map_err(|e| {
            NdzError::malformed(format!(
                "bad snapshotTimestamp '{}': {}",
                report.snapshot_timestamp, e
            ))
        })?
        .with_timezone(&Utc);

    let mut records = Vec::with_capacity(report.drones.len());
    let mut skipped = 0;
    for (index, raw) in report.drones.iter().enumerate() {
        match parse_record(raw, observed_at, zone) {
            Ok(observation) => records.push(observation),
            Err(e) => {
                skipped += 1;
                tracing::debug!("Skipping drone record #{}: {}", index, e);
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            "Skipped {} of {} drone records in snapshot {}",
            skipped,
            report.drones.len(),
            observed_at
        );
    }

    let batch = Batch::new(observed_at, report.device, records, skipped);
    tracing::debug!(
        "Snapshot {}: {} drones, {} inside the zone",
        observed_at,
        batch.len(),
        batch.violations().count()
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "deviceInformation": {
            "deviceId": "GUARDB1RD",
            "listenRange": "500000",
            "deviceStarted": "2022-12-18T12:44:06.116Z",
            "uptimeSeconds": "5945",
            "updateIntervalMs": "2000"
        },
        "capture": {
            "snapshotTimestamp": "2022-12-18T14:25:31.285Z",
            "drone": [
                {"serialNumber": "SN-inside", "model": "HRP-DEDST", "manufacturer": "DroneGoat Inc",
                 "mac": "f0:2d:7a:2e:61:67", "positionY": "250000", "positionX": "300000", "altitude": "4503.27"},
                {"serialNumber": "SN-outside", "model": "Mosquito", "manufacturer": "MegaBuzzer Corp",
                 "positionY": 450000.0, "positionX": 250000.0, "altitude": 4000}
            ]
        }
    }"#;

    #[test]
    fn test_parse_report_basic() {
        let batch = parse_report(REPORT, &NoFlyZone::default()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.skipped(), 0);
        assert_eq!(batch.observed_at().to_rfc3339(), "2022-12-18T14:25:31.285+00:00");

        let inside = &batch.records()[0];
        assert_eq!(inside.id, "SN-inside");
        assert_eq!(inside.model, "HRP-DEDST");
        assert_eq!(inside.manufacturer, "DroneGoat Inc");
        assert_eq!(inside.distance, 50.0);
        assert!(inside.is_violation);
        assert_eq!(inside.observed_at, batch.observed_at());

        let outside = &batch.records()[1];
        assert_eq!(outside.distance, 200.0);
        assert!(!outside.is_violation);
        assert_eq!(outside.altitude, 4000.0);
    }

    #[test]
    fn test_parse_device_information() {
        let batch = parse_report(REPORT, &NoFlyZone::default()).unwrap();
        let device = batch.device().unwrap();
        assert_eq!(device.device_id.as_deref(), Some("GUARDB1RD"));
        assert_eq!(device.listen_range, Some(500000.0));
        assert_eq!(device.update_interval_ms, Some(2000.0));
    }

    #[test]
    fn test_single_drone_object_and_empty_capture() {
        let single = r#"{"capture": {"snapshotTimestamp": "2022-12-18T14:25:31Z",
            "drone": {"serialNumber": "SN-1", "positionX": 1, "positionY": 2, "altitude": 3}}}"#;
        let batch = parse_report(single, &NoFlyZone::default()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].model, "");
        assert!(batch.device().is_none());

        let empty = r#"{"capture": {"snapshotTimestamp": "2022-12-18T14:25:31Z"}}"#;
        let batch = parse_report(empty, &NoFlyZone::default()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_bad_records_are_skipped_individually() {
        let body = r#"{"capture": {"snapshotTimestamp": "2022-12-18T14:25:31Z", "drone": [
            {"serialNumber": "SN-ok", "positionX": 250000, "positionY": 250000, "altitude": 1},
            {"positionX": 250000, "positionY": 250000, "altitude": 1},
            {"serialNumber": "  ", "positionX": 250000, "positionY": 250000, "altitude": 1},
            {"serialNumber": "SN-nox", "positionY": 250000, "altitude": 1},
            {"serialNumber": "SN-text", "positionX": "far", "positionY": 250000, "altitude": 1},
            {"serialNumber": "SN-noalt", "positionX": 250000, "positionY": 250000, "altitude": null},
            "not a record"
        ]}}"#;
        let batch = parse_report(body, &NoFlyZone::default()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].id, "SN-ok");
        assert_eq!(batch.skipped(), 6);
    }

    #[test]
    fn test_record_errors() {
        let zone = NoFlyZone::default();
        let now = Utc::now();
        let raw: Value = serde_json::json!({"serialNumber": "X", "positionX": 1, "positionY": 1});
        assert_eq!(
            parse_record(&raw, now, &zone).unwrap_err(),
            RecordError::MissingField("altitude")
        );
        let raw: Value =
            serde_json::json!({"serialNumber": "X", "positionX": true, "positionY": 1, "altitude": 1});
        assert!(matches!(
            parse_record(&raw, now, &zone).unwrap_err(),
            RecordError::InvalidNumber { field: "positionX", .. }
        ));
    }

    const XML_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<report>
  <deviceInformation deviceId="GUARDB1RD">
    <listenRange>500000</listenRange>
    <deviceStarted>2022-12-18T12:44:06.116Z</deviceStarted>
    <uptimeSeconds>5945</uptimeSeconds>
    <updateIntervalMs>2000</updateIntervalMs>
  </deviceInformation>
  <capture snapshotTimestamp="2022-12-18T14:25:31.285Z">
    <drone>
      <serialNumber>SN-dfh4Z7vUde</serialNumber>
      <model>HRP-DEDST</model>
      <manufacturer>DroneGoat Inc</manufacturer>
      <mac>f0:2d:7a:2e:61:67</mac>
      <ipv4>14.223.86.113</ipv4>
      <ipv6>f0bc:0ab7:3d8e:5ab4:9e9e:fd1c:d4b8:f6f2</ipv6>
      <firmware>6.0.3</firmware>
      <positionY>250000</positionY>
      <positionX>300000</positionX>
      <altitude>4503.2754464768685</altitude>
    </drone>
    <drone>
      <serialNumber>SN-mH3qlC1kmU</serialNumber>
      <model>Mosquito</model>
      <manufacturer>MegaBuzzer Corp</manufacturer>
      <mac>c9:31:5f:ed:57:da</mac>
      <ipv4>49.200.46.233</ipv4>
      <ipv6>9c43:ba5a:3d5e:2bb9:4a4d:0e4f:a2f8:2b4e</ipv6>
      <firmware>3.4.4</firmware>
      <positionY>450000</positionY>
      <positionX>250000</positionX>
      <altitude>4124.918215591908</altitude>
    </drone>
    <drone>
      <serialNumber>SN-broken</serialNumber>
      <model>Eagle</model>
      <manufacturer>Bird Corp</manufacturer>
      <positionY>north</positionY>
      <positionX>250000</positionX>
      <altitude>4000</altitude>
    </drone>
  </capture>
</report>"#;

    #[test]
    fn test_parse_xml_report() {
        let batch = parse_report(XML_REPORT, &NoFlyZone::default()).unwrap();
        assert_eq!(batch.observed_at().to_rfc3339(), "2022-12-18T14:25:31.285+00:00");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.skipped(), 1);

        let inside = &batch.records()[0];
        assert_eq!(inside.id, "SN-dfh4Z7vUde");
        assert_eq!(inside.model, "HRP-DEDST");
        assert_eq!(inside.manufacturer, "DroneGoat Inc");
        assert_eq!(inside.distance, 50.0);
        assert!(inside.is_violation);

        let outside = &batch.records()[1];
        assert_eq!(outside.id, "SN-mH3qlC1kmU");
        assert_eq!(outside.distance, 200.0);
        assert!(!outside.is_violation);
        assert_eq!(batch.violations().count(), 1);

        let device = batch.device().unwrap();
        assert_eq!(device.device_id.as_deref(), Some("GUARDB1RD"));
        assert_eq!(device.listen_range, Some(500000.0));
        assert_eq!(device.update_interval_ms, Some(2000.0));
    }

    #[test]
    fn test_parse_xml_single_drone_and_empty_capture() {
        let single = r#"<report><capture snapshotTimestamp="2022-12-18T14:25:31Z">
            <drone><serialNumber>SN-1</serialNumber><positionX>1</positionX>
            <positionY>2</positionY><altitude>3</altitude></drone>
        </capture></report>"#;
        let batch = parse_report(single, &NoFlyZone::default()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].model, "");
        assert!(batch.device().is_none());

        let empty = r#"<report><capture snapshotTimestamp="2022-12-18T14:25:31Z"></capture></report>"#;
        let batch = parse_report(empty, &NoFlyZone::default()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_xml_record_missing_fields_are_skipped() {
        let body = r#"<report><capture snapshotTimestamp="2022-12-18T14:25:31Z">
            <drone><serialNumber>SN-ok</serialNumber><positionX>250000</positionX>
            <positionY>250000</positionY><altitude>1</altitude></drone>
            <drone><positionX>250000</positionX><positionY>250000</positionY><altitude>1</altitude></drone>
            <drone><serialNumber>SN-noalt</serialNumber><positionX>250000</positionX>
            <positionY>250000</positionY></drone>
        </capture></report>"#;
        let batch = parse_report(body, &NoFlyZone::default()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].id, "SN-ok");
        assert_eq!(batch.skipped(), 2);
    }

    #[test]
    fn test_malformed_reports_fail_wholesale() {
        let zone = NoFlyZone::default();
        for body in [
            "<report></report>",
            "<report><capture><drone/></capture></report>",
            r#"<report><capture snapshotTimestamp="yesterday"></capture></report>"#,
            "<report><capture",
            r#"{"deviceInformation": {}}"#,
            r#"{"capture": {"drone": []}}"#,
            r#"{"capture": {"snapshotTimestamp": "yesterday", "drone": []}}"#,
            r#"{"capture": {"snapshotTimestamp": "2022-12-18T14:25:31Z", "drone": 7}}"#,
        ] {
            let err = parse_report(body, &zone).unwrap_err();
            assert!(matches!(err, NdzError::MalformedFeed(_)), "accepted: {}", body);
        }
    }
}
