//! Core data types shared across the bridge pipeline
//!
//! Frames and payloads live for a single line-processing cycle; only
//! `ConnectionState` persists, owned by the connection supervisor.

use serde::{Deserialize, Serialize};

/// A reading extracted from one device line.
///
/// Decoders only produce this when at least a moisture value was found,
/// but the field stays optional so the validator owns the final check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFrame {
    /// Moisture percentage (0-100) as reported by the device
    pub moisture: Option<f64>,
    /// Raw ADC value from the sensor
    pub raw: Option<i64>,
    /// Ambient temperature in degrees Celsius
    pub temperature: Option<f64>,
    /// Logical field identifier supplied by the firmware
    pub field_id: Option<String>,
    /// Firmware-reported status string
    pub status: Option<String>,
}

/// Classification of one raw device line
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// A measurement carrying at least a moisture value
    Reading(ReadingFrame),
    /// A status-only line ("optimal" or "dry"); never forwarded as data
    StatusNotice { status: &'static str },
    /// Startup banner, debug output, or other diagnostics
    InfoNotice,
    /// Nothing recognizable was extracted
    Unrecognized,
}

/// Canonical reading payload posted to the ingestion endpoint.
///
/// Optional fields are omitted from the JSON body entirely when absent,
/// never serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPayload {
    pub device_id: String,
    /// Moisture percentage rounded to one decimal place
    pub moisture: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Device link state, owned exclusively by the connection supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt made yet
    Closed,
    /// Open attempt in flight
    Opening,
    /// Device link established, lines flowing
    Open,
    /// Link lost or open failed; reopen scheduled
    Faulted,
}

/// Lifecycle and data events emitted by a line source.
///
/// Everything the port can do (open, deliver a line, fail, disappear)
/// arrives through this single-consumer channel message type.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Device link acquired
    Opened,
    /// One complete line, trimmed of surrounding whitespace
    Line(String),
    /// Open failure or runtime fault with a diagnostic reason
    Error(String),
    /// Device link went away (cable unplug, firmware reset)
    Closed,
}

/// Result of one uplink delivery attempt; logged and discarded
#[derive(Debug, Clone, Default)]
pub struct UplinkOutcome {
    pub accepted: bool,
    pub http_status: u16,
    /// Server-supplied message, usually present on rejection
    pub server_message: Option<String>,
    /// Identifier of the stored reading when the server reports one
    pub record_id: Option<String>,
    /// Per-field validation details from the server's `errors` array
    pub validation_errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_payload_omits_absent_fields() {
        let payload = CanonicalPayload {
            device_id: "ESP32-SOIL-001".to_string(),
            moisture: 42.5,
            raw: Some(612),
            temperature: None,
            field_id: None,
            status: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["deviceId"], "ESP32-SOIL-001");
        assert_eq!(json["moisture"], 42.5);
        assert_eq!(json["raw"], 612);
        // Absent optionals must not appear at all, not as null
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("temperature"));
        assert!(!obj.contains_key("fieldId"));
        assert!(!obj.contains_key("status"));
    }

    #[test]
    fn test_payload_json_round_trip() {
        let payload = CanonicalPayload {
            device_id: "ESP32-SOIL-001".to_string(),
            moisture: 42.5,
            raw: Some(612),
            temperature: Some(26.1),
            field_id: Some("field-7".to_string()),
            status: Some("optimal".to_string()),
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: CanonicalPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_payload_round_trip_preserves_absence() {
        let payload = CanonicalPayload {
            device_id: "ARDUINO-UNO-001".to_string(),
            moisture: 45.0,
            raw: None,
            temperature: None,
            field_id: None,
            status: None,
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: CanonicalPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
        assert!(back.raw.is_none());
        assert!(back.temperature.is_none());
    }
}
