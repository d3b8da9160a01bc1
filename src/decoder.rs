//! Frame decoding for heterogeneous device line formats
//!
//! The firmware families emit at least two incompatible wire formats
//! (structured JSON and free text) plus human-readable diagnostics that
//! must never be mistaken for data. Classification is a layered fallback:
//! each rule either claims the line or hands it to the next one. Decoders
//! are pure line-in/frame-out functions with no I/O and no mutable state.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::model::{DecodedFrame, ReadingFrame};

/// Decoder strategy for one device class
pub trait FrameDecoder: Send + Sync {
    /// Classify one trimmed line into a frame
    fn decode(&self, line: &str) -> DecodedFrame;
}

/// Debug/info marker prefixes emitted by the ESP32 firmware
const MARKER_PREFIXES: [&str; 2] = ["DEBUG:", "INFO:"];

/// Startup and diagnostic phrases from the Arduino firmware variants
const INFO_PHRASES: [&str; 9] = [
    "Starting",
    "Setup complete",
    "Classification:",
    "Level:",
    "Hardware check",
    "LCD found",
    "Calibration",
    "===",
    "---",
];

fn raw_value_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Raw Sensor(?: Value)?:\s*(\d+)").expect("valid regex"))
}

fn moisture_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Moisture:\s*(\d+(?:\.\d+)?)%").expect("valid regex"))
}

/// Empty lines and marker-prefixed debug output
fn is_info_marker(line: &str) -> bool {
    line.is_empty() || MARKER_PREFIXES.iter().any(|m| line.starts_with(m))
}

/// Attempt a structured parse of a brace-delimited line.
///
/// Returns `None` when the line is not JSON at all so the caller can fall
/// through to the free-text rules; a successful parse without a numeric
/// moisture value is `Unrecognized` (the invariant is that `Reading`
/// frames always carry moisture).
fn decode_json(line: &str) -> Option<DecodedFrame> {
    if !(line.starts_with('{') && line.ends_with('}')) {
        return None;
    }

    let value: Value = serde_json::from_str(line).ok()?;

    let moisture = value.get("moisture").and_then(Value::as_f64);
    if moisture.is_none() {
        return Some(DecodedFrame::Unrecognized);
    }

    Some(DecodedFrame::Reading(ReadingFrame {
        moisture,
        raw: value.get("raw").and_then(Value::as_i64),
        temperature: value.get("temperature").and_then(Value::as_f64),
        field_id: value
            .get("fieldId")
            .and_then(Value::as_str)
            .map(str::to_string),
        status: value
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}

/// Free-text reading: `Raw Sensor Value: 512 | Moisture: 45%` plus the
/// debug-firmware variant `Raw Sensor: 1022 | Constrained: 800 | Moisture: 0%`
fn decode_free_text(line: &str) -> Option<DecodedFrame> {
    let raw = raw_value_pattern()
        .captures(line)
        .and_then(|c| c[1].parse::<i64>().ok())?;
    let moisture = moisture_pattern()
        .captures(line)
        .and_then(|c| c[1].parse::<f64>().ok())?;

    Some(DecodedFrame::Reading(ReadingFrame {
        moisture: Some(moisture),
        raw: Some(raw),
        ..Default::default()
    }))
}

/// Status lines carry one of two polarity phrases and are never data
fn decode_status(line: &str) -> Option<DecodedFrame> {
    if !line.contains("Status:") {
        return None;
    }
    if line.contains("wet enough") || line.contains("SOIL WET") {
        return Some(DecodedFrame::StatusNotice { status: "optimal" });
    }
    if line.contains("too dry") || line.contains("SOIL DRY") {
        return Some(DecodedFrame::StatusNotice { status: "dry" });
    }
    None
}

fn is_info_phrase(line: &str) -> bool {
    INFO_PHRASES.iter().any(|p| line.contains(p))
}

/// ESP32 firmware decoder: structured JSON frames only
#[derive(Debug, Clone, Copy)]
pub struct Esp32Decoder;

impl FrameDecoder for Esp32Decoder {
    fn decode(&self, line: &str) -> DecodedFrame {
        if is_info_marker(line) {
            return DecodedFrame::InfoNotice;
        }
        decode_json(line).unwrap_or(DecodedFrame::Unrecognized)
    }
}

/// Arduino Uno firmware decoder: JSON, free-text readings, status
/// phrases, and startup diagnostics, tried in that order.
///
/// The fixed free-text pattern takes precedence over the looser status
/// and info heuristics so a line carrying both a reading and decoration
/// still yields data.
#[derive(Debug, Clone, Copy)]
pub struct ArduinoDecoder;

impl FrameDecoder for ArduinoDecoder {
    fn decode(&self, line: &str) -> DecodedFrame {
        if is_info_marker(line) {
            return DecodedFrame::InfoNotice;
        }
        if let Some(frame) = decode_json(line) {
            return frame;
        }
        if let Some(frame) = decode_free_text(line) {
            return frame;
        }
        if let Some(frame) = decode_status(line) {
            return frame;
        }
        if is_info_phrase(line) {
            return DecodedFrame::InfoNotice;
        }
        DecodedFrame::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_reading_full() {
        let frame = Esp32Decoder.decode(
            r#"{"moisture":42.5,"raw":612,"temperature":26.1,"fieldId":"field-7"}"#,
        );
        match frame {
            DecodedFrame::Reading(r) => {
                assert_eq!(r.moisture, Some(42.5));
                assert_eq!(r.raw, Some(612));
                assert_eq!(r.temperature, Some(26.1));
                assert_eq!(r.field_id.as_deref(), Some("field-7"));
                assert_eq!(r.status, None);
            }
            other => panic!("expected Reading, got {other:?}"),
        }
    }

    #[test]
    fn test_json_without_moisture_is_unrecognized() {
        let frame = Esp32Decoder.decode(r#"{"raw":612,"temperature":26.1}"#);
        assert_eq!(frame, DecodedFrame::Unrecognized);
    }

    #[test]
    fn test_json_non_numeric_moisture_is_unrecognized() {
        let frame = Esp32Decoder.decode(r#"{"moisture":"wet"}"#);
        assert_eq!(frame, DecodedFrame::Unrecognized);
    }

    #[test]
    fn test_empty_and_marker_lines_are_info() {
        assert_eq!(Esp32Decoder.decode(""), DecodedFrame::InfoNotice);
        assert_eq!(
            Esp32Decoder.decode("DEBUG: wifi rssi -67"),
            DecodedFrame::InfoNotice
        );
        assert_eq!(
            Esp32Decoder.decode("INFO: boot complete"),
            DecodedFrame::InfoNotice
        );
        assert_eq!(ArduinoDecoder.decode(""), DecodedFrame::InfoNotice);
    }

    #[test]
    fn test_esp32_ignores_free_text_readings() {
        // Free-text extraction is an Arduino-only branch
        let frame = Esp32Decoder.decode("Raw Sensor Value: 512 | Moisture: 45%");
        assert_eq!(frame, DecodedFrame::Unrecognized);
    }

    #[test]
    fn test_free_text_reading() {
        let frame = ArduinoDecoder.decode("Raw Sensor Value: 512 | Moisture: 45%");
        match frame {
            DecodedFrame::Reading(r) => {
                assert_eq!(r.raw, Some(512));
                assert_eq!(r.moisture, Some(45.0));
                assert_eq!(r.temperature, None);
            }
            other => panic!("expected Reading, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_firmware_free_text_variant() {
        let frame = ArduinoDecoder.decode("Raw Sensor: 1022 | Constrained: 800 | Moisture: 0%");
        match frame {
            DecodedFrame::Reading(r) => {
                assert_eq!(r.raw, Some(1022));
                assert_eq!(r.moisture, Some(0.0));
            }
            other => panic!("expected Reading, got {other:?}"),
        }
    }

    #[test]
    fn test_free_text_fractional_moisture() {
        let frame = ArduinoDecoder.decode("Raw Sensor Value: 731 | Moisture: 12.5%");
        match frame {
            DecodedFrame::Reading(r) => assert_eq!(r.moisture, Some(12.5)),
            other => panic!("expected Reading, got {other:?}"),
        }
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(
            ArduinoDecoder.decode("Status: soil is wet enough"),
            DecodedFrame::StatusNotice { status: "optimal" }
        );
        assert_eq!(
            ArduinoDecoder.decode("Status: soil is too dry, water now"),
            DecodedFrame::StatusNotice { status: "dry" }
        );
        assert_eq!(
            ArduinoDecoder.decode("Status: SOIL DRY"),
            DecodedFrame::StatusNotice { status: "dry" }
        );
    }

    #[test]
    fn test_status_without_polarity_phrase() {
        assert_eq!(
            ArduinoDecoder.decode("Status: unknown sensor condition"),
            DecodedFrame::Unrecognized
        );
    }

    #[test]
    fn test_info_phrases() {
        assert_eq!(
            ArduinoDecoder.decode("Starting soil moisture monitor..."),
            DecodedFrame::InfoNotice
        );
        assert_eq!(
            ArduinoDecoder.decode("Setup complete"),
            DecodedFrame::InfoNotice
        );
        assert_eq!(
            ArduinoDecoder.decode("Classification: loam"),
            DecodedFrame::InfoNotice
        );
        assert_eq!(
            ArduinoDecoder.decode("=== Arduino Soil Moisture Sensor Debug ==="),
            DecodedFrame::InfoNotice
        );
    }

    #[test]
    fn test_malformed_json_falls_through_to_text_rules() {
        // Not valid JSON, but carries a recognizable info phrase
        assert_eq!(
            ArduinoDecoder.decode("{Starting up}"),
            DecodedFrame::InfoNotice
        );
    }

    #[test]
    fn test_garbage_is_unrecognized() {
        assert_eq!(
            ArduinoDecoder.decode("\u{fffd}\u{fffd}x91"),
            DecodedFrame::Unrecognized
        );
        assert_eq!(ArduinoDecoder.decode("hello"), DecodedFrame::Unrecognized);
    }
}
