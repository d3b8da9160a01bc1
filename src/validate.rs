//! Reading validation and canonical payload construction
//!
//! Separates domain validity from parsing ambiguity: the decoder decides
//! whether a line is a reading at all, this module decides whether the
//! reading is acceptable and shapes the uplink payload.

use tracing::warn;

use crate::model::{CanonicalPayload, ReadingFrame};

/// Round to one decimal place, half away from zero at the tenths digit
fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Validate a reading frame and build the canonical payload.
///
/// Rejects (with a warning log) when moisture is absent, non-finite, or
/// outside the closed interval [0, 100]. The device identifier is not
/// part of the frame; it is injected here from process configuration.
pub fn normalize_reading(frame: &ReadingFrame, device_id: &str) -> Option<CanonicalPayload> {
    let moisture = match frame.moisture {
        Some(m) if m.is_finite() && (0.0..=100.0).contains(&m) => m,
        other => {
            warn!("Dropping reading with invalid moisture value: {:?}", other);
            return None;
        }
    };

    Some(CanonicalPayload {
        device_id: device_id.to_string(),
        moisture: round_tenths(moisture),
        raw: frame.raw,
        // Zero is treated as "not reported" by the firmware's
        // temperature channel, so it is not passed through.
        temperature: frame.temperature.filter(|t| *t != 0.0),
        field_id: frame.field_id.clone(),
        status: frame.status.clone(),
    })
}
