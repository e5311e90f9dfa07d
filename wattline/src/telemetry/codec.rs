//! Frame payload -> Reading.

use crate::types::Reading;

use super::error::TelemetryError;

/// Text and binary frames decode the same way; bytes that are not UTF-8 JSON fail here.
pub fn decode(frame: impl AsRef<[u8]>) -> Result<Reading, TelemetryError> {
    Ok(serde_json::from_slice::<Reading>(frame.as_ref())?)
}
