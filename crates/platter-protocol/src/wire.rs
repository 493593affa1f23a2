//! Wire format: one JSON object per text frame.
//!
//! Each frame on the wire is:
//!   {"event": "<name>", "data": {<payload>}}
//!
//! Payload-less events may omit `data`; it is treated as `{}`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// Maximum frame size (64 KiB). The largest legitimate frame is a full
/// `motor_state` snapshot, which is a few hundred bytes.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode an event as a text frame.
pub fn encode_frame<T: Serialize>(event: &T) -> Result<String, ProtocolError> {
    let frame =
        serde_json::to_string(event).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(frame)
}

/// Decode a text frame into an event.
pub fn decode_frame<T: DeserializeOwned>(frame: &str) -> Result<T, ProtocolError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut value: Value =
        serde_json::from_str(frame).map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.entry("data")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Deserialization(e.to_string()))
}
