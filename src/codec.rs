//! Line-framed JSON codec.
//!
//! Framing is one JSON object per line, terminated by `\n`. Decoding
//! performs no schema validation beyond object-ness; op-specific field
//! checks happen at dispatch time.

use crate::error::Error;
use serde_json::{Map, Value};

/// Encode a message as a single compact JSON line with a trailing newline.
pub fn encode(payload: &Value) -> Vec<u8> {
    let mut out = serde_json::to_vec(payload).expect("Value always serializes");
    out.push(b'\n');
    out
}

/// Decode one line of input into a JSON object.
///
/// Fails with a protocol error if the line is not valid JSON, or if the
/// top-level value is not an object.
pub fn decode(line: &str) -> Result<Map<String, Value>, Error> {
    let value: Value =
        serde_json::from_str(line).map_err(|_| Error::Protocol("Invalid JSON".to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Protocol("Message must be an object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_adds_trailing_newline() {
        let bytes = encode(&json!({"status": "ok"}));
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert!(std::str::from_utf8(&bytes).unwrap().ends_with('\n'));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode("not json at all").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON");
    }

    #[test]
    fn decode_rejects_non_object_top_level() {
        let err = decode("[1,2,3]").unwrap_err();
        assert_eq!(err.to_string(), "Message must be an object");
    }

    #[test]
    fn decode_accepts_object() {
        let map = decode(r#"{"op":"get","key":"k"}"#).unwrap();
        assert_eq!(map.get("op").unwrap(), "get");
    }
}
