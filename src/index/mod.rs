//! Secondary indexes kept coherent with the primary map on every mutation.
//!
//! Three independent structures, mirroring the original's
//! `lookup_tables.py`: exact-value, tokenized text, and vector.

mod text_index;
mod value_index;
mod vector_index;

pub use text_index::TextIndex;
pub use value_index::{HashableKey, ValueIndex};
pub use vector_index::VectorIndex;

use serde_json::Value;

/// Extract the text to index from a value: a plain string, or an object
/// with a string `text` field.
pub fn extract_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("text").and_then(Value::as_str),
        _ => None,
    }
}

/// Extract the vector to index from a value: an object with a `vector`
/// field containing an array of numbers.
pub fn extract_vector(value: &Value) -> Option<Vec<f64>> {
    let Value::Object(map) = value else {
        return None;
    };
    let Some(Value::Array(items)) = map.get("vector") else {
        return None;
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item.as_f64()?);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_text_from_plain_string() {
        assert_eq!(extract_text(&json!("hello world")), Some("hello world"));
    }

    #[test]
    fn extract_text_from_object_with_text_field() {
        assert_eq!(
            extract_text(&json!({"text": "hello kv store"})),
            Some("hello kv store")
        );
    }

    #[test]
    fn extract_text_none_for_other_shapes() {
        assert_eq!(extract_text(&json!(42)), None);
        assert_eq!(extract_text(&json!({"other": "field"})), None);
    }

    #[test]
    fn extract_vector_from_object() {
        assert_eq!(
            extract_vector(&json!({"vector": [1.0, 0.5, 0.0]})),
            Some(vec![1.0, 0.5, 0.0])
        );
    }

    #[test]
    fn extract_vector_none_when_missing_or_wrong_shape() {
        assert_eq!(extract_vector(&json!({"vector": "nope"})), None);
        assert_eq!(extract_vector(&json!("plain string")), None);
    }
}
