//! Flexible decoding of stored import content into reading items.
//!
//! Producers send either a JSON array or a single object, and either as a
//! structured value or as JSON text. Every shape is funneled into the same
//! array-then-object fallback.

use serde_json::{Map, Value};

use crate::ImportError;

// ---

/// The shapes import content can arrive in.
///
/// `PgStore` hands back parsed JSONB; `Text` and `Bytes` cover stores that
/// return the column undecoded.
#[derive(Debug, Clone)]
pub enum RawContent {
    // ---
    Parsed(Value),
    // Only built by tests until a store returns undecoded content.
    #[cfg_attr(not(test), allow(dead_code))]
    Text(String),
    #[cfg_attr(not(test), allow(dead_code))]
    Bytes(Vec<u8>),
}

impl From<Value> for RawContent {
    fn from(value: Value) -> Self {
        RawContent::Parsed(value)
    }
}

/// Decode `raw` into a non-empty list of item values.
///
/// - parsed array: used as is
/// - parsed string: treated as JSON text
/// - JSON text or bytes: parsed as an array, then as a single object
/// - any other parsed value: re-serialized and sent through the text path
///
/// Fails with [`ImportError::Decode`] when nothing yields at least one item.
pub fn decode_items(raw: RawContent) -> Result<Vec<Value>, ImportError> {
    // ---
    let items = match raw {
        RawContent::Parsed(Value::Array(items)) => items,
        RawContent::Parsed(Value::String(text)) | RawContent::Text(text) => {
            items_from_json(text.as_bytes())
        }
        RawContent::Bytes(bytes) => items_from_json(&bytes),
        RawContent::Parsed(other) => {
            let bytes = serde_json::to_vec(&other)
                .map_err(|e| ImportError::Decode(format!("re-serialize failed: {}", e)))?;
            items_from_json(&bytes)
        }
    };

    if items.is_empty() {
        return Err(ImportError::Decode("content holds no items".to_string()));
    }
    Ok(items)
}

fn items_from_json(bytes: &[u8]) -> Vec<Value> {
    // ---
    if let Ok(items) = serde_json::from_slice::<Vec<Value>>(bytes) {
        if !items.is_empty() {
            return items;
        }
    }
    match serde_json::from_slice::<Map<String, Value>>(bytes) {
        Ok(obj) if !obj.is_empty() => vec![Value::Object(obj)],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn item() -> Value {
        json!({"name": "Tag 1", "location": {"latitude": 1.0, "longitude": 2.0}})
    }

    #[test]
    fn test_parsed_array_is_used_directly() {
        // ---
        let items = decode_items(json!([item(), item()]).into()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parsed_object_is_wrapped() {
        // ---
        let items = decode_items(item().into()).unwrap();
        assert_eq!(items, vec![item()]);
    }

    #[test]
    fn test_json_text_array() {
        // ---
        let text = serde_json::to_string(&json!([item()])).unwrap();
        assert_eq!(decode_items(RawContent::Text(text)).unwrap(), vec![item()]);
    }

    #[test]
    fn test_json_text_object() {
        // ---
        let text = serde_json::to_string(&item()).unwrap();
        assert_eq!(decode_items(RawContent::Text(text)).unwrap(), vec![item()]);
    }

    #[test]
    fn test_string_value_holding_json_text() {
        // ---
        let encoded = Value::String(serde_json::to_string(&json!([item()])).unwrap());
        assert_eq!(decode_items(encoded.into()).unwrap(), vec![item()]);
    }

    #[test]
    fn test_bytes() {
        // ---
        let bytes = serde_json::to_vec(&json!([item()])).unwrap();
        assert_eq!(decode_items(RawContent::Bytes(bytes)).unwrap(), vec![item()]);
    }

    #[test]
    fn test_empty_shapes_fail() {
        // ---
        for raw in [
            RawContent::Parsed(json!([])),
            RawContent::Parsed(json!({})),
            RawContent::Parsed(Value::Null),
            RawContent::Parsed(json!(42)),
            RawContent::Text("[]".to_string()),
            RawContent::Text("{}".to_string()),
            RawContent::Text("not json".to_string()),
            RawContent::Bytes(Vec::new()),
        ] {
            assert!(
                matches!(decode_items(raw.clone()), Err(ImportError::Decode(_))),
                "expected decode failure for {:?}",
                raw
            );
        }
    }
}
