//! Conversion of decoded JSON payloads into record attributes.
//!
//! Decoding is lenient: one bad attribute never sinks the whole payload.
//! Attributes that cannot be represented (arrays) are dropped and reported
//! by dotted path so the caller can log them; the rest are applied.

use crate::catalog::SymbolCatalog;
use crate::value::{FieldValue, Fields};
use serde_json::Value;

/// Key of the union envelope that wraps activation payloads.
pub const ENVELOPE_KEY: &str = "msg";

/// Result of decoding one payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoded {
    /// Attributes that decoded cleanly.
    pub fields: Fields,
    /// Dotted paths of attributes that were dropped.
    pub dropped: Vec<String>,
    /// The payload was not an object at all.
    pub malformed: bool,
}

/// Decode a payload object into attributes.
///
/// A non-object payload yields an empty, `malformed` result.
#[must_use]
pub fn decode_attributes(value: &Value, catalog: &SymbolCatalog) -> Decoded {
    let Value::Object(object) = value else {
        return Decoded {
            malformed: true,
            ..Decoded::default()
        };
    };

    let mut dropped = Vec::new();
    let fields = decode_object(object, catalog, "", &mut dropped);
    Decoded {
        fields,
        dropped,
        malformed: false,
    }
}

/// Strip the single-key `{"msg": {...}}` union envelope, if present.
#[must_use]
pub fn unwrap_envelope(value: &Value) -> &Value {
    match value {
        Value::Object(object) if object.len() == 1 => match object.get(ENVELOPE_KEY) {
            Some(inner @ Value::Object(_)) => inner,
            _ => value,
        },
        _ => value,
    }
}

fn decode_object(
    object: &serde_json::Map<String, Value>,
    catalog: &SymbolCatalog,
    prefix: &str,
    dropped: &mut Vec<String>,
) -> Fields {
    let mut fields = Fields::new();
    for (key, raw) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match decode_value(key, raw, catalog, &path, dropped) {
            Some(value) => {
                fields.insert(key.clone(), value);
            }
            None => dropped.push(path),
        }
    }
    fields
}

fn decode_value(
    key: &str,
    raw: &Value,
    catalog: &SymbolCatalog,
    path: &str,
    dropped: &mut Vec<String>,
) -> Option<FieldValue> {
    match raw {
        Value::Null => Some(FieldValue::Null),
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| n.as_f64().map(FieldValue::Float)),
        Value::String(s) => Some(
            catalog
                .resolve(key, s)
                .map_or_else(|| FieldValue::Text(s.clone()), FieldValue::Symbol),
        ),
        Value::Object(inner) => Some(FieldValue::Map(decode_object(
            inner, catalog, path, dropped,
        ))),
        Value::Array(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::value::Symbol;
    use serde_json::json;

    #[test]
    fn strings_resolve_through_catalog() {
        let decoded = decode_attributes(
            &json!({"sevr": "MAJOR", "category": "Safety"}),
            &SymbolCatalog::default(),
        );

        assert_eq!(
            decoded.fields.get("sevr"),
            Some(&FieldValue::Symbol(Symbol::new("MAJOR", 2)))
        );
        // No category enumeration installed by default
        assert_eq!(decoded.fields.get("category"), Some(&FieldValue::from("Safety")));
        assert!(decoded.dropped.is_empty());
        assert!(!decoded.malformed);
    }

    #[test]
    fn scalars_keep_their_kind() {
        let decoded = decode_attributes(
            &json!({"count": 3, "ratio": 0.5, "latching": true, "note": null}),
            &SymbolCatalog::empty(),
        );

        assert_eq!(decoded.fields.get("count"), Some(&FieldValue::Integer(3)));
        assert_eq!(decoded.fields.get("ratio"), Some(&FieldValue::Float(0.5)));
        assert_eq!(decoded.fields.get("latching"), Some(&FieldValue::Bool(true)));
        assert_eq!(decoded.fields.get("note"), Some(&FieldValue::Null));
    }

    #[test]
    fn arrays_are_dropped_and_reported() {
        let decoded = decode_attributes(
            &json!({
                "screenpath": "/ops",
                "masks": ["a", "b"],
                "producer": {"pv": "IOC:X", "links": [1, 2]}
            }),
            &SymbolCatalog::empty(),
        );

        assert_eq!(decoded.fields.get("screenpath"), Some(&FieldValue::from("/ops")));
        assert!(!decoded.fields.contains_key("masks"));
        assert_eq!(decoded.dropped, vec!["masks".to_string(), "producer.links".to_string()]);

        let Some(FieldValue::Map(producer)) = decoded.fields.get("producer") else {
            panic!("producer should decode as a map");
        };
        assert_eq!(producer.get("pv"), Some(&FieldValue::from("IOC:X")));
        assert!(!producer.contains_key("links"));
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let decoded = decode_attributes(&json!("MAJOR"), &SymbolCatalog::default());
        assert!(decoded.malformed);
        assert!(decoded.fields.is_empty());
    }

    #[test]
    fn envelope_is_unwrapped_only_when_alone() {
        let wrapped = json!({"msg": {"sevr": "MINOR"}});
        assert_eq!(unwrap_envelope(&wrapped), &json!({"sevr": "MINOR"}));

        let mixed = json!({"msg": {"sevr": "MINOR"}, "other": 1});
        assert_eq!(unwrap_envelope(&mixed), &mixed);

        let text = json!({"msg": "hello"});
        assert_eq!(unwrap_envelope(&text), &text);
    }
}
