use replisync_buffers::{BufferError, Reader, Writer};
use replisync_util::{deep_equal, stringify};
use serde_json::{json, Value};

use crate::{Schema, SchemaError, SchemaKind};

/// Arbitrary JSON, treated as an opaque blob.
///
/// A changed value is shipped whole as stable-stringified JSON (sorted keys)
/// in a UTF-16 string, so identical values always produce the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    identity: Value,
}

impl ObjectSchema {
    pub fn new(identity: Value) -> Self {
        Self { identity }
    }
}

impl Default for ObjectSchema {
    fn default() -> Self {
        Self::new(json!({}))
    }
}

impl Schema for ObjectSchema {
    type Value = Value;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Object
    }

    fn identity(&self) -> &Value {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({"type": "object", "identity": stringify(&self.identity)})
    }

    /// Numbers compare by value, so `1` equals `1.0`.
    fn equal(&self, a: &Value, b: &Value) -> bool {
        deep_equal(a, b)
    }

    /// Writes nothing only when both sides have the same stable text, so a
    /// value that is equal but spelled differently (`1` against `1.0`) still
    /// reaches the other replica verbatim.
    fn diff(&self, base: &Value, target: &Value, out: &mut Writer) -> Result<bool, SchemaError> {
        let text = stringify(target);
        if deep_equal(base, target) && stringify(base) == text {
            return Ok(false);
        }
        out.str_utf16(&text);
        Ok(true)
    }

    fn patch(&self, _base: &Value, inp: &mut Reader<'_>) -> Result<Value, SchemaError> {
        let text = match inp.try_str_utf16() {
            Ok(text) => text,
            Err(BufferError::EndOfBuffer) => return Err(BufferError::EndOfBuffer.into()),
            Err(err) => {
                log::warn!("object payload dropped: {}", err);
                return Ok(Value::Null);
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(err) => {
                log::warn!("object payload is not JSON: {}", err);
                Ok(Value::Null)
            }
        }
    }

    fn to_json(&self, value: &Value) -> Value {
        value.clone()
    }

    fn from_json(&self, json: &Value) -> Value {
        json.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_value_round_trip() {
        let s = ObjectSchema::default();
        let target = json!({"pos": [1, 2.5], "name": "x", "nested": {"ok": true}});
        let mut out = Writer::new();
        assert!(s.diff(s.identity(), &target, &mut out).unwrap());
        let bytes = out.flush();
        assert_eq!(s.patch(s.identity(), &mut Reader::new(&bytes)).unwrap(), target);
    }

    #[test]
    fn reordered_keys_write_nothing() {
        let s = ObjectSchema::default();
        let mut out = Writer::new();
        let a = json!({"a": 1, "b": [1, 2]});
        let b = json!({"b": [1, 2], "a": 1});
        assert!(!s.diff(&a, &b, &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn respelled_numbers_are_sent() {
        let s = ObjectSchema::default();
        let base = json!({"a": 1});
        let target = json!({"a": 1.0});
        assert!(s.equal(&base, &target));
        let mut out = Writer::new();
        assert!(s.diff(&base, &target, &mut out).unwrap());
        let bytes = out.flush();
        let patched = s.patch(&base, &mut Reader::new(&bytes)).unwrap();
        assert_eq!(stringify(&patched), stringify(&target));
    }

    #[test]
    fn key_order_does_not_change_bytes() {
        let s = ObjectSchema::default();
        let mut first = Writer::new();
        let mut second = Writer::new();
        s.diff(&Value::Null, &json!({"x": 1, "y": 2}), &mut first).unwrap();
        s.diff(&Value::Null, &json!({"y": 2, "x": 1}), &mut second).unwrap();
        assert_eq!(first.flush(), second.flush());
    }

    #[test]
    fn garbage_payload_degrades_to_null() {
        let mut out = Writer::new();
        out.str_utf16("{not json");
        let bytes = out.flush();
        let s = ObjectSchema::default();
        assert_eq!(s.patch(&json!({"a": 1}), &mut Reader::new(&bytes)).unwrap(), Value::Null);
    }

    #[test]
    fn descriptor_carries_stable_identity() {
        let s = ObjectSchema::new(json!({"b": 1, "a": 2}));
        assert_eq!(s.json(), json!({"type": "object", "identity": r#"{"a":2,"b":1}"#}));
    }
}
