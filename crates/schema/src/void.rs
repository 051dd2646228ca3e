use replisync_buffers::{Reader, Writer};
use serde_json::{json, Value};

use crate::{Schema, SchemaError, SchemaKind};

/// The unit schema. Nothing to diff, nothing on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoidSchema;

impl Schema for VoidSchema {
    type Value = ();

    fn kind(&self) -> SchemaKind {
        SchemaKind::Void
    }

    fn identity(&self) -> &() {
        &()
    }

    fn json(&self) -> Value {
        json!({"type": "void", "identity": null})
    }

    fn equal(&self, _a: &(), _b: &()) -> bool {
        true
    }

    fn diff(&self, _base: &(), _target: &(), _out: &mut Writer) -> Result<bool, SchemaError> {
        Ok(false)
    }

    fn patch(&self, _base: &(), _inp: &mut Reader<'_>) -> Result<(), SchemaError> {
        Ok(())
    }

    fn to_json(&self, _value: &()) -> Value {
        Value::Null
    }

    fn from_json(&self, _json: &Value) {}
}
