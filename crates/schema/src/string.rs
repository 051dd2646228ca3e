//! Length-prefixed string schemas.
//!
//! Both schemas ship the whole target when it differs from the base. A
//! payload that fails to decode is not an error: the cursor has already
//! moved past it, so the value degrades to `""` and decoding continues.

use replisync_buffers::{BufferError, Reader, Writer};
use serde_json::{json, Value};

use crate::{Schema, SchemaError, SchemaKind};

fn lenient(decoded: Result<String, BufferError>, kind: SchemaKind) -> Result<String, SchemaError> {
    match decoded {
        Ok(s) => Ok(s),
        Err(BufferError::EndOfBuffer) => Err(BufferError::EndOfBuffer.into()),
        Err(err) => {
            log::warn!("{} payload dropped: {}", kind.as_str(), err);
            Ok(String::new())
        }
    }
}

/// 7-bit strings at one byte per character. Characters outside the range
/// are sent as `?`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsciiSchema {
    identity: String,
}

impl AsciiSchema {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl Schema for AsciiSchema {
    type Value = String;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Ascii
    }

    fn identity(&self) -> &String {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({"type": "ascii", "identity": self.identity})
    }

    fn equal(&self, a: &String, b: &String) -> bool {
        a == b
    }

    fn diff(&self, base: &String, target: &String, out: &mut Writer) -> Result<bool, SchemaError> {
        if base == target {
            return Ok(false);
        }
        out.str_ascii(target);
        Ok(true)
    }

    fn patch(&self, _base: &String, inp: &mut Reader<'_>) -> Result<String, SchemaError> {
        lenient(inp.try_str_ascii(), SchemaKind::Ascii)
    }

    fn to_json(&self, value: &String) -> Value {
        Value::String(value.clone())
    }

    fn from_json(&self, json: &Value) -> String {
        match json.as_str() {
            Some(s) => s.to_owned(),
            None => self.identity.clone(),
        }
    }
}

/// Unicode strings as UTF-16 code units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringSchema {
    identity: String,
}

impl StringSchema {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl Schema for StringSchema {
    type Value = String;

    fn kind(&self) -> SchemaKind {
        SchemaKind::String
    }

    fn identity(&self) -> &String {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({"type": "string", "identity": self.identity})
    }

    fn equal(&self, a: &String, b: &String) -> bool {
        a == b
    }

    fn diff(&self, base: &String, target: &String, out: &mut Writer) -> Result<bool, SchemaError> {
        if base == target {
            return Ok(false);
        }
        out.str_utf16(target);
        Ok(true)
    }

    fn patch(&self, _base: &String, inp: &mut Reader<'_>) -> Result<String, SchemaError> {
        lenient(inp.try_str_utf16(), SchemaKind::String)
    }

    fn to_json(&self, value: &String) -> Value {
        Value::String(value.clone())
    }

    fn from_json(&self, json: &Value) -> String {
        match json.as_str() {
            Some(s) => s.to_owned(),
            None => self.identity.clone(),
        }
    }
}
