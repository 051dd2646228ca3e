//! Fixed-width scalar schemas: booleans and numbers.
//!
//! A scalar diff is a single equality test; when the values differ the raw
//! target is written at its fixed width (big-endian). Patching ignores the
//! base and reads the value back.

use std::fmt::Debug;

use replisync_buffers::{BufferError, Reader, Writer};
use serde_json::{json, Value};

use crate::{Schema, SchemaError, SchemaKind};

/// A fixed-width value a [`PrimitiveSchema`] can carry.
pub trait Primitive: Copy + Debug + Default + 'static {
    const KIND: SchemaKind;

    /// Bit-level equality. Floats compare by bit pattern so that `NaN`
    /// round-trips as equal and `-0.0` is shipped rather than merged into
    /// `0.0`.
    fn same(self, other: Self) -> bool;
    fn write(self, out: &mut Writer);
    fn read(inp: &mut Reader<'_>) -> Result<Self, BufferError>;
    fn to_json(self) -> Value;
    fn from_json(json: &Value) -> Option<Self>;
}

impl Primitive for bool {
    const KIND: SchemaKind = SchemaKind::Boolean;

    fn same(self, other: Self) -> bool {
        self == other
    }

    fn write(self, out: &mut Writer) {
        out.u8(self as u8);
    }

    fn read(inp: &mut Reader<'_>) -> Result<Self, BufferError> {
        Ok(inp.try_u8()? != 0)
    }

    fn to_json(self) -> Value {
        Value::Bool(self)
    }

    fn from_json(json: &Value) -> Option<Self> {
        json.as_bool()
    }
}

macro_rules! float_primitive {
    ($ty:ty, $kind:ident, $write:ident, $read:ident) => {
        impl Primitive for $ty {
            const KIND: SchemaKind = SchemaKind::$kind;

            fn same(self, other: Self) -> bool {
                self.to_bits() == other.to_bits()
            }

            fn write(self, out: &mut Writer) {
                out.$write(self);
            }

            fn read(inp: &mut Reader<'_>) -> Result<Self, BufferError> {
                inp.$read()
            }

            fn to_json(self) -> Value {
                json!(self)
            }

            fn from_json(json: &Value) -> Option<Self> {
                json.as_f64().map(|n| n as $ty)
            }
        }
    };
}

macro_rules! int_primitive {
    ($ty:ty, $kind:ident, $write:ident, $read:ident) => {
        impl Primitive for $ty {
            const KIND: SchemaKind = SchemaKind::$kind;

            fn same(self, other: Self) -> bool {
                self == other
            }

            fn write(self, out: &mut Writer) {
                out.$write(self);
            }

            fn read(inp: &mut Reader<'_>) -> Result<Self, BufferError> {
                inp.$read()
            }

            fn to_json(self) -> Value {
                json!(self)
            }

            fn from_json(json: &Value) -> Option<Self> {
                json.as_i64().and_then(|n| <$ty>::try_from(n).ok())
            }
        }
    };
}

float_primitive!(f32, Float32, f32, try_f32);
float_primitive!(f64, Float64, f64, try_f64);
int_primitive!(i8, Int8, i8, try_i8);
int_primitive!(i16, Int16, i16, try_i16);
int_primitive!(i32, Int32, i32, try_i32);
int_primitive!(u8, Uint8, u8, try_u8);
int_primitive!(u16, Uint16, u16, try_u16);
int_primitive!(u32, Uint32, u32, try_u32);

/// Schema for a fixed-width scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSchema<T: Primitive> {
    identity: T,
}

impl<T: Primitive> PrimitiveSchema<T> {
    pub fn new(identity: T) -> Self {
        Self { identity }
    }
}

impl<T: Primitive> Default for PrimitiveSchema<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Primitive> Schema for PrimitiveSchema<T> {
    type Value = T;

    fn kind(&self) -> SchemaKind {
        T::KIND
    }

    fn identity(&self) -> &T {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({
            "type": T::KIND.as_str(),
            "identity": self.identity.to_json(),
        })
    }

    fn equal(&self, a: &T, b: &T) -> bool {
        a.same(*b)
    }

    fn assign(&self, dst: &mut T, src: &T) {
        *dst = *src;
    }

    fn diff(&self, base: &T, target: &T, out: &mut Writer) -> Result<bool, SchemaError> {
        if base.same(*target) {
            return Ok(false);
        }
        target.write(out);
        Ok(true)
    }

    fn patch(&self, _base: &T, inp: &mut Reader<'_>) -> Result<T, SchemaError> {
        Ok(T::read(inp)?)
    }

    fn to_json(&self, value: &T) -> Value {
        value.to_json()
    }

    fn from_json(&self, json: &Value) -> T {
        T::from_json(json).unwrap_or(self.identity)
    }
}

pub type BooleanSchema = PrimitiveSchema<bool>;
pub type Float32Schema = PrimitiveSchema<f32>;
pub type Float64Schema = PrimitiveSchema<f64>;
pub type Int8Schema = PrimitiveSchema<i8>;
pub type Int16Schema = PrimitiveSchema<i16>;
pub type Int32Schema = PrimitiveSchema<i32>;
pub type Uint8Schema = PrimitiveSchema<u8>;
pub type Uint16Schema = PrimitiveSchema<u16>;
pub type Uint32Schema = PrimitiveSchema<u32>;
