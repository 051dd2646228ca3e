//! The [`Schema`] capability set.

use std::fmt::Debug;

use replisync_buffers::{Reader, Writer};
use serde_json::Value;

use crate::SchemaError;

/// Type tag of a schema, as it appears in the `type` field of its
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Void,
    Boolean,
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Ascii,
    String,
    Object,
    Dictionary,
    Struct,
    /// Codecs for RDA actions and order tokens.
    Action,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Boolean => "boolean",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Ascii => "ascii",
            Self::String => "string",
            Self::Object => "object",
            Self::Dictionary => "dictionary",
            Self::Struct => "struct",
            Self::Action => "action",
        }
    }

    /// Primitive values own no nested storage: copying one is a plain
    /// overwrite, with no per-field delegation.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::Void
                | Self::Boolean
                | Self::Float32
                | Self::Float64
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Ascii
                | Self::String
        )
    }
}

/// Descriptor for one value type: identity, lifecycle, comparison, copying,
/// binary diff/patch and JSON conversion.
///
/// The central law every implementation upholds:
///
/// ```text
/// diff(base, target, out) == Ok(true)  =>  patch(base, bytes) == target
/// diff(base, target, out) == Ok(false) =>  equal(base, target), nothing written
/// ```
pub trait Schema: Debug {
    type Value: Clone + Debug + 'static;

    fn kind(&self) -> SchemaKind;

    /// Canonical default value. Never mutated.
    fn identity(&self) -> &Self::Value;

    /// JSON descriptor `{type, ...metadata, identity}` used for out-of-band
    /// compatibility checks between replicas.
    fn json(&self) -> Value;

    /// Fresh storage equal to the identity.
    fn alloc(&self) -> Self::Value {
        self.clone_value(self.identity())
    }

    /// Releases a value. Values are not pooled, so the default just drops.
    fn free(&self, value: Self::Value) {
        drop(value);
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool;

    /// Deep copy with an independent lifetime.
    fn clone_value(&self, value: &Self::Value) -> Self::Value {
        value.clone()
    }

    /// Deep-copies `src` into the already-owned `dst`, reusing its storage
    /// where the representation allows. Cheaper than `clone_value` plus a
    /// replace for container types.
    fn assign(&self, dst: &mut Self::Value, src: &Self::Value) {
        dst.clone_from(src);
    }

    /// Encodes the delta turning `base` into `target`.
    ///
    /// Returns `Ok(false)` and leaves `out` untouched when the two are equal.
    fn diff(&self, base: &Self::Value, target: &Self::Value, out: &mut Writer)
        -> Result<bool, SchemaError>;

    /// Decodes a delta written by [`Schema::diff`] against `base`.
    fn patch(&self, base: &Self::Value, inp: &mut Reader<'_>) -> Result<Self::Value, SchemaError>;

    fn to_json(&self, value: &Self::Value) -> Value;

    /// Parses a JSON rendition. Input that does not fit the schema falls back
    /// to the identity.
    fn from_json(&self, json: &Value) -> Self::Value;
}
