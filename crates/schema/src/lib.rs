//! `replisync-schema`: typed value descriptors with binary diff/patch.
//!
//! A [`Schema`] describes one value type: its identity (default) value,
//! how to copy and compare values, and how to encode the difference
//! between two values so another replica holding the base can rebuild the
//! target.
//!
//! ```
//! use replisync_buffers::{Reader, Writer};
//! use replisync_schema::{DictionarySchema, Schema, Uint32Schema};
//!
//! let schema = DictionarySchema::new(Uint32Schema::default(), 10);
//! let base = [("a".to_owned(), 1)].into_iter().collect();
//! let target = [("a".to_owned(), 1), ("b".to_owned(), 2)].into_iter().collect();
//!
//! let mut out = Writer::new();
//! assert!(schema.diff(&base, &target, &mut out).unwrap());
//! let bytes = out.flush();
//!
//! let patched = schema.patch(&base, &mut Reader::new(&bytes)).unwrap();
//! assert!(schema.equal(&patched, &target));
//! ```

mod dictionary;
mod dynamic;
mod error;
mod object;
mod primitive;
mod schema;
mod string;
mod structure;
mod void;

pub use dictionary::{Dictionary, DictionarySchema};
pub use dynamic::{DynSchema, FieldValue};
pub use error::SchemaError;
pub use object::ObjectSchema;
pub use primitive::{
    BooleanSchema, Float32Schema, Float64Schema, Int16Schema, Int32Schema, Int8Schema, Primitive,
    PrimitiveSchema, Uint16Schema, Uint32Schema, Uint8Schema,
};
pub use schema::{Schema, SchemaKind};
pub use string::{AsciiSchema, StringSchema};
pub use structure::{StructSchema, StructValue};
pub use void::VoidSchema;
