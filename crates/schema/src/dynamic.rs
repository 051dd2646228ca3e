//! Type-erased schemas and values.
//!
//! Composite schemas with heterogeneous children (struct fields) cannot name
//! their children's value types, so they hold each child as a
//! `Box<dyn DynSchema>` and each child value as a `Box<dyn FieldValue>`.
//! Every [`Schema`] is a [`DynSchema`] through the blanket impl below.

use std::any::Any;
use std::fmt::Debug;

use replisync_buffers::{Reader, Writer};
use serde_json::Value;

use crate::{Schema, SchemaError, SchemaKind};

/// A value stored behind a type-erased slot.
pub trait FieldValue: Any + Debug + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_boxed(&self) -> Box<dyn FieldValue>;
}

impl<T: Any + Debug + Clone> FieldValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn FieldValue> {
        Box::new(self.clone())
    }
}

impl dyn FieldValue {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// Object-safe mirror of [`Schema`] operating on [`FieldValue`]s.
pub trait DynSchema: Debug {
    fn dyn_kind(&self) -> SchemaKind;
    fn dyn_json(&self) -> Value;
    fn dyn_identity(&self) -> Box<dyn FieldValue>;
    /// Whether `value` has the type this schema works on.
    fn dyn_accepts(&self, value: &dyn FieldValue) -> bool;
    fn dyn_free(&self, value: Box<dyn FieldValue>);
    fn dyn_equal(&self, a: &dyn FieldValue, b: &dyn FieldValue) -> bool;
    fn dyn_clone(&self, value: &dyn FieldValue) -> Box<dyn FieldValue>;
    /// Copies `src` into `dst`; a `dst` of the wrong type is replaced.
    fn dyn_assign(&self, dst: &mut Box<dyn FieldValue>, src: &dyn FieldValue);
    fn dyn_diff(
        &self,
        base: &dyn FieldValue,
        target: &dyn FieldValue,
        out: &mut Writer,
    ) -> Result<bool, SchemaError>;
    fn dyn_patch(
        &self,
        base: &dyn FieldValue,
        inp: &mut Reader<'_>,
    ) -> Result<Box<dyn FieldValue>, SchemaError>;
    fn dyn_to_json(&self, value: &dyn FieldValue) -> Value;
    fn dyn_from_json(&self, json: &Value) -> Box<dyn FieldValue>;
}

fn downcast<'v, S: Schema>(schema: &S, value: &'v dyn FieldValue) -> Result<&'v S::Value, SchemaError> {
    value
        .as_any()
        .downcast_ref::<S::Value>()
        .ok_or(SchemaError::TypeMismatch(schema.kind().as_str()))
}

impl<S: Schema> DynSchema for S {
    fn dyn_kind(&self) -> SchemaKind {
        self.kind()
    }

    fn dyn_json(&self) -> Value {
        self.json()
    }

    fn dyn_identity(&self) -> Box<dyn FieldValue> {
        Box::new(self.alloc())
    }

    fn dyn_accepts(&self, value: &dyn FieldValue) -> bool {
        value.as_any().is::<S::Value>()
    }

    fn dyn_free(&self, value: Box<dyn FieldValue>) {
        if let Ok(value) = value.into_any().downcast::<S::Value>() {
            self.free(*value);
        }
    }

    fn dyn_equal(&self, a: &dyn FieldValue, b: &dyn FieldValue) -> bool {
        match (downcast(self, a), downcast(self, b)) {
            (Ok(a), Ok(b)) => self.equal(a, b),
            _ => false,
        }
    }

    fn dyn_clone(&self, value: &dyn FieldValue) -> Box<dyn FieldValue> {
        match downcast(self, value) {
            Ok(value) => Box::new(self.clone_value(value)),
            Err(_) => value.clone_boxed(),
        }
    }

    fn dyn_assign(&self, dst: &mut Box<dyn FieldValue>, src: &dyn FieldValue) {
        let Ok(src) = downcast(self, src) else {
            *dst = src.clone_boxed();
            return;
        };
        if let Some(slot) = dst.as_any_mut().downcast_mut::<S::Value>() {
            self.assign(slot, src);
            return;
        }
        *dst = Box::new(self.clone_value(src));
    }

    fn dyn_diff(
        &self,
        base: &dyn FieldValue,
        target: &dyn FieldValue,
        out: &mut Writer,
    ) -> Result<bool, SchemaError> {
        self.diff(downcast(self, base)?, downcast(self, target)?, out)
    }

    fn dyn_patch(
        &self,
        base: &dyn FieldValue,
        inp: &mut Reader<'_>,
    ) -> Result<Box<dyn FieldValue>, SchemaError> {
        let patched = self.patch(downcast(self, base)?, inp)?;
        Ok(Box::new(patched))
    }

    fn dyn_to_json(&self, value: &dyn FieldValue) -> Value {
        match downcast(self, value) {
            Ok(value) => self.to_json(value),
            Err(_) => Value::Null,
        }
    }

    fn dyn_from_json(&self, json: &Value) -> Box<dyn FieldValue> {
        Box::new(self.from_json(json))
    }
}
