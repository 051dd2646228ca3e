//! Fixed-shape records with heterogeneous fields.
//!
//! Fields are kept sorted by name, which fixes both their wire order and
//! their bit in the change mask. A diff is
//!
//! ```text
//! [mask: ceil(n / 8) bytes][child diff]*
//! ```
//!
//! where bit `i % 8` of byte `i / 8` marks field `i` as changed and the
//! changed fields' diffs follow in field order.

use std::collections::BTreeMap;
use std::sync::Arc;

use replisync_buffers::{Reader, Writer};
use serde_json::{json, Map, Value};

use crate::{DynSchema, FieldValue, Schema, SchemaError, SchemaKind};

/// A record value: field name to type-erased field value.
#[derive(Debug, Default)]
pub struct StructValue {
    fields: BTreeMap<String, Box<dyn FieldValue>>,
}

impl Clone for StructValue {
    fn clone(&self) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), (**v).clone_boxed()))
                .collect(),
        }
    }
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StructValue::set`].
    pub fn with<T: FieldValue>(mut self, name: impl Into<String>, value: T) -> Self {
        self.set(name, value);
        self
    }

    pub fn set<T: FieldValue>(&mut self, name: impl Into<String>, value: T) {
        self.fields.insert(name.into(), Box::new(value));
    }

    pub fn set_boxed(&mut self, name: impl Into<String>, value: Box<dyn FieldValue>) {
        self.fields.insert(name.into(), value);
    }

    /// Typed access to a field. `None` when the field is absent or holds a
    /// different type.
    pub fn get<T: FieldValue>(&self, name: &str) -> Option<&T> {
        self.field(name)?.as_any().downcast_ref()
    }

    pub fn get_mut<T: FieldValue>(&mut self, name: &str) -> Option<&mut T> {
        (**self.fields.get_mut(name)?).as_any_mut().downcast_mut()
    }

    pub fn field(&self, name: &str) -> Option<&dyn FieldValue> {
        self.fields.get(name).map(|v| &**v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn FieldValue>> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), &**v))
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    schema: Arc<dyn DynSchema>,
}

/// Schema of a [`StructValue`] with a fixed set of fields.
#[derive(Debug, Clone, Default)]
pub struct StructSchema {
    fields: Vec<Field>,
    identity: StructValue,
}

impl StructSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. A field of the same name is replaced.
    pub fn field<S: Schema + 'static>(self, name: impl Into<String>, schema: S) -> Self {
        self.field_dyn(name, Arc::new(schema))
    }

    pub fn field_dyn(mut self, name: impl Into<String>, schema: Arc<dyn DynSchema>) -> Self {
        let name = name.into();
        self.identity.set_boxed(name.clone(), schema.dyn_identity());
        let field = Field { name, schema };
        match self.fields.binary_search_by(|f| f.name.cmp(&field.name)) {
            Ok(i) => self.fields[i] = field,
            Err(i) => self.fields.insert(i, field),
        }
        self
    }

    /// Field names in wire order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn field_schema(&self, name: &str) -> Option<&Arc<dyn DynSchema>> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.schema)
    }

    fn mask_len(&self) -> usize {
        self.fields.len().div_ceil(8)
    }

    /// The value of `field` in `value`, or the field's identity when it is
    /// missing or of the wrong type.
    fn resolve<'v>(&'v self, field: &Field, value: &'v StructValue) -> &'v dyn FieldValue {
        match value.field(&field.name) {
            Some(v) if field.schema.dyn_accepts(v) => v,
            _ => self.identity.field(&field.name).unwrap_or(&()),
        }
    }

    fn write_fields(
        &self,
        base: &StructValue,
        target: &StructValue,
        head: usize,
        out: &mut Writer,
    ) -> Result<bool, SchemaError> {
        let mut changed = false;
        for (i, field) in self.fields.iter().enumerate() {
            let b = self.resolve(field, base);
            let t = self.resolve(field, target);
            if field.schema.dyn_diff(b, t, out)? {
                out.uint8[head + i / 8] |= 1 << (i % 8);
                changed = true;
            }
        }
        Ok(changed)
    }
}

impl Schema for StructSchema {
    type Value = StructValue;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Struct
    }

    fn identity(&self) -> &StructValue {
        &self.identity
    }

    fn json(&self) -> Value {
        let sub_types: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.schema.dyn_json()))
            .collect();
        json!({
            "type": "struct",
            "subTypes": sub_types,
            "identity": replisync_util::stringify(&self.to_json(&self.identity)),
        })
    }

    fn alloc(&self) -> StructValue {
        let mut value = StructValue::new();
        for field in &self.fields {
            value.set_boxed(field.name.clone(), field.schema.dyn_identity());
        }
        value
    }

    fn free(&self, mut value: StructValue) {
        for field in &self.fields {
            if let Some(v) = value.remove(&field.name) {
                field.schema.dyn_free(v);
            }
        }
    }

    fn equal(&self, a: &StructValue, b: &StructValue) -> bool {
        self.fields
            .iter()
            .all(|f| f.schema.dyn_equal(self.resolve(f, a), self.resolve(f, b)))
    }

    fn clone_value(&self, value: &StructValue) -> StructValue {
        let mut copy = StructValue::new();
        for field in &self.fields {
            copy.set_boxed(field.name.clone(), field.schema.dyn_clone(self.resolve(field, value)));
        }
        copy
    }

    fn assign(&self, dst: &mut StructValue, src: &StructValue) {
        dst.fields
            .retain(|name, _| self.fields.iter().any(|f| &f.name == name));
        for field in &self.fields {
            let from = self.resolve(field, src);
            match dst.fields.get_mut(&field.name) {
                Some(slot) => field.schema.dyn_assign(slot, from),
                None => dst.set_boxed(field.name.clone(), field.schema.dyn_clone(from)),
            }
        }
    }

    fn diff(&self, base: &StructValue, target: &StructValue, out: &mut Writer) -> Result<bool, SchemaError> {
        let head = out.x;
        let mask = self.mask_len();
        out.ensure_capacity(mask);
        out.uint8[head..head + mask].fill(0);
        out.x += mask;

        match self.write_fields(base, target, head, out) {
            Ok(true) => Ok(true),
            Ok(false) => {
                out.x = head;
                Ok(false)
            }
            Err(err) => {
                out.x = head;
                Err(err)
            }
        }
    }

    fn patch(&self, base: &StructValue, inp: &mut Reader<'_>) -> Result<StructValue, SchemaError> {
        let mask = inp.try_buf(self.mask_len())?;
        let mut result = StructValue::new();
        for (i, field) in self.fields.iter().enumerate() {
            let b = self.resolve(field, base);
            let value = if mask[i / 8] & (1 << (i % 8)) != 0 {
                field.schema.dyn_patch(b, inp)?
            } else {
                field.schema.dyn_clone(b)
            };
            result.set_boxed(field.name.clone(), value);
        }
        Ok(result)
    }

    fn to_json(&self, value: &StructValue) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.schema.dyn_to_json(self.resolve(f, value))))
            .collect();
        Value::Object(map)
    }

    fn from_json(&self, json: &Value) -> StructValue {
        let mut value = StructValue::new();
        for field in &self.fields {
            let v = match json.get(&field.name) {
                Some(j) => field.schema.dyn_from_json(j),
                None => field.schema.dyn_identity(),
            };
            value.set_boxed(field.name.clone(), v);
        }
        value
    }
}
