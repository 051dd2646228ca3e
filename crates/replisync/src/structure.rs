//! Records of independently replicated fields.
//!
//! Each field is its own RDA with its own store. An action names one field
//! and carries that field's action; fields never observe each other, so
//! the struct converges exactly when every field does.

use std::sync::Arc;

use replisync_buffers::{Reader, Writer};
use replisync_schema::{DynSchema, FieldValue, Schema, SchemaError, SchemaKind, StructSchema, StructValue};
use serde_json::{json, Map, Value};

use crate::rda::write_record;
use crate::{DynRda, DynStore, OrderToken, Rda, RdaError, Store};

/// An action addressed to one field.
#[derive(Debug)]
pub struct StructAction {
    pub field: String,
    pub action: Box<dyn FieldValue>,
}

impl Clone for StructAction {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            action: (*self.action).clone_boxed(),
        }
    }
}

impl StructAction {
    pub fn new<A: FieldValue>(field: impl Into<String>, action: A) -> Self {
        Self {
            field: field.into(),
            action: Box::new(action),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRda {
    name: String,
    rda: Arc<dyn DynRda>,
    action: Arc<dyn DynSchema>,
}

#[derive(Debug, Clone, Default)]
struct Fields {
    list: Vec<FieldRda>,
    state: StructSchema,
    action: StructActionSchema,
}

impl Fields {
    fn index(&self, name: &str) -> Option<usize> {
        self.list.binary_search_by(|f| f.name.as_str().cmp(name)).ok()
    }
}

/// Struct RDA, built field by field:
///
/// ```
/// use replisync::{ConstantRda, RegisterRda, StructRda};
/// use replisync_schema::{StringSchema, Uint16Schema};
///
/// let player = StructRda::new()
///     .field("id", ConstantRda::new(StringSchema::default()))
///     .field("hp", RegisterRda::new(Uint16Schema::new(100)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StructRda {
    fields: Arc<Fields>,
}

impl StructRda {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. A field of the same name is replaced.
    pub fn field<R: Rda>(mut self, name: impl Into<String>, rda: R) -> Self {
        let name = name.into();
        let fields = Arc::make_mut(&mut self.fields);
        let entry = FieldRda {
            name: name.clone(),
            action: rda.dyn_action_schema(),
            rda: Arc::new(rda),
        };
        fields.state = std::mem::take(&mut fields.state).field_dyn(name, entry.rda.dyn_state_schema());
        match fields.list.binary_search_by(|f| f.name.cmp(&entry.name)) {
            Ok(i) => fields.list[i] = entry,
            Err(i) => fields.list.insert(i, entry),
        }
        fields.action = StructActionSchema::new(
            fields.list.iter().map(|f| (f.name.clone(), Arc::clone(&f.action))).collect(),
        );
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.list.iter().map(|f| f.name.as_str())
    }

    /// Shorthand for [`StructAction::new`].
    pub fn action<A: FieldValue>(&self, field: impl Into<String>, action: A) -> StructAction {
        StructAction::new(field, action)
    }
}

impl Rda for StructRda {
    type StateSchema = StructSchema;
    type ActionSchema = StructActionSchema;
    type Store = StructStore;

    fn state_schema(&self) -> &StructSchema {
        &self.fields.state
    }

    fn action_schema(&self) -> &StructActionSchema {
        &self.fields.action
    }

    fn create_store(&self, state: &StructValue) -> StructStore {
        let children = self
            .fields
            .list
            .iter()
            .map(|f| f.rda.dyn_create_store(state.field(&f.name)))
            .collect();
        StructStore {
            rda: self.clone(),
            children,
        }
    }

    fn json(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .list
            .iter()
            .map(|f| (f.name.clone(), f.rda.dyn_json()))
            .collect();
        json!({"type": "struct", "fields": fields})
    }

    fn max_token(&self, action: &StructAction) -> Option<OrderToken> {
        let i = self.fields.index(&action.field)?;
        self.fields.list[i].rda.dyn_max_token(&*action.action)
    }
}

#[derive(Debug)]
pub struct StructStore {
    rda: StructRda,
    /// One store per field, in field order.
    children: Vec<Box<dyn DynStore>>,
}

impl Store for StructStore {
    type State = StructValue;
    type Action = StructAction;

    fn state(&self) -> StructValue {
        let mut value = StructValue::new();
        for (field, child) in self.rda.fields.list.iter().zip(&self.children) {
            value.set_boxed(field.name.clone(), child.dyn_state());
        }
        value
    }

    fn dispatch(&mut self, action: &StructAction) -> Result<bool, RdaError> {
        let i = self
            .rda
            .fields
            .index(&action.field)
            .ok_or_else(|| RdaError::UnknownField(action.field.clone()))?;
        self.children[i].dyn_dispatch(&*action.action)
    }
}

// ── Action codec ───────────────────────────────────────────────────────────

/// Wire form of a [`StructAction`]:
/// `[field index: u32][flag: u8][child action diff against its identity]`.
///
/// The identity action names no field and carries `()`.
#[derive(Debug, Clone)]
pub struct StructActionSchema {
    fields: Vec<(String, Arc<dyn DynSchema>)>,
    identity: StructAction,
}

impl Default for StructActionSchema {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl StructActionSchema {
    fn new(fields: Vec<(String, Arc<dyn DynSchema>)>) -> Self {
        Self {
            fields,
            identity: StructAction::new(String::new(), ()),
        }
    }

    fn lookup(&self, name: &str) -> Option<(usize, &Arc<dyn DynSchema>)> {
        let i = self.fields.binary_search_by(|(n, _)| n.as_str().cmp(name)).ok()?;
        Some((i, &self.fields[i].1))
    }
}

impl Schema for StructActionSchema {
    type Value = StructAction;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Action
    }

    fn identity(&self) -> &StructAction {
        &self.identity
    }

    fn json(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, schema)| (name.clone(), schema.dyn_json()))
            .collect();
        json!({"type": "action", "rda": "struct", "fields": fields})
    }

    fn equal(&self, a: &StructAction, b: &StructAction) -> bool {
        if a.field != b.field {
            return false;
        }
        match self.lookup(&a.field) {
            Some((_, schema)) => schema.dyn_equal(&*a.action, &*b.action),
            None => (*a.action).as_any().is::<()>() && (*b.action).as_any().is::<()>(),
        }
    }

    fn clone_value(&self, action: &StructAction) -> StructAction {
        match self.lookup(&action.field) {
            Some((_, schema)) => StructAction {
                field: action.field.clone(),
                action: schema.dyn_clone(&*action.action),
            },
            None => action.clone(),
        }
    }

    fn diff(&self, base: &StructAction, target: &StructAction, out: &mut Writer) -> Result<bool, SchemaError> {
        if self.equal(base, target) {
            return Ok(false);
        }
        let (index, schema) = self
            .lookup(&target.field)
            .ok_or_else(|| SchemaError::UnknownFieldName(target.field.clone()))?;
        write_record(out, |out| {
            out.u32(index as u32);
            let flag = out.x;
            out.u8(0);
            let identity = schema.dyn_identity();
            if schema.dyn_diff(&*identity, &*target.action, out)? {
                out.uint8[flag] = 1;
            }
            Ok(())
        })
    }

    fn patch(&self, _base: &StructAction, inp: &mut Reader<'_>) -> Result<StructAction, SchemaError> {
        let index = inp.try_u32()?;
        let (name, schema) = self
            .fields
            .get(index as usize)
            .ok_or(SchemaError::UnknownField(index))?;
        let identity = schema.dyn_identity();
        let action = if inp.try_u8()? != 0 {
            schema.dyn_patch(&*identity, inp)?
        } else {
            identity
        };
        Ok(StructAction {
            field: name.clone(),
            action,
        })
    }

    fn to_json(&self, action: &StructAction) -> Value {
        let payload = match self.lookup(&action.field) {
            Some((_, schema)) => schema.dyn_to_json(&*action.action),
            None => Value::Null,
        };
        json!({"field": action.field, "action": payload})
    }

    fn from_json(&self, json: &Value) -> StructAction {
        let field = json.get("field").and_then(Value::as_str).unwrap_or_default();
        match self.lookup(field) {
            Some((_, schema)) => StructAction {
                field: field.to_owned(),
                action: match json.get("action") {
                    Some(payload) => schema.dyn_from_json(payload),
                    None => schema.dyn_identity(),
                },
            },
            None => self.identity.clone(),
        }
    }
}
