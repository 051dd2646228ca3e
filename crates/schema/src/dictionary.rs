//! String-keyed dictionaries.
//!
//! Wire format of a diff:
//!
//! ```text
//! [removed: u32][patched: u32]
//! removed × [key: utf16 string]
//! patched × [key: utf16 string][child diff]
//! ```
//!
//! A key that is new to the base and whose value equals the value schema's
//! identity is sent with [`LENGTH_FLAG`] set on its length prefix and no
//! child bytes.

use std::collections::{BTreeMap, BTreeSet};

use replisync_buffers::{Reader, Writer, LENGTH_FLAG};
use serde_json::{json, Map, Value};

use crate::{Schema, SchemaError, SchemaKind};

pub type Dictionary<V> = BTreeMap<String, V>;

#[derive(Debug, Clone)]
pub struct DictionarySchema<S: Schema> {
    value: S,
    capacity: usize,
    identity: Dictionary<S::Value>,
}

impl<S: Schema> DictionarySchema<S> {
    /// A dictionary whose diff targets may hold at most `capacity` keys.
    pub fn new(value: S, capacity: usize) -> Self {
        Self::with_identity(value, capacity, BTreeMap::new())
    }

    pub fn with_identity(value: S, capacity: usize, identity: Dictionary<S::Value>) -> Self {
        Self {
            value,
            capacity,
            identity,
        }
    }

    pub fn value_schema(&self) -> &S {
        &self.value
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes removal and patch records, returning their counts.
    fn write_entries(
        &self,
        base: &Dictionary<S::Value>,
        target: &Dictionary<S::Value>,
        out: &mut Writer,
    ) -> Result<(u32, u32), SchemaError> {
        let mut removed = 0u32;
        for key in base.keys().filter(|k| !target.contains_key(*k)) {
            out.str_utf16(key);
            removed += 1;
        }

        let mut patched = 0u32;
        let identity = self.value.identity();
        for (key, value) in target {
            let prefix = out.str_utf16(key);
            match base.get(key) {
                Some(prev) => {
                    if self.value.diff(prev, value, out)? {
                        patched += 1;
                    } else {
                        out.x = prefix;
                    }
                }
                None => {
                    if !self.value.diff(identity, value, out)? {
                        let units = key.encode_utf16().count() as u32;
                        out.u32_at(prefix, units | LENGTH_FLAG);
                    }
                    patched += 1;
                }
            }
        }
        Ok((removed, patched))
    }
}

impl<S: Schema> Schema for DictionarySchema<S> {
    type Value = Dictionary<S::Value>;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Dictionary
    }

    fn identity(&self) -> &Self::Value {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({
            "type": "dictionary",
            "valueType": self.value.json(),
            "capacity": self.capacity,
            "identity": replisync_util::stringify(&self.to_json(&self.identity)),
        })
    }

    fn alloc(&self) -> Self::Value {
        BTreeMap::new()
    }

    fn free(&self, dict: Self::Value) {
        for (_, value) in dict {
            self.value.free(value);
        }
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|((ka, va), (kb, vb))| ka == kb && self.value.equal(va, vb))
    }

    fn clone_value(&self, dict: &Self::Value) -> Self::Value {
        dict.iter()
            .map(|(k, v)| (k.clone(), self.value.clone_value(v)))
            .collect()
    }

    fn assign(&self, dst: &mut Self::Value, src: &Self::Value) {
        let stale: Vec<String> = dst.keys().filter(|k| !src.contains_key(*k)).cloned().collect();
        for key in stale {
            if let Some(value) = dst.remove(&key) {
                self.value.free(value);
            }
        }

        if self.value.kind().is_primitive() {
            for (key, value) in src {
                dst.insert(key.clone(), value.clone());
            }
            return;
        }

        for (key, value) in src {
            match dst.get_mut(key) {
                Some(slot) => self.value.assign(slot, value),
                None => {
                    dst.insert(key.clone(), self.value.clone_value(value));
                }
            }
        }
    }

    fn diff(&self, base: &Self::Value, target: &Self::Value, out: &mut Writer) -> Result<bool, SchemaError> {
        if target.len() > self.capacity {
            return Err(SchemaError::CapacityExceeded {
                capacity: self.capacity,
                len: target.len(),
            });
        }

        let head = out.x;
        out.u32(0);
        out.u32(0);
        match self.write_entries(base, target, out) {
            Ok((0, 0)) => {
                out.x = head;
                Ok(false)
            }
            Ok((removed, patched)) => {
                out.u32_at(head, removed);
                out.u32_at(head + 4, patched);
                Ok(true)
            }
            Err(err) => {
                out.x = head;
                Err(err)
            }
        }
    }

    fn patch(&self, base: &Self::Value, inp: &mut Reader<'_>) -> Result<Self::Value, SchemaError> {
        let removed = inp.try_u32()?;
        let patched = inp.try_u32()?;

        let mut gone = BTreeSet::new();
        for _ in 0..removed {
            gone.insert(inp.try_str_utf16()?);
        }

        let mut result: Self::Value = base
            .iter()
            .filter(|(k, _)| !gone.contains(*k))
            .map(|(k, v)| (k.clone(), self.value.clone_value(v)))
            .collect();

        for _ in 0..patched {
            let (units, flagged) = inp.try_length()?;
            let key = inp.try_utf16(units)?;
            let value = match base.get(&key) {
                Some(prev) => self.value.patch(prev, inp)?,
                None if flagged => self.value.alloc(),
                None => self.value.patch(self.value.identity(), inp)?,
            };
            if let Some(old) = result.insert(key, value) {
                self.value.free(old);
            }
        }

        Ok(result)
    }

    fn to_json(&self, dict: &Self::Value) -> Value {
        let map: Map<String, Value> = dict
            .iter()
            .map(|(k, v)| (k.clone(), self.value.to_json(v)))
            .collect();
        Value::Object(map)
    }

    fn from_json(&self, json: &Value) -> Self::Value {
        match json.as_object() {
            Some(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), self.value.from_json(v)))
                .collect(),
            None => self.clone_value(&self.identity),
        }
    }
}
