//! Last-writer-wins register.
//!
//! Every write carries an [`OrderToken`]; a store keeps the token of the
//! write it currently shows and only accepts writes with a strictly greater
//! token. Re-delivered or dominated writes are dropped, so the outcome
//! depends only on the set of writes observed.

use std::sync::Arc;

use replisync_buffers::{Reader, Writer};
use replisync_schema::{Schema, SchemaError, SchemaKind};
use serde_json::{json, Value};

use crate::rda::{decode_payload, encode_payload, write_record};
use crate::{OrderToken, Rda, RdaError, ReplicaClock, Store};

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterAction<V> {
    pub value: V,
    pub token: OrderToken,
}

#[derive(Debug)]
pub struct RegisterRda<S: Schema> {
    schema: Arc<S>,
    action: RegisterActionSchema<S>,
}

impl<S: Schema> Clone for RegisterRda<S> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            action: self.action.clone(),
        }
    }
}

impl<S: Schema> RegisterRda<S> {
    pub fn new(schema: S) -> Self {
        let schema = Arc::new(schema);
        Self {
            action: RegisterActionSchema::new(Arc::clone(&schema)),
            schema,
        }
    }

    /// A write of `value`, stamped with the next tick of `clock`.
    pub fn set(&self, clock: &mut ReplicaClock, value: S::Value) -> RegisterAction<S::Value> {
        RegisterAction {
            value,
            token: clock.tick(),
        }
    }
}

impl<S: Schema + Clone + 'static> Rda for RegisterRda<S> {
    type StateSchema = S;
    type ActionSchema = RegisterActionSchema<S>;
    type Store = RegisterStore<S>;

    fn state_schema(&self) -> &S {
        &self.schema
    }

    fn action_schema(&self) -> &RegisterActionSchema<S> {
        &self.action
    }

    fn create_store(&self, state: &S::Value) -> RegisterStore<S> {
        RegisterStore {
            schema: Arc::clone(&self.schema),
            value: self.schema.clone_value(state),
            token: None,
        }
    }

    fn json(&self) -> Value {
        json!({"type": "register", "stateType": self.schema.json()})
    }

    fn max_token(&self, action: &RegisterAction<S::Value>) -> Option<OrderToken> {
        Some(action.token.clone())
    }
}

#[derive(Debug)]
pub struct RegisterStore<S: Schema> {
    schema: Arc<S>,
    value: S::Value,
    token: Option<OrderToken>,
}

impl<S: Schema> RegisterStore<S> {
    /// Token of the write currently shown; `None` until the first write.
    pub fn token(&self) -> Option<&OrderToken> {
        self.token.as_ref()
    }
}

impl<S: Schema> Store for RegisterStore<S> {
    type State = S::Value;
    type Action = RegisterAction<S::Value>;

    fn state(&self) -> S::Value {
        self.schema.clone_value(&self.value)
    }

    fn dispatch(&mut self, action: &RegisterAction<S::Value>) -> Result<bool, RdaError> {
        if let Some(current) = &self.token {
            if action.token <= *current {
                log::trace!("register: dropped write {} (showing {})", action.token, current);
                return Ok(false);
            }
        }
        let changed = !self.schema.equal(&self.value, &action.value);
        self.schema.assign(&mut self.value, &action.value);
        self.token = Some(action.token.clone());
        Ok(changed)
    }
}

// ── Action codec ───────────────────────────────────────────────────────────

/// Wire form of a [`RegisterAction`]:
/// `[token][flag: u8][value diff against the value identity]`.
#[derive(Debug)]
pub struct RegisterActionSchema<S: Schema> {
    value: Arc<S>,
    identity: RegisterAction<S::Value>,
}

impl<S: Schema> Clone for RegisterActionSchema<S> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            identity: self.identity.clone(),
        }
    }
}

impl<S: Schema> RegisterActionSchema<S> {
    fn new(value: Arc<S>) -> Self {
        let identity = RegisterAction {
            value: value.alloc(),
            token: OrderToken::default(),
        };
        Self { value, identity }
    }
}

impl<S: Schema> Schema for RegisterActionSchema<S> {
    type Value = RegisterAction<S::Value>;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Action
    }

    fn identity(&self) -> &Self::Value {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({"type": "action", "rda": "register", "valueType": self.value.json()})
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.token == b.token && self.value.equal(&a.value, &b.value)
    }

    fn clone_value(&self, action: &Self::Value) -> Self::Value {
        RegisterAction {
            value: self.value.clone_value(&action.value),
            token: action.token.clone(),
        }
    }

    fn diff(&self, base: &Self::Value, target: &Self::Value, out: &mut Writer) -> Result<bool, SchemaError> {
        if self.equal(base, target) {
            return Ok(false);
        }
        write_record(out, |out| {
            target.token.encode(out);
            encode_payload(&*self.value, &target.value, out)
        })
    }

    fn patch(&self, _base: &Self::Value, inp: &mut Reader<'_>) -> Result<Self::Value, SchemaError> {
        let token = OrderToken::decode(inp)?;
        let value = decode_payload(&*self.value, inp)?;
        Ok(RegisterAction { value, token })
    }

    fn to_json(&self, action: &Self::Value) -> Value {
        json!({
            "value": self.value.to_json(&action.value),
            "token": [action.token.counter, action.token.replica],
        })
    }

    fn from_json(&self, json: &Value) -> Self::Value {
        let token = json
            .get("token")
            .and_then(|t| Some(OrderToken::new(t.get(0)?.as_u64()?, t.get(1)?.as_str()?)))
            .unwrap_or_default();
        let value = match json.get("value") {
            Some(v) => self.value.from_json(v),
            None => self.value.alloc(),
        };
        RegisterAction { value, token }
    }
}
