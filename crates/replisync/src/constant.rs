use std::sync::Arc;

use replisync_schema::{Schema, VoidSchema};
use serde_json::{json, Value};

use crate::{OrderToken, Rda, RdaError, Store};

/// An immutable slot. It takes part in struct and map plumbing like any
/// other RDA but rejects every action.
#[derive(Debug)]
pub struct ConstantRda<S: Schema> {
    schema: Arc<S>,
}

impl<S: Schema> Clone for ConstantRda<S> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<S: Schema> ConstantRda<S> {
    pub fn new(schema: S) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }
}

impl<S: Schema + Clone + 'static> Rda for ConstantRda<S> {
    type StateSchema = S;
    type ActionSchema = VoidSchema;
    type Store = ConstantStore<S>;

    fn state_schema(&self) -> &S {
        &self.schema
    }

    fn action_schema(&self) -> &VoidSchema {
        &VoidSchema
    }

    fn create_store(&self, state: &S::Value) -> ConstantStore<S> {
        ConstantStore {
            schema: Arc::clone(&self.schema),
            value: self.schema.clone_value(state),
        }
    }

    fn json(&self) -> Value {
        json!({"type": "constant", "stateType": self.schema.json()})
    }

    fn max_token(&self, _action: &()) -> Option<OrderToken> {
        None
    }
}

#[derive(Debug)]
pub struct ConstantStore<S: Schema> {
    schema: Arc<S>,
    value: S::Value,
}

impl<S: Schema> Store for ConstantStore<S> {
    type State = S::Value;
    type Action = ();

    fn state(&self) -> S::Value {
        self.schema.clone_value(&self.value)
    }

    fn dispatch(&mut self, _action: &()) -> Result<bool, RdaError> {
        Err(RdaError::UnsupportedOperation("constant"))
    }
}
