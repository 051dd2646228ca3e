//! Object-safe views of [`Rda`] and [`Store`] for heterogeneous struct
//! fields. Every RDA and every store gets one through the blanket impls.

use std::fmt::Debug;
use std::sync::Arc;

use replisync_schema::{DynSchema, FieldValue, Schema};
use serde_json::Value;

use crate::{OrderToken, Rda, RdaError, State, Store};

pub trait DynRda: Debug {
    fn dyn_state_schema(&self) -> Arc<dyn DynSchema>;
    fn dyn_action_schema(&self) -> Arc<dyn DynSchema>;
    /// Creates a store from `state`. `None`, or a state of the wrong type,
    /// starts from the state schema's identity.
    fn dyn_create_store(&self, state: Option<&dyn FieldValue>) -> Box<dyn DynStore>;
    fn dyn_json(&self) -> Value;
    fn dyn_max_token(&self, action: &dyn FieldValue) -> Option<OrderToken>;
}

pub trait DynStore: Debug {
    fn dyn_state(&self) -> Box<dyn FieldValue>;
    fn dyn_dispatch(&mut self, action: &dyn FieldValue) -> Result<bool, RdaError>;
}

impl<R: Rda> DynRda for R {
    fn dyn_state_schema(&self) -> Arc<dyn DynSchema> {
        Arc::new(self.state_schema().clone())
    }

    fn dyn_action_schema(&self) -> Arc<dyn DynSchema> {
        Arc::new(self.action_schema().clone())
    }

    fn dyn_create_store(&self, state: Option<&dyn FieldValue>) -> Box<dyn DynStore> {
        let state = state.and_then(|s| s.as_any().downcast_ref::<State<R>>());
        let store = match state {
            Some(state) => self.create_store(state),
            None => self.create_store(self.state_schema().identity()),
        };
        Box::new(store)
    }

    fn dyn_json(&self) -> Value {
        self.json()
    }

    fn dyn_max_token(&self, action: &dyn FieldValue) -> Option<OrderToken> {
        self.max_token(action.as_any().downcast_ref()?)
    }
}

impl<S: Store + 'static> DynStore for S {
    fn dyn_state(&self) -> Box<dyn FieldValue> {
        Box::new(self.state())
    }

    fn dyn_dispatch(&mut self, action: &dyn FieldValue) -> Result<bool, RdaError> {
        match action.as_any().downcast_ref::<S::Action>() {
            Some(action) => self.dispatch(action),
            None => Err(RdaError::TypeMismatch(std::any::type_name::<S>())),
        }
    }
}
