//! The [`Rda`] and [`Store`] capability sets.

use std::fmt::Debug;

use replisync_buffers::{Reader, Writer};
use replisync_schema::{Schema, SchemaError};
use serde_json::Value;

use crate::{OrderToken, RdaError};

pub type State<R> = <<R as Rda>::StateSchema as Schema>::Value;
pub type Action<R> = <<R as Rda>::ActionSchema as Schema>::Value;

/// Descriptor of a replicated data type.
///
/// An RDA fixes how its state is encoded (`state_schema`), how its actions
/// are encoded (`action_schema`), and how a [`Store`] merges actions into
/// state. Descriptors are immutable and cheap to clone; stores keep a clone
/// of the descriptor that created them.
pub trait Rda: Clone + Debug + 'static {
    type StateSchema: Schema + Clone + 'static;
    type ActionSchema: Schema + Clone + 'static;
    type Store: Store<State = State<Self>, Action = Action<Self>> + 'static;

    fn state_schema(&self) -> &Self::StateSchema;

    fn action_schema(&self) -> &Self::ActionSchema;

    fn create_store(&self, state: &State<Self>) -> Self::Store;

    /// Store holding the state schema's identity.
    fn create_default_store(&self) -> Self::Store {
        self.create_store(self.state_schema().identity())
    }

    /// JSON descriptor `{type, ...}` for out-of-band compatibility checks.
    fn json(&self) -> Value;

    /// Greatest order token carried by `action`, nested actions included.
    /// Feed it to [`ReplicaClock::observe`](crate::ReplicaClock::observe)
    /// on receipt.
    fn max_token(&self, action: &Action<Self>) -> Option<OrderToken>;

    /// Encodes `action` for the wire as a diff against the action
    /// schema's identity.
    fn encode_action(&self, action: &Action<Self>, out: &mut Writer) -> Result<bool, SchemaError> {
        let schema = self.action_schema();
        schema.diff(schema.identity(), action, out)
    }

    fn decode_action(&self, inp: &mut Reader<'_>) -> Result<Action<Self>, SchemaError> {
        let schema = self.action_schema();
        schema.patch(schema.identity(), inp)
    }
}

/// Mutable runtime of one RDA instance.
///
/// Stores are driven serially by their owner. `dispatch` either applies an
/// action completely or fails without touching the store.
pub trait Store: Debug {
    type State: Clone + Debug + 'static;
    type Action: Clone + Debug + 'static;

    /// Deep copy of the materialized state.
    fn state(&self) -> Self::State;

    /// Applies a local or decoded remote action. Returns whether the
    /// materialized state changed.
    fn dispatch(&mut self, action: &Self::Action) -> Result<bool, RdaError>;
}

/// Decodes one action from `inp` and dispatches it to `store`.
pub fn dispatch_encoded<R: Rda>(
    rda: &R,
    store: &mut R::Store,
    inp: &mut Reader<'_>,
) -> Result<bool, RdaError> {
    let action = rda.decode_action(inp)?;
    store.dispatch(&action)
}

// ── Child payload codec ────────────────────────────────────────────────────

/// Writes `[flag: u8][diff(identity, value)]`, where the flag tells whether
/// a diff follows. Used for every value nested in an action.
pub(crate) fn encode_payload<S: Schema>(
    schema: &S,
    value: &S::Value,
    out: &mut Writer,
) -> Result<(), SchemaError> {
    let flag = out.x;
    out.u8(0);
    if schema.diff(schema.identity(), value, out)? {
        out.uint8[flag] = 1;
    }
    Ok(())
}

pub(crate) fn decode_payload<S: Schema>(schema: &S, inp: &mut Reader<'_>) -> Result<S::Value, SchemaError> {
    if inp.try_u8()? != 0 {
        schema.patch(schema.identity(), inp)
    } else {
        Ok(schema.alloc())
    }
}

/// Runs `write`, rewinding `out` if it fails so no partial record is left
/// behind. Returns `Ok(true)` on success, matching `Schema::diff`.
pub(crate) fn write_record(
    out: &mut Writer,
    write: impl FnOnce(&mut Writer) -> Result<(), SchemaError>,
) -> Result<bool, SchemaError> {
    let start = out.x;
    match write(out) {
        Ok(()) => Ok(true),
        Err(err) => {
            out.x = start;
            Err(err)
        }
    }
}
