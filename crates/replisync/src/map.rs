//! Keyed collection of child RDAs with last-writer-wins key lifecycle.
//!
//! Every key goes through incarnations. A `Remove` or `Reset` starts a new
//! incarnation (a tombstone, or a fresh child built from the reset state)
//! when its token is greater than the one that started the current
//! incarnation. A `Set` belongs to the incarnation it postdates: it is
//! dropped when its token does not exceed the lifecycle token, and is
//! otherwise routed to the child.
//!
//! Per key the store remembers the lifecycle token, the base of the
//! incarnation and the `Set`s applied since, keyed by token. When a newer
//! lifecycle action arrives, the child is rebuilt from the new base by
//! replaying the surviving `Set`s in token order. The materialized state is
//! therefore a function of the set of actions observed, whatever order
//! they arrived in.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use replisync_buffers::{Reader, Writer};
use replisync_schema::{Dictionary, DictionarySchema, Schema, SchemaError, SchemaKind};
use serde_json::{json, Value};

use crate::rda::{decode_payload, encode_payload, write_record};
use crate::{Action, OrderToken, Rda, RdaError, State, Store};

const TAG_SET: u8 = 0;
const TAG_REMOVE: u8 = 1;
const TAG_RESET: u8 = 2;

/// Map action over child actions `A` and child states `S`.
#[derive(Debug, Clone, PartialEq)]
pub enum MapAction<A, S> {
    /// Routes `action` to the child at `key`, creating it from the child
    /// identity when the key is absent.
    Set { key: String, token: OrderToken, action: A },
    /// Tombstones `key`.
    Remove { key: String, token: OrderToken },
    /// Replaces the child at `key` with one built from `state`.
    Reset { key: String, token: OrderToken, state: S },
}

impl<A, S> MapAction<A, S> {
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key, .. } | Self::Reset { key, .. } => key,
        }
    }

    pub fn token(&self) -> &OrderToken {
        match self {
            Self::Set { token, .. } | Self::Remove { token, .. } | Self::Reset { token, .. } => token,
        }
    }
}

pub type MapActionOf<R> = MapAction<Action<R>, State<R>>;

#[derive(Debug)]
struct MapInner<R: Rda> {
    child: R,
    state: DictionarySchema<R::StateSchema>,
    action: MapActionSchema<R>,
}

#[derive(Debug)]
pub struct MapRda<R: Rda> {
    inner: Arc<MapInner<R>>,
}

impl<R: Rda> Clone for MapRda<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Rda> MapRda<R> {
    /// A map of `child` RDAs. `capacity` bounds the number of keys a
    /// full-state diff may carry.
    pub fn new(child: R, capacity: usize) -> Self {
        let inner = MapInner {
            state: DictionarySchema::new(child.state_schema().clone(), capacity),
            action: MapActionSchema::new(child.clone()),
            child,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn child(&self) -> &R {
        &self.inner.child
    }

    pub fn set(&self, key: impl Into<String>, token: OrderToken, action: Action<R>) -> MapActionOf<R> {
        MapAction::Set {
            key: key.into(),
            token,
            action,
        }
    }

    pub fn remove(&self, key: impl Into<String>, token: OrderToken) -> MapActionOf<R> {
        MapAction::Remove {
            key: key.into(),
            token,
        }
    }

    pub fn reset(&self, key: impl Into<String>, token: OrderToken, state: State<R>) -> MapActionOf<R> {
        MapAction::Reset {
            key: key.into(),
            token,
            state,
        }
    }
}

impl<R: Rda> Rda for MapRda<R> {
    type StateSchema = DictionarySchema<R::StateSchema>;
    type ActionSchema = MapActionSchema<R>;
    type Store = MapStore<R>;

    fn state_schema(&self) -> &Self::StateSchema {
        &self.inner.state
    }

    fn action_schema(&self) -> &MapActionSchema<R> {
        &self.inner.action
    }

    fn create_store(&self, state: &State<Self>) -> MapStore<R> {
        let child = &self.inner.child;
        let entries = state
            .iter()
            .map(|(key, value)| {
                let entry = Entry {
                    token: None,
                    base: Some(child.state_schema().clone_value(value)),
                    updates: BTreeMap::new(),
                    store: Some(child.create_store(value)),
                };
                (key.clone(), entry)
            })
            .collect();
        MapStore {
            rda: self.clone(),
            entries,
        }
    }

    fn json(&self) -> Value {
        json!({
            "type": "map",
            "capacity": self.inner.state.capacity(),
            "valueType": self.inner.child.json(),
        })
    }

    fn max_token(&self, action: &MapActionOf<R>) -> Option<OrderToken> {
        let token = action.token().clone();
        match action {
            MapAction::Set { action, .. } => match self.inner.child.max_token(action) {
                Some(nested) if nested > token => Some(nested),
                _ => Some(token),
            },
            _ => Some(token),
        }
    }
}

// ── Store ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Entry<R: Rda> {
    /// Token of the `Remove`/`Reset` that started this incarnation. `None`
    /// for keys present since the store was created or created by a `Set`.
    token: Option<OrderToken>,
    /// State this incarnation starts from; `None` for a tombstone.
    base: Option<State<R>>,
    /// `Set`s newer than `token`, by token.
    updates: BTreeMap<OrderToken, Action<R>>,
    /// Live child, equal to the base with every update applied.
    store: Option<R::Store>,
}

impl<R: Rda> Entry<R> {
    fn is_stale(&self, token: &OrderToken) -> bool {
        self.token.as_ref().is_some_and(|current| token <= current)
    }
}

/// Store of a [`MapRda`].
///
/// Memory: besides the live child, every key keeps each `Set` it accepted
/// since its last `Remove`/`Reset`, because a late lifecycle action with a
/// smaller token has to rebuild the child from them. A key written every
/// frame grows by one action per frame until a newer `Remove` or `Reset`
/// prunes the log. [`MapStore::retained_updates`] reports the size.
#[derive(Debug)]
pub struct MapStore<R: Rda> {
    rda: MapRda<R>,
    entries: BTreeMap<String, Entry<R>>,
}

impl<R: Rda> MapStore<R> {
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.store.is_some())
    }

    /// Number of `Set`s kept for rebuilding `key`.
    pub fn retained_updates(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |e| e.updates.len())
    }

    /// The live child at `key`.
    pub fn child(&self, key: &str) -> Option<&R::Store> {
        self.entries.get(key)?.store.as_ref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.store.is_some())
            .map(|(k, _)| k.as_str())
    }

    fn apply_set(&mut self, key: &str, token: &OrderToken, action: &Action<R>) -> Result<bool, RdaError> {
        let child = &self.rda.inner.child;
        if let Some(entry) = self.entries.get(key) {
            if entry.is_stale(token) {
                log::trace!("map: dropped set {} on {:?}, incarnation is newer", token, key);
                return Ok(false);
            }
            if entry.updates.contains_key(token) {
                log::trace!("map: dropped duplicate set {} on {:?}", token, key);
                return Ok(false);
            }
        }

        match self.entries.get_mut(key) {
            Some(Entry {
                store: Some(store),
                updates,
                ..
            }) => {
                let changed = store.dispatch(action)?;
                updates.insert(token.clone(), action.clone());
                Ok(changed)
            }
            Some(entry) => {
                let mut store = child.create_default_store();
                store.dispatch(action)?;
                entry.updates.insert(token.clone(), action.clone());
                entry.store = Some(store);
                Ok(true)
            }
            None => {
                let mut store = child.create_default_store();
                store.dispatch(action)?;
                let entry = Entry {
                    token: None,
                    base: Some(child.state_schema().alloc()),
                    updates: BTreeMap::from([(token.clone(), action.clone())]),
                    store: Some(store),
                };
                self.entries.insert(key.to_owned(), entry);
                Ok(true)
            }
        }
    }

    /// Starts a new incarnation of `key`: a tombstone when `base` is `None`.
    fn apply_lifecycle(
        &mut self,
        key: &str,
        token: &OrderToken,
        base: Option<&State<R>>,
    ) -> Result<bool, RdaError> {
        let child = &self.rda.inner.child;
        let schema = child.state_schema();

        let surviving: BTreeMap<OrderToken, Action<R>> = match self.entries.get(key) {
            Some(entry) if entry.is_stale(token) => {
                log::trace!("map: dropped lifecycle {} on {:?}, incarnation is newer", token, key);
                return Ok(false);
            }
            Some(entry) => entry
                .updates
                .range((Bound::Excluded(token), Bound::Unbounded))
                .map(|(t, a)| (t.clone(), a.clone()))
                .collect(),
            None => BTreeMap::new(),
        };

        let base = base.map(|state| schema.clone_value(state));
        let store = if base.is_none() && surviving.is_empty() {
            None
        } else {
            let mut store = match &base {
                Some(state) => child.create_store(state),
                None => child.create_default_store(),
            };
            for action in surviving.values() {
                store.dispatch(action)?;
            }
            Some(store)
        };
        log::debug!(
            "map: {:?} rebuilt at {} with {} update(s), {}",
            key,
            token,
            surviving.len(),
            if store.is_some() { "live" } else { "tombstoned" }
        );

        let entry = Entry {
            token: Some(token.clone()),
            base,
            updates: surviving,
            store,
        };
        let previous = self.entries.insert(key.to_owned(), entry);

        let current = self.entries.get(key).and_then(|e| e.store.as_ref());
        let before = previous.as_ref().and_then(|e| e.store.as_ref());
        let changed = match (before, current) {
            (None, None) => false,
            (Some(a), Some(b)) => !schema.equal(&a.state(), &b.state()),
            _ => true,
        };
        if let Some(old) = previous.and_then(|e| e.base) {
            schema.free(old);
        }
        Ok(changed)
    }
}

impl<R: Rda> Store for MapStore<R> {
    type State = Dictionary<State<R>>;
    type Action = MapActionOf<R>;

    fn state(&self) -> Self::State {
        self.entries
            .iter()
            .filter_map(|(key, entry)| Some((key.clone(), entry.store.as_ref()?.state())))
            .collect()
    }

    fn dispatch(&mut self, action: &MapActionOf<R>) -> Result<bool, RdaError> {
        match action {
            MapAction::Set { key, token, action } => self.apply_set(key, token, action),
            MapAction::Remove { key, token } => self.apply_lifecycle(key, token, None),
            MapAction::Reset { key, token, state } => self.apply_lifecycle(key, token, Some(state)),
        }
    }
}

// ── Action codec ───────────────────────────────────────────────────────────

/// Wire form of a [`MapAction`]:
///
/// ```text
/// [tag: u8][key: utf16 string][token]
/// Set:    [flag: u8][child action diff against its identity]
/// Reset:  [flag: u8][child state diff against its identity]
/// ```
#[derive(Debug)]
pub struct MapActionSchema<R: Rda> {
    child: R,
    identity: MapActionOf<R>,
}

impl<R: Rda> Clone for MapActionSchema<R> {
    fn clone(&self) -> Self {
        Self {
            child: self.child.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<R: Rda> MapActionSchema<R> {
    fn new(child: R) -> Self {
        Self {
            child,
            identity: MapAction::Remove {
                key: String::new(),
                token: OrderToken::default(),
            },
        }
    }
}

impl<R: Rda> Schema for MapActionSchema<R> {
    type Value = MapActionOf<R>;

    fn kind(&self) -> SchemaKind {
        SchemaKind::Action
    }

    fn identity(&self) -> &Self::Value {
        &self.identity
    }

    fn json(&self) -> Value {
        json!({
            "type": "action",
            "rda": "map",
            "actionType": self.child.action_schema().json(),
            "stateType": self.child.state_schema().json(),
        })
    }

    fn equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        match (a, b) {
            (
                MapAction::Set { key: ka, token: ta, action: aa },
                MapAction::Set { key: kb, token: tb, action: ab },
            ) => ka == kb && ta == tb && self.child.action_schema().equal(aa, ab),
            (MapAction::Remove { key: ka, token: ta }, MapAction::Remove { key: kb, token: tb }) => {
                ka == kb && ta == tb
            }
            (
                MapAction::Reset { key: ka, token: ta, state: sa },
                MapAction::Reset { key: kb, token: tb, state: sb },
            ) => ka == kb && ta == tb && self.child.state_schema().equal(sa, sb),
            _ => false,
        }
    }

    fn clone_value(&self, action: &Self::Value) -> Self::Value {
        match action {
            MapAction::Set { key, token, action } => MapAction::Set {
                key: key.clone(),
                token: token.clone(),
                action: self.child.action_schema().clone_value(action),
            },
            MapAction::Remove { key, token } => MapAction::Remove {
                key: key.clone(),
                token: token.clone(),
            },
            MapAction::Reset { key, token, state } => MapAction::Reset {
                key: key.clone(),
                token: token.clone(),
                state: self.child.state_schema().clone_value(state),
            },
        }
    }

    fn diff(&self, base: &Self::Value, target: &Self::Value, out: &mut Writer) -> Result<bool, SchemaError> {
        if self.equal(base, target) {
            return Ok(false);
        }
        write_record(out, |out| {
            let tag = match target {
                MapAction::Set { .. } => TAG_SET,
                MapAction::Remove { .. } => TAG_REMOVE,
                MapAction::Reset { .. } => TAG_RESET,
            };
            out.u8(tag);
            out.str_utf16(target.key());
            target.token().encode(out);
            match target {
                MapAction::Set { action, .. } => encode_payload(self.child.action_schema(), action, out),
                MapAction::Remove { .. } => Ok(()),
                MapAction::Reset { state, .. } => encode_payload(self.child.state_schema(), state, out),
            }
        })
    }

    fn patch(&self, _base: &Self::Value, inp: &mut Reader<'_>) -> Result<Self::Value, SchemaError> {
        let tag = inp.try_u8()?;
        if tag > TAG_RESET {
            return Err(SchemaError::UnknownTag(tag));
        }
        let key = inp.try_str_utf16()?;
        let token = OrderToken::decode(inp)?;
        Ok(match tag {
            TAG_SET => MapAction::Set {
                key,
                token,
                action: decode_payload(self.child.action_schema(), inp)?,
            },
            TAG_RESET => MapAction::Reset {
                key,
                token,
                state: decode_payload(self.child.state_schema(), inp)?,
            },
            _ => MapAction::Remove { key, token },
        })
    }

    fn to_json(&self, action: &Self::Value) -> Value {
        let token = json!([action.token().counter, action.token().replica]);
        match action {
            MapAction::Set { key, action, .. } => json!({
                "set": key,
                "token": token,
                "action": self.child.action_schema().to_json(action),
            }),
            MapAction::Remove { key, .. } => json!({"remove": key, "token": token}),
            MapAction::Reset { key, state, .. } => json!({
                "reset": key,
                "token": token,
                "state": self.child.state_schema().to_json(state),
            }),
        }
    }

    fn from_json(&self, json: &Value) -> Self::Value {
        let token = json
            .get("token")
            .and_then(|t| Some(OrderToken::new(t.get(0)?.as_u64()?, t.get(1)?.as_str()?)))
            .unwrap_or_default();
        let key_of = |field: &str| json.get(field).and_then(Value::as_str).map(str::to_owned);

        if let Some(key) = key_of("set") {
            let action = match json.get("action") {
                Some(a) => self.child.action_schema().from_json(a),
                None => self.child.action_schema().alloc(),
            };
            return MapAction::Set { key, token, action };
        }
        if let Some(key) = key_of("reset") {
            let state = match json.get("state") {
                Some(s) => self.child.state_schema().from_json(s),
                None => self.child.state_schema().alloc(),
            };
            return MapAction::Reset { key, token, state };
        }
        match key_of("remove") {
            Some(key) => MapAction::Remove { key, token },
            None => self.identity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RegisterAction, RegisterRda};
    use replisync_schema::{Int32Schema, StringSchema};

    type Scores = MapRda<RegisterRda<Int32Schema>>;

    fn scores() -> Scores {
        MapRda::new(RegisterRda::new(Int32Schema::default()), 16)
    }

    fn write(value: i32, counter: u64, replica: &str) -> RegisterAction<i32> {
        RegisterAction {
            value,
            token: OrderToken::new(counter, replica),
        }
    }

    #[test]
    fn set_creates_the_key_from_the_child_identity() {
        let rda = scores();
        let mut store = rda.create_default_store();
        assert!(!store.contains_key("alice"));
        let t = OrderToken::new(1, "a");
        assert!(store.dispatch(&rda.set("alice", t.clone(), write(10, 1, "a"))).unwrap());
        assert_eq!(store.state(), Dictionary::from([("alice".to_owned(), 10)]));
        assert!(!store.dispatch(&rda.set("alice", t, write(10, 1, "a"))).unwrap());
        assert_eq!(store.keys().collect::<Vec<_>>(), ["alice"]);
    }

    #[test]
    fn remove_tombstones_and_newer_set_recreates() {
        let rda = scores();
        let mut store = rda.create_default_store();
        store.dispatch(&rda.set("k", OrderToken::new(1, "a"), write(1, 1, "a"))).unwrap();
        assert!(store.dispatch(&rda.remove("k", OrderToken::new(3, "a"))).unwrap());
        assert!(!store.contains_key("k"));

        // Postdated by the remove: dropped.
        assert!(!store.dispatch(&rda.set("k", OrderToken::new(2, "b"), write(2, 2, "b"))).unwrap());
        assert!(!store.contains_key("k"));
        assert!(!store.dispatch(&rda.remove("k", OrderToken::new(2, "b"))).unwrap());

        assert!(store.dispatch(&rda.set("k", OrderToken::new(4, "b"), write(4, 4, "b"))).unwrap());
        assert_eq!(store.child("k").map(|c| c.state()), Some(4));
    }

    #[test]
    fn late_remove_keeps_newer_sets() {
        let rda = scores();
        let mut store = rda.create_default_store();
        store.dispatch(&rda.set("k", OrderToken::new(1, "a"), write(1, 1, "a"))).unwrap();
        store.dispatch(&rda.set("k", OrderToken::new(5, "a"), write(5, 5, "a"))).unwrap();
        // Supersedes the first set only.
        assert!(!store.dispatch(&rda.remove("k", OrderToken::new(3, "b"))).unwrap());
        assert_eq!(store.state(), Dictionary::from([("k".to_owned(), 5)]));

        let mut other = rda.create_default_store();
        other.dispatch(&rda.remove("k", OrderToken::new(3, "b"))).unwrap();
        other.dispatch(&rda.set("k", OrderToken::new(5, "a"), write(5, 5, "a"))).unwrap();
        other.dispatch(&rda.set("k", OrderToken::new(1, "a"), write(1, 1, "a"))).unwrap();
        assert_eq!(other.state(), store.state());
    }

    #[test]
    fn newer_lifecycle_prunes_retained_updates() {
        let rda = scores();
        let mut store = rda.create_default_store();
        for i in 1..=10 {
            let t = OrderToken::new(i, "a");
            store.dispatch(&rda.set("k", t, write(i as i32, i, "a"))).unwrap();
        }
        assert_eq!(store.retained_updates("k"), 10);
        store.dispatch(&rda.reset("k", OrderToken::new(7, "b"), 0)).unwrap();
        assert_eq!(store.retained_updates("k"), 3);
        assert_eq!(store.child("k").map(|c| c.state()), Some(10));
        store.dispatch(&rda.remove("k", OrderToken::new(11, "b"))).unwrap();
        assert_eq!(store.retained_updates("k"), 0);
        assert_eq!(store.retained_updates("absent"), 0);
    }

    #[test]
    fn reset_rebuilds_from_the_given_state() {
        let rda = scores();
        let initial = Dictionary::from([("k".to_owned(), 7)]);
        let mut store = rda.create_store(&initial);
        assert_eq!(store.state(), initial);
        assert!(store.dispatch(&rda.reset("k", OrderToken::new(2, "a"), 42)).unwrap());
        assert_eq!(store.state(), Dictionary::from([("k".to_owned(), 42)]));
        assert!(!store.dispatch(&rda.reset("k", OrderToken::new(3, "a"), 42)).unwrap());
        assert!(store.dispatch(&rda.reset("new", OrderToken::new(3, "a"), 0)).unwrap());
        assert!(store.contains_key("new"));
    }

    #[test]
    fn failed_child_dispatch_leaves_the_key_absent() {
        let rda = MapRda::new(crate::ConstantRda::new(StringSchema::default()), 4);
        let mut store = rda.create_default_store();
        let err = store.dispatch(&rda.set("k", OrderToken::new(1, "a"), ()));
        assert_eq!(err, Err(RdaError::UnsupportedOperation("constant")));
        assert!(!store.contains_key("k"));
        assert!(store.state().is_empty());
    }

    #[test]
    fn max_token_looks_inside_sets() {
        let rda = scores();
        let set = rda.set("k", OrderToken::new(2, "a"), write(9, 9, "z"));
        assert_eq!(rda.max_token(&set), Some(OrderToken::new(9, "z")));
        let remove = rda.remove("k", OrderToken::new(4, "a"));
        assert_eq!(rda.max_token(&remove), Some(OrderToken::new(4, "a")));
    }

    #[test]
    fn action_codec_round_trip() {
        let rda = scores();
        let actions = [
            rda.set("héllo", OrderToken::new(1, "a"), write(-3, 1, "a")),
            rda.set("zero", OrderToken::new(2, "a"), write(0, 2, "a")),
            rda.remove("gone", OrderToken::new(3, "b")),
            rda.reset("fresh", OrderToken::new(4, "c"), 12),
        ];
        for action in actions {
            let mut out = Writer::new();
            assert!(rda.encode_action(&action, &mut out).unwrap());
            let bytes = out.flush();
            assert_eq!(rda.decode_action(&mut Reader::new(&bytes)).unwrap(), action);
        }
    }

    #[test]
    fn identity_action_encodes_to_nothing() {
        let rda = scores();
        let mut out = Writer::new();
        let identity = rda.action_schema().identity().clone();
        assert!(!rda.encode_action(&identity, &mut out).unwrap());
        assert!(out.flush().is_empty());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let rda = scores();
        let bytes = [9u8, 0, 0, 0, 0];
        assert_eq!(
            rda.decode_action(&mut Reader::new(&bytes)),
            Err(SchemaError::UnknownTag(9))
        );
    }

    #[test]
    fn action_json() {
        let rda = scores();
        let schema = rda.action_schema();
        let action = rda.remove("k", OrderToken::new(2, "r"));
        let json = schema.to_json(&action);
        assert_eq!(json, json!({"remove": "k", "token": [2, "r"]}));
        assert_eq!(schema.from_json(&json), action);
        let set = rda.set("k", OrderToken::new(3, "r"), write(1, 3, "r"));
        assert_eq!(schema.from_json(&schema.to_json(&set)), set);
    }
}
