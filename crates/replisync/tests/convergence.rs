//! Stores of one RDA that observe the same set of actions end up in equal
//! states, whatever the delivery order and however often an action is
//! re-delivered.

use proptest::prelude::*;
use replisync::{
    Action, MapAction, MapRda, OrderToken, Rda, RegisterAction, RegisterRda, ReplicaClock, State, Store,
    StructAction, StructRda,
};
use replisync_schema::{Int32Schema, Schema, StringSchema, StructValue, Uint16Schema};

/// `(kind, key, value)`; interpreted per RDA shape by the builders below.
type Seed = (u8, u8, i32);

const KEYS: [&str; 3] = ["x", "y", "z"];

/// A distinct token per action, spread over three replicas.
fn token(i: usize) -> OrderToken {
    OrderToken::new(i as u64 / 3 + 1, ["a", "b", "c"][i % 3])
}

fn replay<R: Rda>(rda: &R, actions: &[Action<R>], order: &[usize]) -> State<R> {
    let mut store = rda.create_default_store();
    for &i in order {
        store.dispatch(&actions[i]).unwrap();
    }
    store.state()
}

fn check<R: Rda>(rda: &R, actions: &[Action<R>], order: &[usize]) -> Result<(), TestCaseError> {
    let in_order: Vec<usize> = (0..actions.len()).collect();
    let expected = replay(rda, actions, &in_order);
    let shuffled = replay(rda, actions, order);
    prop_assert!(
        rda.state_schema().equal(&expected, &shuffled),
        "{:?} != {:?} (order {:?})",
        expected,
        shuffled,
        order
    );
    Ok(())
}

/// Actions plus a delivery order: every index once, some twice, shuffled.
fn scenario() -> impl Strategy<Value = (Vec<Seed>, Vec<usize>)> {
    prop::collection::vec((0u8..4, 0u8..3, -20i32..20), 1..24).prop_flat_map(|seeds| {
        let n = seeds.len();
        let order = prop::collection::vec(0..n, 0..6).prop_flat_map(move |dups| {
            let mut order: Vec<usize> = (0..n).collect();
            order.extend(dups);
            Just(order).prop_shuffle()
        });
        (Just(seeds), order)
    })
}

// ── Shapes ─────────────────────────────────────────────────────────────────

type Scores = MapRda<RegisterRda<Int32Schema>>;

fn scores() -> Scores {
    MapRda::new(RegisterRda::new(Int32Schema::default()), 8)
}

fn score_action(i: usize, (kind, key, value): Seed) -> Action<Scores> {
    let key = KEYS[key as usize].to_owned();
    let token = token(i);
    match kind {
        0 | 1 => MapAction::Set {
            key,
            action: RegisterAction {
                value,
                token: token.clone(),
            },
            token,
        },
        2 => MapAction::Remove { key, token },
        _ => MapAction::Reset {
            key,
            token,
            state: value,
        },
    }
}

fn room() -> StructRda {
    StructRda::new()
        .field("scores", scores())
        .field("title", RegisterRda::new(StringSchema::default()))
}

fn room_action(i: usize, seed: Seed) -> StructAction {
    if seed.0 == 3 && seed.1 == 0 {
        let action = RegisterAction {
            value: seed.2.to_string(),
            token: token(i),
        };
        return StructAction::new("title", action);
    }
    StructAction::new("scores", score_action(i, seed))
}

fn player() -> StructRda {
    StructRda::new()
        .field("hp", RegisterRda::new(Uint16Schema::new(100)))
        .field("tag", RegisterRda::new(StringSchema::default()))
}

type Roster = MapRda<StructRda>;

fn roster() -> Roster {
    MapRda::new(player(), 8)
}

fn roster_action(i: usize, (kind, key, value): Seed) -> Action<Roster> {
    let key = KEYS[key as usize].to_owned();
    let token = token(i);
    let hp = value.unsigned_abs() as u16;
    match kind {
        0 => MapAction::Set {
            key,
            action: StructAction::new(
                "hp",
                RegisterAction {
                    value: hp,
                    token: token.clone(),
                },
            ),
            token,
        },
        1 => MapAction::Set {
            key,
            action: StructAction::new(
                "tag",
                RegisterAction {
                    value: format!("t{value}"),
                    token: token.clone(),
                },
            ),
            token,
        },
        2 => MapAction::Remove { key, token },
        _ => MapAction::Reset {
            key,
            token,
            state: StructValue::new().with("hp", hp).with("tag", "reset".to_owned()),
        },
    }
}

type Nested = MapRda<Scores>;

fn nested() -> Nested {
    MapRda::new(scores(), 8)
}

fn nested_action(i: usize, (kind, key, value): Seed) -> Action<Nested> {
    let outer = KEYS[key as usize].to_owned();
    let token = token(i);
    match kind {
        0 | 1 => {
            let inner = (value.rem_euclid(4) as u8, value.rem_euclid(3) as u8, value);
            MapAction::Set {
                key: outer,
                action: score_action(i, inner),
                token,
            }
        }
        2 => MapAction::Remove { key: outer, token },
        _ => MapAction::Reset {
            key: outer,
            token,
            state: [(KEYS[0].to_owned(), value)].into_iter().collect(),
        },
    }
}

fn build<A>(seeds: &[Seed], f: impl Fn(usize, Seed) -> A) -> Vec<A> {
    seeds.iter().enumerate().map(|(i, s)| f(i, *s)).collect()
}

// ── Properties ─────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn map_of_registers_converges((seeds, order) in scenario()) {
        let rda = scores();
        check(&rda, &build(&seeds, score_action), &order)?;
    }

    #[test]
    fn struct_of_map_converges((seeds, order) in scenario()) {
        let rda = room();
        check(&rda, &build(&seeds, room_action), &order)?;
    }

    #[test]
    fn map_of_structs_converges((seeds, order) in scenario()) {
        let rda = roster();
        check(&rda, &build(&seeds, roster_action), &order)?;
    }

    #[test]
    fn map_of_maps_converges((seeds, order) in scenario()) {
        let rda = nested();
        check(&rda, &build(&seeds, nested_action), &order)?;
    }

    #[test]
    fn redelivery_reports_no_change((seeds, _order) in scenario()) {
        let rda = scores();
        let actions = build(&seeds, score_action);
        let mut store = rda.create_default_store();
        for action in &actions {
            store.dispatch(action).unwrap();
        }
        let before = store.state();
        for action in &actions {
            prop_assert!(!store.dispatch(action).unwrap());
        }
        prop_assert_eq!(store.state(), before);
    }
}

// ── Scenarios ──────────────────────────────────────────────────────────────

#[test]
fn concurrent_register_writes_pick_the_greater_replica() {
    let rda = RegisterRda::new(StringSchema::default());
    let mut r1 = ReplicaClock::new("r1");
    let mut r2 = ReplicaClock::new("r2");
    let a = rda.set(&mut r1, "from r1".to_owned());
    let b = rda.set(&mut r2, "from r2".to_owned());
    assert_eq!(a.token.counter, b.token.counter);

    let mut first = rda.create_default_store();
    first.dispatch(&a).unwrap();
    first.dispatch(&b).unwrap();
    let mut second = rda.create_default_store();
    second.dispatch(&b).unwrap();
    second.dispatch(&a).unwrap();
    assert_eq!(first.state(), "from r2");
    assert_eq!(second.state(), "from r2");
}

#[test]
fn observed_tokens_order_later_local_writes() {
    let rda = scores();
    let mut alice = ReplicaClock::new("alice");
    let mut bob = ReplicaClock::new("bob");
    for _ in 0..5 {
        alice.tick();
    }
    let write = rda.child().set(&mut alice, 1);
    let remote = rda.set("k", write.token.clone(), write);

    let mut store = rda.create_default_store();
    store.dispatch(&remote).unwrap();
    if let Some(token) = rda.max_token(&remote) {
        bob.observe(&token);
    }
    let remove = rda.remove("k", bob.tick());
    assert!(store.dispatch(&remove).unwrap());
    assert!(store.state().is_empty());
}
