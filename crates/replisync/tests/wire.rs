//! Replication over bytes: actions encoded on one replica and dispatched on
//! another, and full-state resync through the state schema.

use replisync::{
    dispatch_encoded, MapAction, MapRda, Rda, RdaError, RegisterAction, RegisterRda, ReplicaClock, Store,
    StructAction, StructRda,
};
use replisync_buffers::{Reader, Writer};
use replisync_schema::{Float64Schema, Schema, SchemaError, StringSchema};

fn players() -> MapRda<StructRda> {
    let player = StructRda::new()
        .field("name", RegisterRda::new(StringSchema::default()))
        .field("x", RegisterRda::new(Float64Schema::default()));
    MapRda::new(player, 32)
}

fn lobby() -> StructRda {
    StructRda::new()
        .field("motd", RegisterRda::new(StringSchema::new("welcome")))
        .field("players", players())
}

fn join(clock: &mut ReplicaClock, id: &str, name: &str) -> StructAction {
    let token = clock.tick();
    let set_name = StructAction::new(
        "name",
        RegisterAction {
            value: name.to_owned(),
            token: token.clone(),
        },
    );
    StructAction::new("players", players().set(id, token, set_name))
}

fn leave(clock: &mut ReplicaClock, id: &str) -> StructAction {
    StructAction::new("players", players().remove(id, clock.tick()))
}

#[test]
fn actions_replicate_through_a_byte_stream() {
    let rda = lobby();
    let mut host = rda.create_default_store();
    let mut clock = ReplicaClock::new("host");

    let actions = [
        join(&mut clock, "p1", "ada"),
        join(&mut clock, "p2", "brian"),
        StructAction::new("motd", motd(&mut clock, "game on")),
        leave(&mut clock, "p1"),
    ];

    let mut out = Writer::new();
    for action in &actions {
        host.dispatch(action).unwrap();
        assert!(rda.encode_action(action, &mut out).unwrap());
    }
    let bytes = out.flush();

    let mut guest = rda.create_default_store();
    let mut inp = Reader::new(&bytes);
    while inp.x < bytes.len() {
        dispatch_encoded(&rda, &mut guest, &mut inp).unwrap();
    }
    assert!(rda.state_schema().equal(&host.state(), &guest.state()));
    assert_eq!(guest.state().get::<String>("motd").map(String::as_str), Some("game on"));
}

fn motd(clock: &mut ReplicaClock, text: &str) -> RegisterAction<String> {
    RegisterAction {
        value: text.to_owned(),
        token: clock.tick(),
    }
}

#[test]
fn receiver_clock_observes_nested_tokens() {
    let rda = lobby();
    let mut sender = ReplicaClock::with_counter("s", 40);
    let action = join(&mut sender, "p", "eve");

    let mut out = Writer::new();
    rda.encode_action(&action, &mut out).unwrap();
    let bytes = out.flush();
    let decoded = rda.decode_action(&mut Reader::new(&bytes)).unwrap();

    let mut receiver = ReplicaClock::new("r");
    if let Some(token) = rda.max_token(&decoded) {
        receiver.observe(&token);
    }
    assert_eq!(receiver.counter(), 41);
}

#[test]
fn full_state_resync() {
    let rda = lobby();
    let mut host = rda.create_default_store();
    let mut clock = ReplicaClock::new("host");
    host.dispatch(&join(&mut clock, "p1", "ada")).unwrap();
    host.dispatch(&join(&mut clock, "p2", "grace")).unwrap();

    let schema = rda.state_schema();
    let snapshot = host.state();
    let mut out = Writer::new();
    assert!(schema.diff(schema.identity(), &snapshot, &mut out).unwrap());
    let bytes = out.flush();
    let state = schema.patch(schema.identity(), &mut Reader::new(&bytes)).unwrap();

    let mut late = rda.create_store(&state);
    assert!(schema.equal(&late.state(), &snapshot));

    // Later actions keep flowing on top of the snapshot.
    let next = leave(&mut clock, "p2");
    host.dispatch(&next).unwrap();
    late.dispatch(&next).unwrap();
    assert!(schema.equal(&late.state(), &host.state()));
}

#[test]
fn truncated_action_is_a_decode_error() {
    let rda = lobby();
    let mut clock = ReplicaClock::new("host");
    let mut out = Writer::new();
    rda.encode_action(&join(&mut clock, "p1", "ada"), &mut out).unwrap();
    let bytes = out.flush();

    let mut store = rda.create_default_store();
    let before = store.state();
    let err = dispatch_encoded(&rda, &mut store, &mut Reader::new(&bytes[..bytes.len() - 3]));
    assert!(matches!(err, Err(RdaError::Schema(SchemaError::Buffer(_)))));
    assert!(rda.state_schema().equal(&store.state(), &before));
}

#[test]
fn mistyped_map_payload_is_rejected_at_dispatch() {
    let rda = lobby();
    let mut store = rda.create_default_store();
    let wrong: MapAction<StructAction, String> = MapAction::Remove {
        key: "p1".to_owned(),
        token: ReplicaClock::new("host").tick(),
    };
    let err = store.dispatch(&StructAction::new("players", wrong));
    assert!(matches!(err, Err(RdaError::TypeMismatch(_))));
}

#[test]
fn descriptors_match_across_replicas() {
    assert_eq!(lobby().json(), lobby().json());
    let json = lobby().json();
    assert_eq!(json["fields"]["players"]["type"], "map");
    assert_eq!(json["fields"]["players"]["capacity"], 32);
}
