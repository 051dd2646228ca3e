//! Replicated data abstractions (RDAs).
//!
//! An RDA describes how replicas of one piece of state agree on its value.
//! It pairs a state [`Schema`](replisync_schema::Schema) with an action
//! schema, and creates [`Store`]s that fold actions into state. Stores of
//! the same RDA converge to equal states once they have seen the same set
//! of actions, in any order and with any duplication.
//!
//! - [`ConstantRda`]: an immutable value.
//! - [`RegisterRda`]: last-writer-wins by [`OrderToken`].
//! - [`StructRda`]: independently replicated named fields.
//! - [`MapRda`]: string keys with their own lifecycle, each holding a child RDA.
//!
//! ```
//! use replisync::{MapRda, Rda, RegisterRda, ReplicaClock, Store};
//! use replisync_buffers::{Reader, Writer};
//! use replisync_schema::Int32Schema;
//!
//! let scores = MapRda::new(RegisterRda::new(Int32Schema::default()), 64);
//! let mut local = scores.create_default_store();
//! let mut remote = scores.create_default_store();
//!
//! let mut clock = ReplicaClock::new("alice");
//! let write = scores.child().set(&mut clock, 12);
//! let action = scores.set("alice", write.token.clone(), write);
//! local.dispatch(&action).unwrap();
//!
//! let mut out = Writer::new();
//! scores.encode_action(&action, &mut out).unwrap();
//! let bytes = out.flush();
//! replisync::dispatch_encoded(&scores, &mut remote, &mut Reader::new(&bytes)).unwrap();
//! assert_eq!(local.state(), remote.state());
//! ```

mod clock;
mod constant;
mod dynamic;
mod error;
mod map;
mod rda;
mod register;
mod structure;

pub use clock::{OrderToken, ReplicaClock};
pub use constant::{ConstantRda, ConstantStore};
pub use dynamic::{DynRda, DynStore};
pub use error::RdaError;
pub use map::{MapAction, MapActionOf, MapActionSchema, MapRda, MapStore};
pub use rda::{dispatch_encoded, Action, Rda, State, Store};
pub use register::{RegisterAction, RegisterActionSchema, RegisterRda, RegisterStore};
pub use structure::{StructAction, StructActionSchema, StructRda, StructStore};
