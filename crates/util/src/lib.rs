//! `replisync-util`: JSON helpers shared by the replisync schema codecs.
//!
//! - [`json_equal`]: structural equality for `serde_json::Value`.
//! - [`json_stable`]: deterministic, key-sorted JSON text.

pub mod json_equal;
pub mod json_stable;

pub use json_equal::deep_equal;
pub use json_stable::stringify;
