//! `replisync-buffers`: the byte stream under every replisync codec.
//!
//! [`Writer`] is a growable big-endian buffer with a public cursor, so codecs
//! can backpatch counters and roll back speculative writes. [`Reader`] walks a
//! byte slice with bounds-checked reads.
//!
//! Strings are length-prefixed with a `u32`: UTF-16 strings count code units
//! (2 bytes each), ASCII strings count bytes.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::{Writer, LENGTH_FLAG};

/// Errors raised while reading from a [`Reader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("invalid UTF-16 payload")]
    InvalidUtf16,
    #[error("invalid ASCII payload")]
    InvalidAscii,
}
