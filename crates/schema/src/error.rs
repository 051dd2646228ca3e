use replisync_buffers::BufferError;

/// Errors raised by schema codecs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A dictionary diff target holds more keys than the schema allows.
    /// Signals a configuration bug on the encoding side.
    #[error("dictionary capacity exceeded: {len} keys, capacity {capacity}")]
    CapacityExceeded { capacity: usize, len: usize },
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("unknown tag: {0}")]
    UnknownTag(u8),
    /// A type-erased value did not have the type its schema expects.
    #[error("value does not match a `{0}` schema")]
    TypeMismatch(&'static str),
    #[error("unknown field index: {0}")]
    UnknownField(u32),
    #[error("unknown field: {0}")]
    UnknownFieldName(String),
}
