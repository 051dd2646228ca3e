use replisync_schema::SchemaError;

/// Errors raised by [`Store::dispatch`](crate::Store::dispatch).
///
/// Stale and duplicate actions are not errors: they are dropped and
/// `dispatch` reports no change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RdaError {
    #[error("{0} does not accept actions")]
    UnsupportedOperation(&'static str),
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// A type-erased action did not have the type the receiving store
    /// expects.
    #[error("action does not match a `{0}` store")]
    TypeMismatch(&'static str),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
