use thiserror::Error;

use crate::{
    engine::EngineError, rules::RuleError, schema::SchemaError, store::CursorHandle,
    timestamp::TimestampError,
};

/// Error returned by [`RowStore`](crate::RowStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Table engine failure.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    /// Entity/row conversion failure.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// A rule used as a row predicate failed to evaluate.
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    /// Entity timestamp cannot be stored.
    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),
    /// Handle was never issued or is already closed.
    #[error("unknown row reader {0}")]
    UnknownCursor(CursorHandle),
    /// No row is mapped to this logical key.
    #[error("no row with key {0:?}")]
    UnknownKey(String),
    /// A write transaction is already open on this store.
    #[error("a write transaction is already open")]
    TransactionAlreadyOpen,
    /// No write transaction is open on this store.
    #[error("no write transaction is open")]
    NoOpenTransaction,
    /// The store was disconnected.
    #[error("store is disconnected")]
    Disconnected,
    /// A halt was requested through a [`HaltHandle`](crate::HaltHandle).
    #[error("operation halted")]
    Halted,
    /// Requested window ends before it starts.
    #[error("invalid window {start}..={end}")]
    InvalidWindow {
        /// First index.
        start: usize,
        /// Last index, inclusive.
        end: usize,
    },
    /// The descriptor does not track row filter state.
    #[error("descriptor does not track filter state")]
    FilterStateUntracked,
}
