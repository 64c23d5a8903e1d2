use std::io;

use thiserror::Error;

use crate::schema::SchemaError;

/// Error returned by a [`TableEngine`](crate::engine::TableEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// SQLite reported a failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Filesystem failure while recreating or deleting the backing file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Name is not a plain SQL identifier.
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    /// No command was set up under this name.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    /// Value bound to a parameter the command does not declare.
    #[error("command {command:?} has no parameter {parameter:?}")]
    UnknownParameter {
        /// Command name.
        command: String,
        /// Offending column.
        parameter: String,
    },
    /// Command parameter left unbound.
    #[error("command {command:?} is missing a value for {parameter:?}")]
    MissingParameter {
        /// Command name.
        command: String,
        /// Unbound column.
        parameter: String,
    },
    /// A write transaction is already open on the writer connection.
    #[error("a write transaction is already open")]
    TransactionActive,
    /// No write transaction is open.
    #[error("no write transaction is open")]
    NoActiveTransaction,
    /// The supplied transaction is not the open one.
    #[error("transaction {0} is not the open transaction")]
    StaleTransaction(u64),
    /// The engine was disconnected.
    #[error("engine is disconnected")]
    Disconnected,
    /// A scanned row could not be decoded.
    #[error("row decode error: {0}")]
    Decode(#[from] SchemaError),
}
