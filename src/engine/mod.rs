//! Low-level table engine: physical schema, compiled commands, raw scans.
//!
//! The engine knows tables, columns and SQL fragments, never entity types.
//! [`SqliteEngine`] is the shipped implementation; the typed store is generic
//! over [`TableEngine`] so tests and alternative backends can stand in.

mod cursor;
mod error;
pub(crate) mod ident;
mod sqlite;

use std::fmt;

pub use cursor::RowCursor;
pub use error::EngineError;
pub use sqlite::SqliteEngine;

use crate::schema::{ColumnType, RowValues, StoredRow};

/// Sort direction of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Scan order: one column, with ties broken by `Id` in the same direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOrdering {
    /// Ordering column. Must not contain `NULL`s.
    pub column: String,
    /// Direction applied to both the column and the `Id` tie-break.
    pub direction: Direction,
}

impl RowOrdering {
    /// Descending order on `column`.
    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Descending,
        }
    }

    /// Ascending order on `column`.
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Ascending,
        }
    }
}

/// Token for the open write transaction on the writer connection.
///
/// Consumed by commit or rollback, so a finished transaction cannot be reused.
#[must_use = "an open transaction must be committed or rolled back"]
#[derive(PartialEq, Eq)]
pub struct WriteTransaction {
    id: u64,
}

impl WriteTransaction {
    pub(crate) fn new(id: u64) -> Self {
        Self { id }
    }

    /// Engine-local sequence number of the transaction.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for WriteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteTransaction({})", self.id)
    }
}

/// Raw relational operations over one backing store.
///
/// Schema operations are idempotent: re-declaring an existing table, column
/// or index is not an error. Every other failure propagates.
///
/// Commands are compiled once by name and re-bound on each execution. They
/// are not safe to execute concurrently, which `&mut self` enforces.
pub trait TableEngine {
    /// Lazy forward-only cursor returned by [`TableEngine::get_rows`].
    type Cursor: Iterator<Item = Result<StoredRow, EngineError>>;

    /// File name of the backing store.
    fn name(&self) -> &str;

    /// Creates `table` if absent, adds any missing `columns` and asserts a
    /// unique index named `{column}Index` on each of `index_columns`.
    fn add_table_and_columns(
        &mut self,
        table: &str,
        columns: &[(&str, ColumnType)],
        index_columns: &[&str],
    ) -> Result<(), EngineError>;

    /// Compiles `INSERT INTO table (params..) VALUES (:params..)` under `command`.
    fn set_up_insert_command(
        &mut self,
        table: &str,
        command: &str,
        params: &[&str],
    ) -> Result<(), EngineError>;

    /// Compiles `UPDATE table SET p = :p.. WHERE key = :key` under `command`.
    fn set_up_update_command(
        &mut self,
        table: &str,
        command: &str,
        params: &[&str],
        key_param: &str,
    ) -> Result<(), EngineError>;

    /// Binds `values` to an insert command and runs it.
    ///
    /// With `transaction`, the write is checked to belong to that open
    /// transaction. Without one, it joins whatever transaction is open or
    /// autocommits.
    fn execute_insert_command(
        &mut self,
        command: &str,
        values: &RowValues,
        transaction: Option<&WriteTransaction>,
    ) -> Result<usize, EngineError>;

    /// Binds `values`, including the key parameter, to an update command
    /// and runs it. Returns the number of rows changed.
    fn execute_update_command(
        &mut self,
        command: &str,
        values: &RowValues,
        transaction: Option<&WriteTransaction>,
    ) -> Result<usize, EngineError>;

    /// Begins a write transaction on the writer connection.
    fn open_write_transaction(&mut self) -> Result<WriteTransaction, EngineError>;

    /// Commits and closes `transaction`.
    fn commit_transaction(&mut self, transaction: WriteTransaction) -> Result<(), EngineError>;

    /// Rolls back and closes `transaction`.
    fn rollback_transaction(&mut self, transaction: WriteTransaction) -> Result<(), EngineError>;

    /// `COUNT(*)` over committed rows matching the raw SQL `condition`.
    fn row_count(&self, table: &str, condition: Option<&str>) -> Result<u64, EngineError>;

    /// Opens a cursor over committed rows matching `condition`, in `ordering`.
    ///
    /// `condition` is a trusted SQL fragment; it is spliced into the query.
    fn get_rows(
        &self,
        table: &str,
        condition: Option<&str>,
        ordering: &RowOrdering,
    ) -> Result<Self::Cursor, EngineError>;

    /// Largest `Id` in `table`, if any row exists.
    fn max_id(&self, table: &str) -> Result<Option<i64>, EngineError>;

    /// Deletes every row of `table`.
    fn clear(&mut self, table: &str) -> Result<(), EngineError>;

    /// Asserts a unique index on `column`.
    fn index_column(&mut self, table: &str, index_name: &str, column: &str)
        -> Result<(), EngineError>;

    /// Rolls back any open transaction, finalizes compiled commands and
    /// closes both connections. Calling it twice is a no-op.
    fn disconnect(&mut self) -> Result<(), EngineError>;

    /// Disconnects and removes the backing file.
    fn delete(&mut self) -> Result<(), EngineError>;
}
