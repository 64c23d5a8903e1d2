#![deny(missing_docs)]
//! Typed embedded row store over SQLite.
//!
//! Callers describe an entity type with a [`Descriptor`], open a [`RowStore`]
//! on a file and read and write whole entities. Every row gets an engine owned
//! `Id` and a sortable `DateTime` stamp; scans are lazy and ordered newest
//! first. Reads can be post-filtered in memory by closures or by rule trees
//! from [`rules`].
//!
//! ```no_run
//! # fn demo<D: rowstore::Descriptor>(descriptor: D, entity: D::Entity) -> Result<(), rowstore::StoreError> {
//! use rowstore::{RowStore, StoreOptions};
//!
//! let mut store = RowStore::open(StoreOptions::from("readings.db"), descriptor)?;
//! store.add(&entity)?;
//! let newest = store.get_converted_rows(None)?;
//! # let _ = newest;
//! # Ok(())
//! # }
//! ```

mod observability;
mod option;
#[cfg(test)]
mod test_util;

/// Low-level table engine: schema provisioning, compiled commands, cursors.
pub mod engine;

/// Builder-style facade with scoped transactions and readers.
pub mod interaction;

/// Column descriptors and the cell/row types exchanged with the engine.
pub mod schema;

/// Entity-typed store.
pub mod store;

/// Sortable tick encoding of row timestamps.
pub mod timestamp;

/// Storage-independent predicate rules.
pub use rowstore_rules as rules;

pub use crate::{
    engine::{EngineError, SqliteEngine, TableEngine},
    interaction::Interaction,
    option::{JournalMode, StoreOptions},
    schema::{ColumnSpec, ColumnType, ColumnValue, Descriptor, RowValues, SchemaError, StoredRow},
    store::{CursorHandle, HaltHandle, RowStore, Rows, RuleSelector, Selector, StoreError},
};
