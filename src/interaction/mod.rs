//! Builder-style facade over [`RowStore`].
//!
//! Write and update batches own the store's write transaction for their
//! lifetime: `execute` commits it, dropping the batch without executing rolls
//! it back. Readers close their cursor handle the same way.

use std::fmt;

use crate::{
    engine::{SqliteEngine, TableEngine},
    observability::log_warn,
    schema::Descriptor,
    store::{CursorHandle, RowStore, Rows, Selector, StoreError},
};

/// Fluent entry point wrapping one [`RowStore`].
pub struct Interaction<D: Descriptor, E: TableEngine = SqliteEngine> {
    store: RowStore<D, E>,
}

impl<D, E> Interaction<D, E>
where
    D: Descriptor,
    E: TableEngine,
{
    /// Wraps `store`.
    pub fn new(store: RowStore<D, E>) -> Self {
        Self { store }
    }

    /// Opens a write transaction and returns a batch that adds entities to it.
    pub fn write_transaction(&mut self) -> Result<WriteBatch<'_, D, E>, StoreError> {
        self.store.open_write_transaction()?;
        Ok(WriteBatch {
            guard: TransactionGuard::new(&mut self.store),
        })
    }

    /// Opens a write transaction and returns a batch that updates entities.
    pub fn update_transaction(&mut self) -> Result<UpdateBatch<'_, D, E>, StoreError> {
        self.store.open_write_transaction()?;
        Ok(UpdateBatch {
            guard: TransactionGuard::new(&mut self.store),
        })
    }

    /// Opens a reader over all rows, newest first.
    pub fn reader(&self) -> Result<Reader<'_, D, E>, StoreError> {
        let (handle, rows) = self.store.all_rows()?;
        Ok(Reader {
            store: &self.store,
            handle,
            rows,
            closed: false,
        })
    }

    /// See [`RowStore::get_converted_rows_between_indices`].
    pub fn converted_instances_between_indices<F>(
        &self,
        start: usize,
        end: usize,
        default: F,
        selector: Option<&dyn Selector<D::Entity>>,
    ) -> Result<Vec<D::Entity>, StoreError>
    where
        F: FnMut() -> D::Entity,
    {
        self.store
            .get_converted_rows_between_indices(start, end, default, selector)
    }

    /// See [`RowStore::get_converted_rows`].
    pub fn converted_instances(
        &self,
        selector: Option<&dyn Selector<D::Entity>>,
    ) -> Result<Vec<D::Entity>, StoreError> {
        self.store.get_converted_rows(selector)
    }

    /// See [`RowStore::row_count`].
    pub fn row_count(&self, selector: Option<&dyn Selector<D::Entity>>) -> Result<u64, StoreError> {
        self.store.row_count(selector)
    }

    /// Deletes every row.
    pub fn clear_database(&mut self) -> Result<(), StoreError> {
        self.store.clear_all_rows()
    }

    /// Disconnects the wrapped store.
    pub fn disconnect(&mut self) -> Result<(), StoreError> {
        self.store.disconnect()
    }

    /// Disconnects and deletes the backing store.
    pub fn delete(&mut self) -> Result<(), StoreError> {
        self.store.delete()
    }

    /// Wrapped store.
    pub fn store(&self) -> &RowStore<D, E> {
        &self.store
    }

    /// Wrapped store, mutably.
    pub fn store_mut(&mut self) -> &mut RowStore<D, E> {
        &mut self.store
    }

    /// Unwraps the store.
    pub fn into_inner(self) -> RowStore<D, E> {
        self.store
    }
}

impl<D: Descriptor, E: TableEngine> fmt::Debug for Interaction<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Interaction").field(&self.store).finish()
    }
}

/// Rolls the store's transaction back unless it was committed.
struct TransactionGuard<'a, D: Descriptor, E: TableEngine> {
    store: &'a mut RowStore<D, E>,
    finished: bool,
}

impl<'a, D, E> TransactionGuard<'a, D, E>
where
    D: Descriptor,
    E: TableEngine,
{
    fn new(store: &'a mut RowStore<D, E>) -> Self {
        Self {
            store,
            finished: false,
        }
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.close_write_transaction()
    }
}

impl<D: Descriptor, E: TableEngine> Drop for TransactionGuard<'_, D, E> {
    fn drop(&mut self) {
        if self.finished || !self.store.in_transaction() {
            return;
        }
        if let Err(err) = self.store.rollback_write_transaction() {
            log_warn!(
                component = "interaction",
                event = "rollback_failed",
                error = %err,
            );
        }
    }
}

/// Pending inserts inside one write transaction.
#[must_use = "dropping a batch without `execute` rolls it back"]
pub struct WriteBatch<'a, D: Descriptor, E: TableEngine = SqliteEngine> {
    guard: TransactionGuard<'a, D, E>,
}

impl<D, E> WriteBatch<'_, D, E>
where
    D: Descriptor,
    E: TableEngine,
{
    /// Adds one entity.
    pub fn with_entry(self, entity: &D::Entity) -> Result<Self, StoreError> {
        self.guard.store.add(entity)?;
        Ok(self)
    }

    /// Adds every entity of `entities`.
    pub fn with_entries<'e, I>(self, entities: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = &'e D::Entity>,
        D::Entity: 'e,
    {
        self.guard.store.add_range(entities)?;
        Ok(self)
    }

    /// Commits the batch.
    pub fn execute(mut self) -> Result<(), StoreError> {
        self.guard.commit()
    }
}

/// Pending updates inside one write transaction.
#[must_use = "dropping a batch without `execute` rolls it back"]
pub struct UpdateBatch<'a, D: Descriptor, E: TableEngine = SqliteEngine> {
    guard: TransactionGuard<'a, D, E>,
}

impl<D, E> UpdateBatch<'_, D, E>
where
    D: Descriptor,
    E: TableEngine,
{
    /// Rewrites the stored row of `entity` with its current values.
    pub fn update_entry(self, entity: &D::Entity) -> Result<Self, StoreError> {
        self.guard.store.update_row(entity)?;
        Ok(self)
    }

    /// Commits the batch.
    pub fn execute(mut self) -> Result<(), StoreError> {
        self.guard.commit()
    }
}

/// Scoped reader over all rows; closing releases its cursor handle.
pub struct Reader<'a, D: Descriptor, E: TableEngine = SqliteEngine> {
    store: &'a RowStore<D, E>,
    handle: CursorHandle,
    rows: Rows<D, E::Cursor>,
    closed: bool,
}

impl<'a, D, E> Reader<'a, D, E>
where
    D: Descriptor,
    E: TableEngine,
{
    /// Runs `action` over the rows and keeps its result until [`ReaderOutcome::close`].
    pub fn with_action<T, F>(mut self, action: F) -> ReaderOutcome<'a, D, E, T>
    where
        F: FnOnce(&mut Rows<D, E::Cursor>) -> T,
    {
        let result = action(&mut self.rows);
        ReaderOutcome {
            reader: self,
            result,
        }
    }

    /// Handle the reader is registered under.
    pub fn handle(&self) -> CursorHandle {
        self.handle
    }

    /// Closes the reader.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.store.close_row_reader(self.handle)
    }
}

impl<D: Descriptor, E: TableEngine> Drop for Reader<'_, D, E> {
    fn drop(&mut self) {
        if !self.closed {
            // Already closed by a disconnect is fine here.
            let _ = self.store.close_row_reader(self.handle);
        }
    }
}

impl<D: Descriptor, E: TableEngine> fmt::Debug for Reader<'_, D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("handle", &self.handle)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Reader whose action has run.
pub struct ReaderOutcome<'a, D: Descriptor, E: TableEngine, T> {
    reader: Reader<'a, D, E>,
    result: T,
}

impl<D, E, T> ReaderOutcome<'_, D, E, T>
where
    D: Descriptor,
    E: TableEngine,
{
    /// Closes the reader and returns the action's result.
    pub fn close(self) -> Result<T, StoreError> {
        let Self { reader, result } = self;
        reader.close()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        option::StoreOptions,
        test_util::{Reading, ReadingDescriptor},
    };

    fn interaction(dir: &TempDir) -> Interaction<ReadingDescriptor> {
        let options = StoreOptions::from(dir.path().join("facade.db"));
        Interaction::new(RowStore::open(options, ReadingDescriptor::new()).unwrap())
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let mut facade = interaction(&dir);
        let batch = [Reading::new("b", 2, 1), Reading::new("c", 3, 2)];
        facade
            .write_transaction()
            .unwrap()
            .with_entry(&Reading::new("a", 1, 0))
            .unwrap()
            .with_entries(&batch)
            .unwrap()
            .execute()
            .unwrap();

        let names = facade
            .reader()
            .unwrap()
            .with_action(|rows| {
                rows.map(|row| row.map(|row| row.name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .close()
            .unwrap()
            .unwrap();
        assert_eq!(names, ["c", "b", "a"]);
        assert_eq!(facade.store().open_reader_count(), 0);
        assert_eq!(facade.row_count(None).unwrap(), 3);
    }

    #[test]
    fn dropped_batch_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut facade = interaction(&dir);
        {
            let _batch = facade
                .write_transaction()
                .unwrap()
                .with_entry(&Reading::new("a", 1, 0))
                .unwrap();
        }
        assert!(!facade.store().in_transaction());
        assert_eq!(facade.row_count(None).unwrap(), 0);
        assert_eq!(facade.store().mapped_key_count(), 0);
    }

    #[test]
    fn update_batch_rewrites_rows() {
        let dir = TempDir::new().unwrap();
        let mut facade = interaction(&dir);
        facade
            .write_transaction()
            .unwrap()
            .with_entry(&Reading::new("a", 1, 0))
            .unwrap()
            .execute()
            .unwrap();
        facade
            .update_transaction()
            .unwrap()
            .update_entry(&Reading::new("a", 5, 0))
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(
            facade.converted_instances(None).unwrap(),
            [Reading::new("a", 5, 0)]
        );

        let missing = facade
            .update_transaction()
            .unwrap()
            .update_entry(&Reading::new("nope", 0, 0))
            .err();
        assert!(matches!(missing, Some(StoreError::UnknownKey(_))));
        assert!(!facade.store().in_transaction());
    }

    #[test]
    fn dropped_reader_releases_handle() {
        let dir = TempDir::new().unwrap();
        let mut facade = interaction(&dir);
        facade.store_mut().add(&Reading::new("a", 1, 0)).unwrap();
        {
            let reader = facade.reader().unwrap();
            assert_eq!(facade.store().open_reader_count(), 1);
            let _ = reader.with_action(|rows| rows.count());
        }
        assert_eq!(facade.store().open_reader_count(), 0);
        facade.reader().unwrap().close().unwrap();

        facade.clear_database().unwrap();
        let window = facade
            .converted_instances_between_indices(0, 1, Reading::placeholder, None)
            .unwrap();
        assert_eq!(window, [Reading::placeholder(), Reading::placeholder()]);
        facade.delete().unwrap();
        assert!(!dir.path().join("facade.db").exists());
    }
}
