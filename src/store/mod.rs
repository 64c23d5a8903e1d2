//! Typed row store: entity-level CRUD and scans over one table engine.

mod error;
mod registry;
mod selector;

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

pub use error::StoreError;
pub use registry::CursorHandle;
use registry::{ReaderFlag, ReaderRegistry};
pub use selector::{RuleSelector, Selector};

use crate::{
    engine::{RowOrdering, SqliteEngine, TableEngine, WriteTransaction},
    observability::{log_debug, log_info, log_warn},
    option::StoreOptions,
    schema::{
        ColumnType, Descriptor, RowValues, StoredRow, DATE_TIME_COLUMN, ID_COLUMN,
        IS_FILTERED_OUT_COLUMN, MAIN_TABLE,
    },
    timestamp,
};

const INSERT_ROW_COMMAND: &str = "insertRow";
const UPDATE_ROW_COMMAND: &str = "updateRow";
const UPDATE_FILTER_STATUS_COMMAND: &str = "updateRowFilterStatus";
const NOT_FILTERED_OUT: &str = "COALESCE(IsFilteredOut, 0) = 0";

/// Cooperative stop request for batch writes.
///
/// Clones share one flag. Once halted, [`RowStore::add_range`] stops between
/// entities and [`RowStore::update_row`] refuses to run until
/// [`HaltHandle::resume`] is called. Disconnecting a store halts it for good.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    /// Requests that in-flight batch writes stop.
    pub fn halt(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears a previous halt request.
    pub fn resume(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether a halt was requested.
    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Lazy, forward-only sequence of converted entities.
///
/// Returned by [`RowStore::all_rows`] and [`RowStore::filtered_rows`]; ends
/// early once its handle is closed or the store disconnects.
pub struct Rows<D: Descriptor, C> {
    descriptor: Arc<D>,
    cursor: C,
    flag: Option<ReaderFlag>,
}

impl<D, C> Rows<D, C>
where
    D: Descriptor,
{
    fn convert(&self, row: StoredRow) -> Result<D::Entity, StoreError> {
        Ok(self.descriptor.from_row(&row)?)
    }
}

impl<D, C, EngineErr> Iterator for Rows<D, C>
where
    D: Descriptor,
    C: Iterator<Item = Result<StoredRow, EngineErr>>,
    StoreError: From<EngineErr>,
{
    type Item = Result<D::Entity, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.flag.as_ref().is_some_and(|flag| !flag.is_open()) {
            return None;
        }
        Some(match self.cursor.next()? {
            Ok(row) => self.convert(row),
            Err(err) => Err(err.into()),
        })
    }
}

impl<D: Descriptor, C> fmt::Debug for Rows<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("registered", &self.flag.is_some())
            .finish()
    }
}

/// Entity-typed store over one table of one [`TableEngine`].
///
/// Rows get a store-assigned `Id` (strictly increasing, never reused within
/// the store's lifetime) and a `DateTime` stamp from the descriptor. Updates
/// are addressed by the descriptor's logical key through an in-memory
/// key to `Id` mapping rebuilt on open.
///
/// Only one write transaction is open at a time. Writes inside it become
/// visible to readers opened after commit.
pub struct RowStore<D: Descriptor, E: TableEngine = SqliteEngine> {
    engine: E,
    descriptor: Arc<D>,
    primary_keys: HashMap<String, i64>,
    next_row_id: i64,
    readers: ReaderRegistry,
    transaction: Option<WriteTransaction>,
    undo: Vec<(String, Option<i64>)>,
    halt: HaltHandle,
    connected: bool,
}

impl<D: Descriptor> RowStore<D, SqliteEngine> {
    /// Opens (or creates) the SQLite store at `options.path`.
    pub fn open(options: StoreOptions, descriptor: D) -> Result<Self, StoreError> {
        let engine = SqliteEngine::open(&options)?;
        Self::with_engine(engine, descriptor, options.recreate)
    }
}

impl<D, E> RowStore<D, E>
where
    D: Descriptor,
    E: TableEngine,
{
    /// Provisions the schema on `engine` and, unless `recreate` is set,
    /// rebuilds the key mapping with a full scan.
    pub fn with_engine(mut engine: E, descriptor: D, recreate: bool) -> Result<Self, StoreError> {
        let tracks_filter_state = descriptor.tracks_filter_state();
        let mut columns: Vec<(&str, ColumnType)> = descriptor
            .columns()
            .iter()
            .map(|column| (column.name.as_str(), column.column_type))
            .collect();
        columns.push((DATE_TIME_COLUMN, ColumnType::Text));
        if tracks_filter_state {
            columns.push((IS_FILTERED_OUT_COLUMN, ColumnType::Integer));
        }
        columns.push((ID_COLUMN, ColumnType::Integer));

        let mut index_columns: Vec<&str> = descriptor
            .columns()
            .iter()
            .filter(|column| column.indexed)
            .map(|column| column.name.as_str())
            .collect();
        index_columns.push(ID_COLUMN);

        let params: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();

        engine.add_table_and_columns(MAIN_TABLE, &columns, &index_columns)?;
        engine.set_up_insert_command(MAIN_TABLE, INSERT_ROW_COMMAND, &params)?;
        engine.set_up_update_command(MAIN_TABLE, UPDATE_ROW_COMMAND, &params, ID_COLUMN)?;
        if tracks_filter_state {
            engine.set_up_update_command(
                MAIN_TABLE,
                UPDATE_FILTER_STATUS_COMMAND,
                &[IS_FILTERED_OUT_COLUMN, ID_COLUMN],
                ID_COLUMN,
            )?;
        }
        let next_row_id = engine.max_id(MAIN_TABLE)?.map_or(0, |max| max + 1);

        let mut store = Self {
            engine,
            descriptor: Arc::new(descriptor),
            primary_keys: HashMap::new(),
            next_row_id,
            readers: ReaderRegistry::default(),
            transaction: None,
            undo: Vec::new(),
            halt: HaltHandle::default(),
            connected: true,
        };
        if !recreate {
            store.rebuild_primary_keys()?;
        }
        log_info!(
            component = "store",
            event = "opened",
            database = store.engine.name(),
            rows = store.primary_keys.len(),
            next_row_id = store.next_row_id,
            recreate,
        );
        Ok(store)
    }

    fn rebuild_primary_keys(&mut self) -> Result<(), StoreError> {
        let cursor = self
            .engine
            .get_rows(MAIN_TABLE, None, &RowOrdering::ascending(ID_COLUMN))?;
        for row in cursor {
            let row = row?;
            let entity = self.descriptor.from_row(&row)?;
            self.primary_keys
                .insert(self.descriptor.primary_key(&entity), row.id()?);
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    fn scan(
        &self,
        condition: Option<&str>,
        ordering: RowOrdering,
    ) -> Result<Rows<D, E::Cursor>, StoreError> {
        self.ensure_connected()?;
        let cursor = self.engine.get_rows(MAIN_TABLE, condition, &ordering)?;
        Ok(Rows {
            descriptor: Arc::clone(&self.descriptor),
            cursor,
            flag: None,
        })
    }

    fn register(&self, mut rows: Rows<D, E::Cursor>) -> (CursorHandle, Rows<D, E::Cursor>) {
        let (handle, flag) = self.readers.register();
        rows.flag = Some(flag);
        log_debug!(
            component = "store",
            event = "reader_opened",
            handle = handle.get(),
            open = self.readers.open_count(),
        );
        (handle, rows)
    }

    /// Opens a reader over every row, newest `DateTime` first.
    ///
    /// The handle must be passed to [`RowStore::close_row_reader`] once the
    /// caller is done; each call opens an independent cursor.
    pub fn all_rows(&self) -> Result<(CursorHandle, Rows<D, E::Cursor>), StoreError> {
        let rows = self.scan(None, RowOrdering::descending(DATE_TIME_COLUMN))?;
        Ok(self.register(rows))
    }

    /// Closes a reader opened by this store.
    pub fn close_row_reader(&self, handle: CursorHandle) -> Result<(), StoreError> {
        if self.readers.close(handle) {
            log_debug!(component = "store", event = "reader_closed", handle = handle.get());
            Ok(())
        } else {
            Err(StoreError::UnknownCursor(handle))
        }
    }

    /// Number of readers opened and not yet closed.
    pub fn open_reader_count(&self) -> usize {
        self.readers.open_count()
    }

    /// Counts committed rows.
    ///
    /// Without a selector this is a native `COUNT(*)`. With one, every row is
    /// scanned and converted so the selector can run in memory.
    pub fn row_count(
        &self,
        selector: Option<&dyn Selector<D::Entity>>,
    ) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        let Some(selector) = selector else {
            return Ok(self.engine.row_count(MAIN_TABLE, None)?);
        };
        let mut count = 0;
        for entity in self.scan(None, RowOrdering::descending(DATE_TIME_COLUMN))? {
            if selector.select(&entity?)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn row_values(&self, entity: &D::Entity, id: i64) -> Result<RowValues, StoreError> {
        let mut values = self.descriptor.to_row(entity);
        values.set(DATE_TIME_COLUMN, timestamp::encode(self.descriptor.date(entity))?);
        if self.descriptor.tracks_filter_state() {
            values.set(IS_FILTERED_OUT_COLUMN, self.descriptor.is_filtered_out(entity));
        }
        values.set(ID_COLUMN, id);
        Ok(values)
    }

    fn remember_key(&mut self, key: String, id: i64) {
        let previous = self.primary_keys.insert(key.clone(), id);
        if self.transaction.is_some() {
            self.undo.push((key, previous));
        }
    }

    fn restore_keys(&mut self) {
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(id) => self.primary_keys.insert(key, id),
                None => self.primary_keys.remove(&key),
            };
        }
    }

    /// Inserts one entity, inside the open write transaction if there is one.
    /// Returns the assigned `Id`.
    pub fn add(&mut self, entity: &D::Entity) -> Result<i64, StoreError> {
        self.ensure_connected()?;
        let id = self.next_row_id;
        let values = self.row_values(entity, id)?;
        self.engine
            .execute_insert_command(INSERT_ROW_COMMAND, &values, self.transaction.as_ref())?;
        self.next_row_id += 1;
        let key = self.descriptor.primary_key(entity);
        self.remember_key(key, id);
        Ok(id)
    }

    /// Inserts a batch in one transaction and returns how many were written.
    ///
    /// Joins the open write transaction if there is one; otherwise opens its
    /// own, commits on success and rolls back on failure. A halt request stops
    /// the batch between entities and commits what was inserted.
    pub fn add_range<'a, I>(&mut self, entities: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a D::Entity>,
        D::Entity: 'a,
    {
        self.ensure_connected()?;
        let owns_transaction = self.transaction.is_none();
        if owns_transaction {
            self.open_write_transaction()?;
        }

        let mut inserted = 0;
        let mut failure = None;
        for entity in entities {
            if self.halt.is_halted() {
                log_warn!(component = "store", event = "batch_halted", inserted);
                break;
            }
            match self.add(entity) {
                Ok(_) => inserted += 1,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        match failure {
            None if owns_transaction => self.close_write_transaction()?,
            None => {}
            Some(err) => {
                if owns_transaction {
                    if let Err(rollback) = self.rollback_write_transaction() {
                        log_warn!(
                            component = "store",
                            event = "batch_rollback_failed",
                            error = %rollback,
                        );
                    }
                }
                return Err(err);
            }
        }
        log_debug!(component = "store", event = "batch_inserted", inserted);
        Ok(inserted)
    }

    /// Opens the store's single write transaction.
    pub fn open_write_transaction(&mut self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        if self.transaction.is_some() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        self.transaction = Some(self.engine.open_write_transaction()?);
        self.undo.clear();
        Ok(())
    }

    /// Commits the open write transaction.
    pub fn close_write_transaction(&mut self) -> Result<(), StoreError> {
        let transaction = self
            .transaction
            .take()
            .ok_or(StoreError::NoOpenTransaction)?;
        if let Err(err) = self.engine.commit_transaction(transaction) {
            self.restore_keys();
            return Err(err.into());
        }
        self.undo.clear();
        Ok(())
    }

    /// Rolls back the open write transaction and forgets the keys it mapped.
    pub fn rollback_write_transaction(&mut self) -> Result<(), StoreError> {
        let transaction = self
            .transaction
            .take()
            .ok_or(StoreError::NoOpenTransaction)?;
        let result = self.engine.rollback_transaction(transaction);
        self.restore_keys();
        Ok(result?)
    }

    /// Whether a write transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn mapped_id(&self, entity: &D::Entity) -> Result<i64, StoreError> {
        let key = self.descriptor.primary_key(entity);
        self.primary_keys
            .get(&key)
            .copied()
            .ok_or(StoreError::UnknownKey(key))
    }

    /// Rewrites the row previously inserted under the entity's logical key,
    /// keeping its `Id`. A tracked filter flag is rewritten too.
    pub fn update_row(&mut self, entity: &D::Entity) -> Result<(), StoreError> {
        self.ensure_connected()?;
        if self.halt.is_halted() {
            return Err(StoreError::Halted);
        }
        let id = self.mapped_id(entity)?;
        let values = self.row_values(entity, id)?;
        let changed = self.engine.execute_update_command(
            UPDATE_ROW_COMMAND,
            &values,
            self.transaction.as_ref(),
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownKey(self.descriptor.primary_key(entity)));
        }
        Ok(())
    }

    /// Returns the inclusive window `[start, end]` of the rows accepted by
    /// `selector`, newest first.
    ///
    /// Indices count accepted rows only. The result always holds
    /// `end - start + 1` entities; missing slots are filled by `default`.
    pub fn get_converted_rows_between_indices<F>(
        &self,
        start: usize,
        end: usize,
        default: F,
        selector: Option<&dyn Selector<D::Entity>>,
    ) -> Result<Vec<D::Entity>, StoreError>
    where
        F: FnMut() -> D::Entity,
    {
        let width = window_width(start, end)?;
        let rows = self.scan(None, RowOrdering::descending(DATE_TIME_COLUMN))?;
        collect_window(rows, start, width, default, selector)
    }

    /// Every row accepted by `selector`, newest first.
    pub fn get_converted_rows(
        &self,
        selector: Option<&dyn Selector<D::Entity>>,
    ) -> Result<Vec<D::Entity>, StoreError> {
        let rows = self.scan(None, RowOrdering::descending(DATE_TIME_COLUMN))?;
        collect_selected(rows, selector)
    }

    /// Deletes every row and forgets every key. Row ids keep increasing.
    pub fn clear_all_rows(&mut self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.engine.clear(MAIN_TABLE)?;
        let cleared = std::mem::take(&mut self.primary_keys);
        if self.transaction.is_some() {
            self.undo
                .extend(cleared.into_iter().map(|(key, id)| (key, Some(id))));
        }
        Ok(())
    }

    fn require_filter_state(&self) -> Result<(), StoreError> {
        if self.descriptor.tracks_filter_state() {
            Ok(())
        } else {
            Err(StoreError::FilterStateUntracked)
        }
    }

    /// Opens a reader over rows not flagged `IsFilteredOut`, oldest first.
    pub fn filtered_rows(&self) -> Result<(CursorHandle, Rows<D, E::Cursor>), StoreError> {
        self.require_filter_state()?;
        let rows = self.scan(
            Some(NOT_FILTERED_OUT),
            RowOrdering::ascending(DATE_TIME_COLUMN),
        )?;
        Ok(self.register(rows))
    }

    /// Inclusive window `[start, end]` over rows not flagged `IsFilteredOut`,
    /// oldest first, padded by `default` like
    /// [`RowStore::get_converted_rows_between_indices`].
    pub fn filtered_converted_rows_between_indices<F>(
        &self,
        start: usize,
        end: usize,
        default: F,
    ) -> Result<Vec<D::Entity>, StoreError>
    where
        F: FnMut() -> D::Entity,
    {
        self.require_filter_state()?;
        let width = window_width(start, end)?;
        let rows = self.scan(
            Some(NOT_FILTERED_OUT),
            RowOrdering::ascending(DATE_TIME_COLUMN),
        )?;
        collect_window(rows, start, width, default, None)
    }

    /// Every row not flagged `IsFilteredOut`, oldest first.
    pub fn filtered_converted_rows(&self) -> Result<Vec<D::Entity>, StoreError> {
        self.require_filter_state()?;
        let rows = self.scan(
            Some(NOT_FILTERED_OUT),
            RowOrdering::ascending(DATE_TIME_COLUMN),
        )?;
        collect_selected(rows, None)
    }

    /// Counts rows not flagged `IsFilteredOut`.
    pub fn filtered_row_count(&self) -> Result<u64, StoreError> {
        self.require_filter_state()?;
        self.ensure_connected()?;
        Ok(self.engine.row_count(MAIN_TABLE, Some(NOT_FILTERED_OUT))?)
    }

    /// Writes the entity's current filter flag to its row.
    pub fn update_row_filter_status(&mut self, entity: &D::Entity) -> Result<(), StoreError> {
        self.require_filter_state()?;
        self.ensure_connected()?;
        let id = self.mapped_id(entity)?;
        let values = RowValues::new()
            .with(IS_FILTERED_OUT_COLUMN, self.descriptor.is_filtered_out(entity))
            .with(ID_COLUMN, id);
        self.engine.execute_update_command(
            UPDATE_FILTER_STATUS_COMMAND,
            &values,
            self.transaction.as_ref(),
        )?;
        Ok(())
    }

    /// Halts batch writes, closes every reader and disconnects the engine.
    /// An open write transaction is rolled back. Idempotent.
    pub fn disconnect(&mut self) -> Result<(), StoreError> {
        if !self.connected {
            return Ok(());
        }
        self.halt.halt();
        self.connected = false;
        let readers = self.readers.close_all();
        if self.transaction.take().is_some() {
            self.restore_keys();
        }
        self.engine.disconnect()?;
        log_info!(
            component = "store",
            event = "disconnected",
            database = self.engine.name(),
            closed_readers = readers,
        );
        Ok(())
    }

    /// Disconnects and removes the backing store.
    pub fn delete(&mut self) -> Result<(), StoreError> {
        self.disconnect()?;
        self.engine.delete()?;
        Ok(())
    }

    /// File name of the backing store.
    pub fn database_name(&self) -> &str {
        self.engine.name()
    }

    /// Handle that can halt this store's batch writes from another thread.
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Descriptor the store was opened with.
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// Number of logical keys currently mapped.
    pub fn mapped_key_count(&self) -> usize {
        self.primary_keys.len()
    }

    /// Row id mapped to `key`, if any.
    pub fn row_id_of(&self, key: &str) -> Option<i64> {
        self.primary_keys.get(key).copied()
    }
}

/// Item count of the inclusive window `[start, end]`.
fn window_width(start: usize, end: usize) -> Result<usize, StoreError> {
    end.checked_sub(start)
        .and_then(|span| span.checked_add(1))
        .ok_or(StoreError::InvalidWindow { start, end })
}

fn collect_window<T, I, F>(
    rows: I,
    start: usize,
    width: usize,
    mut default: F,
    selector: Option<&dyn Selector<T>>,
) -> Result<Vec<T>, StoreError>
where
    I: IntoIterator<Item = Result<T, StoreError>>,
    F: FnMut() -> T,
{
    let mut window = Vec::new();
    let mut index = 0;
    for entity in rows {
        let entity = entity?;
        if let Some(selector) = selector {
            if !selector.select(&entity)? {
                continue;
            }
        }
        if index >= start {
            window.push(entity);
            if window.len() == width {
                break;
            }
        }
        index += 1;
    }
    let padding = width - window.len();
    window.extend(std::iter::repeat_with(&mut default).take(padding));
    Ok(window)
}

fn collect_selected<T, I>(
    rows: I,
    selector: Option<&dyn Selector<T>>,
) -> Result<Vec<T>, StoreError>
where
    I: IntoIterator<Item = Result<T, StoreError>>,
{
    let mut selected = Vec::new();
    for entity in rows {
        let entity = entity?;
        let accepted = match selector {
            Some(selector) => selector.select(&entity)?,
            None => true,
        };
        if accepted {
            selected.push(entity);
        }
    }
    Ok(selected)
}

impl<D: Descriptor, E: TableEngine> fmt::Debug for RowStore<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStore")
            .field("database", &self.engine.name())
            .field("mapped_keys", &self.primary_keys.len())
            .field("next_row_id", &self.next_row_id)
            .field("open_readers", &self.readers.open_count())
            .field("in_transaction", &self.transaction.is_some())
            .field("connected", &self.connected)
            .finish()
    }
}
