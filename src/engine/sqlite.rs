use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use rusqlite::{types::ToSql, Connection};

use super::{ident, EngineError, RowCursor, RowOrdering, TableEngine, WriteTransaction};
use crate::{
    observability::{log_debug, log_info, log_warn},
    option::StoreOptions,
    schema::{ColumnType, RowValues, ID_COLUMN},
};

/// A compiled command: SQL text plus its parameters in binding order.
#[derive(Debug)]
struct Command {
    sql: String,
    params: Vec<String>,
    placeholders: Vec<String>,
}

impl Command {
    fn new(sql: String, params: Vec<String>) -> Self {
        let placeholders = params.iter().map(|param| format!(":{param}")).collect();
        Self {
            sql,
            params,
            placeholders,
        }
    }
}

/// [`TableEngine`] over one SQLite file with a reader and a writer connection.
///
/// Readers never hold a statement open between cursor pages, so open
/// cursors do not block the writer.
pub struct SqliteEngine {
    path: PathBuf,
    name: String,
    reader: Arc<Mutex<Option<Connection>>>,
    writer: Option<Connection>,
    tables: HashMap<String, HashSet<String>>,
    commands: HashMap<String, Command>,
    active: Option<u64>,
    next_transaction: u64,
    read_page_size: usize,
}

impl SqliteEngine {
    /// Opens both connections, removing the existing file first when
    /// `options` asks to recreate it.
    pub fn open(options: &StoreOptions) -> Result<Self, EngineError> {
        if options.recreate {
            remove_database_files(&options.path)?;
        }
        let writer = connect(options)?;
        let reader = connect(options)?;
        let name = options
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        log_info!(
            component = "engine",
            event = "connected",
            path = %options.path.display(),
            recreate = options.recreate,
            journal_mode = options.journal_mode.pragma_value(),
        );

        Ok(Self {
            path: options.path.clone(),
            name,
            reader: Arc::new(Mutex::new(Some(reader))),
            writer: Some(writer),
            tables: HashMap::new(),
            commands: HashMap::new(),
            active: None,
            next_transaction: 0,
            read_page_size: options.read_page_size,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> Result<&Connection, EngineError> {
        self.writer.as_ref().ok_or(EngineError::Disconnected)
    }

    fn with_reader<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let guard = self
            .reader
            .lock()
            .expect("reader connection mutex should not be poisoned");
        let connection = guard.as_ref().ok_or(EngineError::Disconnected)?;
        f(connection)
    }

    fn check_transaction(&self, transaction: Option<&WriteTransaction>) -> Result<(), EngineError> {
        match transaction {
            Some(transaction) if self.active != Some(transaction.id()) => {
                Err(EngineError::StaleTransaction(transaction.id()))
            }
            _ => Ok(()),
        }
    }

    fn finish_transaction(
        &mut self,
        transaction: WriteTransaction,
        sql: &str,
    ) -> Result<(), EngineError> {
        match self.active {
            None => return Err(EngineError::NoActiveTransaction),
            Some(active) if active != transaction.id() => {
                return Err(EngineError::StaleTransaction(transaction.id()))
            }
            Some(_) => {}
        }
        let writer = self.writer.as_ref().ok_or(EngineError::Disconnected)?;
        let result = writer.execute_batch(sql);
        if result.is_err() && !writer.is_autocommit() {
            log_warn!(
                component = "engine",
                event = "transaction_end_failed",
                transaction = transaction.id(),
                statement = sql,
            );
            if let Err(err) = writer.execute_batch("ROLLBACK;") {
                log_warn!(
                    component = "engine",
                    event = "rollback_after_failed_end_failed",
                    transaction = transaction.id(),
                    error = %err,
                );
            }
        }
        self.active = None;
        result?;
        log_debug!(
            component = "engine",
            event = "transaction_closed",
            transaction = transaction.id(),
            statement = sql,
        );
        Ok(())
    }

    fn execute_command(
        &self,
        command: &str,
        values: &RowValues,
        transaction: Option<&WriteTransaction>,
    ) -> Result<usize, EngineError> {
        self.check_transaction(transaction)?;
        let compiled = self
            .commands
            .get(command)
            .ok_or_else(|| EngineError::UnknownCommand(command.to_string()))?;

        if let Some((column, _)) = values
            .iter()
            .find(|(column, _)| !compiled.params.iter().any(|param| param.as_str() == *column))
        {
            return Err(EngineError::UnknownParameter {
                command: command.to_string(),
                parameter: column.to_string(),
            });
        }

        let mut bound: Vec<(&str, &dyn ToSql)> = Vec::with_capacity(compiled.params.len());
        for (param, placeholder) in compiled.params.iter().zip(&compiled.placeholders) {
            let value = values
                .get(param)
                .ok_or_else(|| EngineError::MissingParameter {
                    command: command.to_string(),
                    parameter: param.clone(),
                })?;
            bound.push((placeholder.as_str(), value as &dyn ToSql));
        }

        let mut statement = self.writer()?.prepare_cached(&compiled.sql)?;
        Ok(statement.execute(bound.as_slice())?)
    }

    fn close_connection(connection: Connection) -> Result<(), EngineError> {
        connection.flush_prepared_statement_cache();
        connection.close().map_err(|(_, err)| EngineError::Sqlite(err))
    }
}

fn connect(options: &StoreOptions) -> Result<Connection, EngineError> {
    let connection = Connection::open(&options.path)?;
    connection.busy_timeout(options.busy_timeout)?;
    connection.set_prepared_statement_cache_capacity(options.statement_cache_capacity);
    connection.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        options.journal_mode.pragma_value()
    ))?;
    Ok(connection)
}

fn remove_database_files(path: &Path) -> Result<(), EngineError> {
    let mut sidecars = Vec::with_capacity(3);
    sidecars.push(path.to_path_buf());
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        sidecars.push(PathBuf::from(name));
    }
    for file in sidecars {
        match fs::remove_file(&file) {
            Ok(()) => log_debug!(
                component = "engine",
                event = "file_removed",
                path = %file.display(),
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains("duplicate column name")
    )
}

fn where_clause(condition: Option<&str>) -> String {
    match condition {
        Some(condition) if !condition.trim().is_empty() => format!(" WHERE ({condition})"),
        _ => String::new(),
    }
}

impl TableEngine for SqliteEngine {
    type Cursor = RowCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn add_table_and_columns(
        &mut self,
        table: &str,
        columns: &[(&str, ColumnType)],
        index_columns: &[&str],
    ) -> Result<(), EngineError> {
        ident::check(table)?;
        ident::check_all(columns.iter().map(|(name, _)| *name))?;
        ident::check_all(index_columns.iter().copied())?;

        let writer = self.writer.as_ref().ok_or(EngineError::Disconnected)?;
        let known = match self.tables.entry(table.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                writer.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} ({ID_COLUMN} INTEGER);"
                ))?;
                let mut statement = writer.prepare(&format!("PRAGMA table_info({table});"))?;
                let existing = statement
                    .query_map([], |row| row.get::<_, String>(1))?
                    .collect::<Result<HashSet<_>, _>>()?;
                entry.insert(existing)
            }
        };

        for (column, column_type) in columns {
            if known.contains(*column) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {table} ADD COLUMN {column} {};",
                column_type.sql()
            );
            match writer.execute_batch(&sql) {
                Ok(()) => log_debug!(
                    component = "engine",
                    event = "column_added",
                    table,
                    column = *column,
                    column_type = column_type.sql(),
                ),
                Err(err) if is_duplicate_column(&err) => log_debug!(
                    component = "engine",
                    event = "column_exists",
                    table,
                    column = *column,
                ),
                Err(err) => return Err(err.into()),
            }
            known.insert((*column).to_string());
        }

        for column in index_columns {
            self.index_column(table, &format!("{column}Index"), column)?;
        }
        Ok(())
    }

    fn set_up_insert_command(
        &mut self,
        table: &str,
        command: &str,
        params: &[&str],
    ) -> Result<(), EngineError> {
        ident::check(table)?;
        ident::check(command)?;
        ident::check_all(params.iter().copied())?;

        let columns = params.join(", ");
        let values = params
            .iter()
            .map(|param| format!(":{param}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {table} ({columns}) VALUES ({values});");
        self.writer()?.prepare_cached(&sql)?;

        log_debug!(component = "engine", event = "command_compiled", command, sql = %sql);
        self.commands.insert(
            command.to_string(),
            Command::new(sql, params.iter().map(|p| p.to_string()).collect()),
        );
        Ok(())
    }

    fn set_up_update_command(
        &mut self,
        table: &str,
        command: &str,
        params: &[&str],
        key_param: &str,
    ) -> Result<(), EngineError> {
        ident::check(table)?;
        ident::check(command)?;
        ident::check(key_param)?;
        ident::check_all(params.iter().copied())?;

        let assignments = params
            .iter()
            .filter(|param| **param != key_param)
            .map(|param| format!("{param} = :{param}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {table} SET {assignments} WHERE {key_param} = :{key_param};");
        self.writer()?.prepare_cached(&sql)?;

        let mut bound: Vec<String> = params
            .iter()
            .filter(|param| **param != key_param)
            .map(|param| param.to_string())
            .collect();
        bound.push(key_param.to_string());

        log_debug!(component = "engine", event = "command_compiled", command, sql = %sql);
        self.commands
            .insert(command.to_string(), Command::new(sql, bound));
        Ok(())
    }

    fn execute_insert_command(
        &mut self,
        command: &str,
        values: &RowValues,
        transaction: Option<&WriteTransaction>,
    ) -> Result<usize, EngineError> {
        self.execute_command(command, values, transaction)
    }

    fn execute_update_command(
        &mut self,
        command: &str,
        values: &RowValues,
        transaction: Option<&WriteTransaction>,
    ) -> Result<usize, EngineError> {
        self.execute_command(command, values, transaction)
    }

    fn open_write_transaction(&mut self) -> Result<WriteTransaction, EngineError> {
        if self.active.is_some() {
            return Err(EngineError::TransactionActive);
        }
        self.writer()?.execute_batch("BEGIN IMMEDIATE;")?;
        let id = self.next_transaction;
        self.next_transaction += 1;
        self.active = Some(id);
        log_debug!(component = "engine", event = "transaction_opened", transaction = id);
        Ok(WriteTransaction::new(id))
    }

    fn commit_transaction(&mut self, transaction: WriteTransaction) -> Result<(), EngineError> {
        self.finish_transaction(transaction, "COMMIT;")
    }

    fn rollback_transaction(&mut self, transaction: WriteTransaction) -> Result<(), EngineError> {
        self.finish_transaction(transaction, "ROLLBACK;")
    }

    fn row_count(&self, table: &str, condition: Option<&str>) -> Result<u64, EngineError> {
        ident::check(table)?;
        let sql = format!("SELECT COUNT(*) FROM {table}{};", where_clause(condition));
        self.with_reader(|reader| {
            let count: i64 = reader.prepare_cached(&sql)?.query_row([], |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    fn get_rows(
        &self,
        table: &str,
        condition: Option<&str>,
        ordering: &RowOrdering,
    ) -> Result<RowCursor, EngineError> {
        ident::check(table)?;
        ident::check(&ordering.column)?;
        RowCursor::open(
            Arc::clone(&self.reader),
            table,
            condition.filter(|c| !c.trim().is_empty()),
            ordering,
            self.read_page_size,
        )
    }

    fn max_id(&self, table: &str) -> Result<Option<i64>, EngineError> {
        ident::check(table)?;
        let sql = format!("SELECT MAX({ID_COLUMN}) FROM {table};");
        self.with_reader(|reader| Ok(reader.prepare_cached(&sql)?.query_row([], |row| row.get(0))?))
    }

    fn clear(&mut self, table: &str) -> Result<(), EngineError> {
        ident::check(table)?;
        let removed = self.writer()?.execute(&format!("DELETE FROM {table};"), [])?;
        log_info!(component = "engine", event = "table_cleared", table, rows = removed);
        Ok(())
    }

    fn index_column(
        &mut self,
        table: &str,
        index_name: &str,
        column: &str,
    ) -> Result<(), EngineError> {
        ident::check_all([table, index_name, column])?;
        self.writer()?.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {index_name} ON {table} ({column});"
        ))?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), EngineError> {
        let writer = self.writer.take();
        let reader = self
            .reader
            .lock()
            .expect("reader connection mutex should not be poisoned")
            .take();
        if writer.is_none() && reader.is_none() {
            return Ok(());
        }

        if let (Some(writer), Some(transaction)) = (writer.as_ref(), self.active.take()) {
            log_warn!(
                component = "engine",
                event = "transaction_rolled_back_on_disconnect",
                transaction,
            );
            writer.execute_batch("ROLLBACK;")?;
        }
        self.commands.clear();
        self.tables.clear();

        let mut first_error = None;
        for connection in [writer, reader].into_iter().flatten() {
            if let Err(err) = Self::close_connection(connection) {
                first_error.get_or_insert(err);
            }
        }
        log_info!(component = "engine", event = "disconnected", path = %self.path.display());
        first_error.map_or(Ok(()), Err)
    }

    fn delete(&mut self) -> Result<(), EngineError> {
        self.disconnect()?;
        remove_database_files(&self.path)?;
        log_info!(component = "engine", event = "deleted", path = %self.path.display());
        Ok(())
    }
}

impl Drop for SqliteEngine {
    fn drop(&mut self) {
        if let Err(err) = self.disconnect() {
            log_warn!(component = "engine", event = "disconnect_on_drop_failed", error = %err);
        }
    }
}
