use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex},
};

use rusqlite::{params_from_iter, Connection};

use super::{EngineError, RowOrdering};
use crate::{
    observability::log_debug,
    schema::{ColumnValue, StoredRow, ID_COLUMN},
};

/// Upper bound on ids bound into one page query.
const MAX_PAGE_IDS: usize = 999;

/// Lazy forward-only cursor over one table.
///
/// Opening the cursor snapshots the ordered list of matching `Id`s; rows are
/// then fetched by id, one page at a time. Each row present at open is
/// yielded at most once and in its open-time position, whatever later writes
/// do to the ordering column. Values are read when the page is fetched.
/// Rows inserted after open are never yielded and rows deleted before their
/// page is fetched are skipped. No statement stays open between pages.
pub struct RowCursor {
    reader: Arc<Mutex<Option<Connection>>>,
    table: String,
    page_size: usize,
    pending: VecDeque<i64>,
    columns: Option<Arc<[String]>>,
    buffer: VecDeque<StoredRow>,
}

impl RowCursor {
    pub(crate) fn open(
        reader: Arc<Mutex<Option<Connection>>>,
        table: &str,
        condition: Option<&str>,
        ordering: &RowOrdering,
        page_size: usize,
    ) -> Result<Self, EngineError> {
        let column = &ordering.column;
        let direction = ordering.direction.sql();
        let filter = condition
            .map(|condition| format!(" WHERE ({condition})"))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {ID_COLUMN} FROM {table}{filter} \
             ORDER BY {column} {direction}, {ID_COLUMN} {direction};"
        );

        let pending = {
            let guard = reader
                .lock()
                .expect("reader connection mutex should not be poisoned");
            let connection = guard.as_ref().ok_or(EngineError::Disconnected)?;
            let mut statement = connection.prepare_cached(&sql)?;
            let ids = statement
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<Result<VecDeque<_>, _>>()?;
            ids
        };
        log_debug!(
            component = "cursor",
            event = "opened",
            table,
            rows = pending.len(),
            filtered = condition.is_some(),
        );

        Ok(Self {
            reader,
            table: table.to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_IDS),
            pending,
            columns: None,
            buffer: VecDeque::new(),
        })
    }

    /// Rows not yet yielded, counting ones that may have been deleted since open.
    pub fn remaining(&self) -> usize {
        self.pending.len() + self.buffer.len()
    }

    fn fetch_page(&mut self) -> Result<(), EngineError> {
        let take = self.page_size.min(self.pending.len());
        let ids: Vec<i64> = self.pending.drain(..take).collect();
        let placeholders = (1..=ids.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT * FROM {} WHERE {ID_COLUMN} IN ({placeholders});",
            self.table
        );

        let guard = self
            .reader
            .lock()
            .expect("reader connection mutex should not be poisoned");
        let reader = guard.as_ref().ok_or(EngineError::Disconnected)?;
        let mut statement = reader.prepare_cached(&sql)?;
        let columns = match &self.columns {
            Some(columns) => Arc::clone(columns),
            None => {
                let names: Arc<[String]> = statement
                    .column_names()
                    .into_iter()
                    .map(String::from)
                    .collect();
                self.columns = Some(Arc::clone(&names));
                names
            }
        };

        let mut fetched = HashMap::with_capacity(ids.len());
        let mut rows = statement.query(params_from_iter(ids.iter()))?;
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|index| row.get::<_, ColumnValue>(index))
                .collect::<Result<Vec<_>, _>>()?;
            let stored = StoredRow::new(Arc::clone(&columns), values);
            fetched.insert(stored.id()?, stored);
        }
        drop(rows);
        drop(statement);
        drop(guard);

        let found = fetched.len();
        self.buffer
            .extend(ids.iter().filter_map(|id| fetched.remove(id)));
        log_debug!(
            component = "cursor",
            event = "page_fetched",
            rows = found,
            vanished = ids.len() - found,
        );
        Ok(())
    }
}

impl Iterator for RowCursor {
    type Item = Result<StoredRow, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() && !self.pending.is_empty() {
            if let Err(err) = self.fetch_page() {
                self.pending.clear();
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("table", &self.table)
            .field("pending", &self.pending.len())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
