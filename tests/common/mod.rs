#![allow(dead_code)]

use std::sync::Arc;

use rowstore::{
    rules::PropertyCatalog, ColumnSpec, Descriptor, RowStore, RowValues, SchemaError,
    StoreOptions, StoredRow,
};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    pub score: i64,
    pub at: OffsetDateTime,
}

impl Entry {
    /// Entry stamped `second` seconds after a fixed base instant.
    pub fn new(name: &str, score: i64, second: i64) -> Self {
        let base = OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap();
        Self {
            name: name.to_string(),
            score,
            at: base + Duration::seconds(second),
        }
    }

    pub fn blank() -> Self {
        Self {
            name: "-".to_string(),
            score: 0,
            at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

pub struct EntryDescriptor {
    columns: Vec<ColumnSpec>,
}

impl Default for EntryDescriptor {
    fn default() -> Self {
        Self {
            columns: vec![ColumnSpec::integer("Score"), ColumnSpec::text("Name")],
        }
    }
}

impl Descriptor for EntryDescriptor {
    type Entity = Entry;

    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn to_row(&self, entry: &Entry) -> RowValues {
        RowValues::new()
            .with("Score", entry.score)
            .with("Name", entry.name.as_str())
    }

    fn from_row(&self, row: &StoredRow) -> Result<Entry, SchemaError> {
        Ok(Entry {
            name: row.text("Name")?.unwrap_or_default().to_string(),
            score: row
                .integer("Score")?
                .ok_or_else(|| SchemaError::Null("Score".to_string()))?,
            at: row.date()?,
        })
    }

    fn date(&self, entry: &Entry) -> OffsetDateTime {
        entry.at
    }

    fn primary_key(&self, entry: &Entry) -> String {
        entry.name.clone()
    }
}

pub fn open_store(dir: &TempDir) -> RowStore<EntryDescriptor> {
    let options = StoreOptions::from(dir.path().join("entries.db")).read_page_size(3);
    RowStore::open(options, EntryDescriptor::default()).unwrap()
}

pub fn catalog() -> Arc<PropertyCatalog<Entry>> {
    Arc::new(
        PropertyCatalog::new()
            .numeric("Score", |entry: &Entry| entry.score as f64)
            .date_time("DateTime", |entry: &Entry| entry.at)
            .text("Name", |entry: &Entry| entry.name.clone()),
    )
}
