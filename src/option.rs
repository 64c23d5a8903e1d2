use std::{path::PathBuf, time::Duration};

/// SQLite journal mode applied to both connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead log; readers never block the writer.
    #[default]
    Wal,
    /// Rollback journal, deleted after each transaction.
    Delete,
}

impl JournalMode {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// Options for opening a store.
///
/// ```no_run
/// use rowstore::StoreOptions;
///
/// let options = StoreOptions::from("/tmp/readings.db")
///     .recreate(true)
///     .read_page_size(512);
/// ```
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub(crate) path: PathBuf,
    pub(crate) recreate: bool,
    pub(crate) read_page_size: usize,
    pub(crate) busy_timeout: Duration,
    pub(crate) journal_mode: JournalMode,
    pub(crate) statement_cache_capacity: usize,
}

impl<P> From<P> for StoreOptions
where
    P: Into<PathBuf>,
{
    fn from(path: P) -> Self {
        StoreOptions {
            path: path.into(),
            recreate: false,
            read_page_size: 256,
            busy_timeout: Duration::from_secs(5),
            journal_mode: JournalMode::Wal,
            statement_cache_capacity: 32,
        }
    }
}

impl StoreOptions {
    /// Path of the backing database file.
    pub fn path(self, path: impl Into<PathBuf>) -> Self {
        StoreOptions {
            path: path.into(),
            ..self
        }
    }

    /// Remove any existing backing file before opening.
    pub fn recreate(self, recreate: bool) -> Self {
        StoreOptions { recreate, ..self }
    }

    /// Rows fetched from SQLite per cursor page, clamped to `1..=999`.
    pub fn read_page_size(self, read_page_size: usize) -> Self {
        StoreOptions {
            read_page_size: read_page_size.max(1),
            ..self
        }
    }

    /// How long a connection waits on a locked database before failing.
    pub fn busy_timeout(self, busy_timeout: Duration) -> Self {
        StoreOptions {
            busy_timeout,
            ..self
        }
    }

    /// Journal mode set on open.
    pub fn journal_mode(self, journal_mode: JournalMode) -> Self {
        StoreOptions {
            journal_mode,
            ..self
        }
    }

    /// Capacity of each connection's prepared statement cache.
    pub fn statement_cache_capacity(self, statement_cache_capacity: usize) -> Self {
        StoreOptions {
            statement_cache_capacity,
            ..self
        }
    }

    /// Configured backing file path.
    pub fn file_path(&self) -> &PathBuf {
        &self.path
    }
}
