//! Test-only entity and descriptor shared by unit tests.

use time::{Duration, OffsetDateTime};

use crate::schema::{ColumnSpec, Descriptor, RowValues, SchemaError, StoredRow};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reading {
    pub(crate) name: String,
    pub(crate) score: i64,
    pub(crate) at: OffsetDateTime,
    pub(crate) hidden: bool,
}

impl Reading {
    /// Reading stamped `minute` minutes after a fixed base instant.
    pub(crate) fn new(name: &str, score: i64, minute: i64) -> Self {
        let base = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        Self {
            name: name.to_string(),
            score,
            at: base + Duration::minutes(minute),
            hidden: false,
        }
    }

    pub(crate) fn hidden(self, hidden: bool) -> Self {
        Self { hidden, ..self }
    }

    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            score: -1,
            at: OffsetDateTime::UNIX_EPOCH,
            hidden: false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReadingDescriptor {
    columns: Vec<ColumnSpec>,
    track_filter: bool,
}

impl ReadingDescriptor {
    pub(crate) fn new() -> Self {
        Self {
            columns: vec![ColumnSpec::text("Name"), ColumnSpec::integer("Score")],
            track_filter: false,
        }
    }

    /// Puts a unique index on `Name`, so duplicate names fail to insert.
    pub(crate) fn unique_names(mut self) -> Self {
        self.columns[0] = ColumnSpec::text("Name").indexed();
        self
    }

    pub(crate) fn tracking_filter(mut self) -> Self {
        self.track_filter = true;
        self
    }
}

impl Descriptor for ReadingDescriptor {
    type Entity = Reading;

    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn to_row(&self, entity: &Reading) -> RowValues {
        RowValues::new()
            .with("Name", entity.name.as_str())
            .with("Score", entity.score)
    }

    fn from_row(&self, row: &StoredRow) -> Result<Reading, SchemaError> {
        Ok(Reading {
            name: row
                .text("Name")?
                .ok_or_else(|| SchemaError::Null("Name".into()))?
                .to_string(),
            score: row
                .integer("Score")?
                .ok_or_else(|| SchemaError::Null("Score".into()))?,
            at: row.date()?,
            hidden: row.is_filtered_out()?,
        })
    }

    fn date(&self, entity: &Reading) -> OffsetDateTime {
        entity.at
    }

    fn primary_key(&self, entity: &Reading) -> String {
        entity.name.clone()
    }

    fn tracks_filter_state(&self) -> bool {
        self.track_filter
    }

    fn is_filtered_out(&self, entity: &Reading) -> bool {
        entity.hidden
    }
}
