//! Column schema descriptors: how an entity type maps onto `MainTable`.

use std::{fmt, sync::Arc};

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use time::OffsetDateTime;

use crate::timestamp::{self, TimestampError};

/// The one table a store manages.
pub const MAIN_TABLE: &str = "MainTable";
/// Engine-owned timestamp column; default sort key.
pub const DATE_TIME_COLUMN: &str = "DateTime";
/// Engine-owned row id column.
pub const ID_COLUMN: &str = "Id";
/// Optional engine-owned row filter flag column.
pub const IS_FILTERED_OUT_COLUMN: &str = "IsFilteredOut";

/// Logical storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Stored as SQLite `TEXT`.
    Text,
    /// Stored as SQLite `INTEGER`.
    Integer,
}

impl ColumnType {
    /// SQL type name used in `CREATE`/`ALTER` statements.
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
        }
    }
}

/// Declared entity column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name; must be a plain SQL identifier.
    pub name: String,
    /// Storage type.
    pub column_type: ColumnType,
    /// Whether a unique index is asserted on the column.
    pub indexed: bool,
}

impl ColumnSpec {
    /// Unindexed text column.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Text,
            indexed: false,
        }
    }

    /// Unindexed integer column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Integer,
            indexed: false,
        }
    }

    /// Marks the column for a unique index.
    #[must_use]
    pub fn indexed(self) -> Self {
        Self {
            indexed: true,
            ..self
        }
    }
}

/// A single stored cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// SQL `NULL`.
    Null,
    /// Integer cell.
    Integer(i64),
    /// Floating point cell.
    Real(f64),
    /// Text cell.
    Text(String),
}

impl ColumnValue {
    /// Integer content, if this is an integer cell.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(value) => Some(value),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Integer(_) => "integer",
            ColumnValue::Real(_) => "real",
            ColumnValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("NULL"),
            ColumnValue::Integer(value) => write!(f, "{value}"),
            ColumnValue::Real(value) => write!(f, "{value}"),
            ColumnValue::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ColumnValue::Null => ToSqlOutput::Owned(Value::Null),
            ColumnValue::Integer(value) => ToSqlOutput::from(*value),
            ColumnValue::Real(value) => ToSqlOutput::from(*value),
            ColumnValue::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

impl FromSql for ColumnValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => ColumnValue::Null,
            ValueRef::Integer(value) => ColumnValue::Integer(value),
            ValueRef::Real(value) => ColumnValue::Real(value),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                ColumnValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        })
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Real(value)
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ColumnValue::Null, Into::into)
    }
}

/// Named values to write into one row, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    values: Vec<(String, ColumnValue)>,
}

impl RowValues {
    /// Empty value set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the value of `column`.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Adds or replaces the value of `column` in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<ColumnValue>) {
        let column = column.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column, value)),
        }
    }

    /// Value bound to `column`.
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of bound columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A row read back from storage.
///
/// Column names are shared by every row of the same cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    columns: Arc<[String]>,
    values: Vec<ColumnValue>,
}

impl StoredRow {
    /// Builds a row from a column list and matching values.
    pub fn new(columns: Arc<[String]>, values: Vec<ColumnValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names of the row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw cell for `column`.
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    fn require(&self, column: &str) -> Result<&ColumnValue, SchemaError> {
        self.get(column)
            .ok_or_else(|| SchemaError::MissingColumn(column.to_string()))
    }

    /// Text cell for `column`. `NULL` reads as `None`.
    pub fn text(&self, column: &str) -> Result<Option<&str>, SchemaError> {
        match self.require(column)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::Text(value) => Ok(Some(value)),
            other => Err(SchemaError::TypeMismatch {
                column: column.to_string(),
                expected: "text",
                found: other.type_name(),
            }),
        }
    }

    /// Integer cell for `column`. `NULL` reads as `None`; numeric text is parsed.
    pub fn integer(&self, column: &str) -> Result<Option<i64>, SchemaError> {
        match self.require(column)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::Integer(value) => Ok(Some(*value)),
            ColumnValue::Text(text) => text.trim().parse().map(Some).map_err(|_| {
                SchemaError::TypeMismatch {
                    column: column.to_string(),
                    expected: "integer",
                    found: "text",
                }
            }),
            other => Err(SchemaError::TypeMismatch {
                column: column.to_string(),
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }

    /// Engine-assigned row id.
    pub fn id(&self) -> Result<i64, SchemaError> {
        self.integer(ID_COLUMN)?
            .ok_or_else(|| SchemaError::MissingColumn(ID_COLUMN.to_string()))
    }

    /// Decoded `DateTime` cell.
    pub fn date(&self) -> Result<OffsetDateTime, SchemaError> {
        let text = match self.require(DATE_TIME_COLUMN)? {
            ColumnValue::Text(text) => text.clone(),
            ColumnValue::Integer(ticks) => ticks.to_string(),
            other => {
                return Err(SchemaError::TypeMismatch {
                    column: DATE_TIME_COLUMN.to_string(),
                    expected: "text",
                    found: other.type_name(),
                })
            }
        };
        Ok(timestamp::decode(&text)?)
    }

    /// `IsFilteredOut` flag; absent or `NULL` reads as `false`.
    pub fn is_filtered_out(&self) -> Result<bool, SchemaError> {
        match self.get(IS_FILTERED_OUT_COLUMN) {
            None => Ok(false),
            Some(_) => Ok(self.integer(IS_FILTERED_OUT_COLUMN)?.unwrap_or(0) != 0),
        }
    }
}

/// Error converting between entities and stored rows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// Row lacks a column the descriptor reads.
    #[error("row has no column {0}")]
    MissingColumn(String),
    /// Cell holds a different type than the descriptor expects.
    #[error("column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Expected cell type.
        expected: &'static str,
        /// Actual cell type.
        found: &'static str,
    },
    /// Required cell is `NULL`.
    #[error("column {0} is null")]
    Null(String),
    /// Stored timestamp could not be decoded.
    #[error("timestamp: {0}")]
    Timestamp(#[from] TimestampError),
    /// Descriptor specific conversion failure.
    #[error("{0}")]
    Invalid(String),
}

/// Per-entity-type mapping onto the store's table.
///
/// `DateTime` and `Id` are owned by the store; descriptors never declare or
/// write them. A descriptor's column set is fixed for the lifetime of a store.
pub trait Descriptor {
    /// Entity type the descriptor maps.
    type Entity;

    /// Declared entity columns.
    fn columns(&self) -> &[ColumnSpec];

    /// Values for every declared column of `entity`.
    fn to_row(&self, entity: &Self::Entity) -> RowValues;

    /// Rebuilds an entity from a stored row.
    fn from_row(&self, row: &StoredRow) -> Result<Self::Entity, SchemaError>;

    /// Timestamp stored in the `DateTime` column.
    fn date(&self, entity: &Self::Entity) -> OffsetDateTime;

    /// Logical unique key used to address updates.
    fn primary_key(&self, entity: &Self::Entity) -> String;

    /// Whether the store keeps an `IsFilteredOut` column for this entity.
    fn tracks_filter_state(&self) -> bool {
        false
    }

    /// Filter flag written to `IsFilteredOut` when tracked.
    fn is_filtered_out(&self, _entity: &Self::Entity) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn row_values_replace_in_place() {
        let values = RowValues::new()
            .with("Name", "a")
            .with("Score", 1i64)
            .with("Name", "b");
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("Name"), Some(&ColumnValue::Text("b".into())));
        assert_eq!(
            values.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            ["Name", "Score"]
        );
        assert_eq!(ColumnValue::from(None::<i64>), ColumnValue::Null);
        assert_eq!(ColumnValue::from(true), ColumnValue::Integer(1));
    }

    #[test]
    fn stored_row_accessors() {
        let columns: Arc<[String]> = ["Name", "Score", "DateTime", "Id"]
            .into_iter()
            .map(String::from)
            .collect();
        let row = StoredRow::new(
            columns,
            vec![
                ColumnValue::Text("a".into()),
                ColumnValue::Text("42".into()),
                ColumnValue::Text(timestamp::encode(datetime!(2024-01-02 03:04 UTC)).unwrap()),
                ColumnValue::Integer(7),
            ],
        );
        assert_eq!(row.text("Name").unwrap(), Some("a"));
        assert_eq!(row.integer("Score").unwrap(), Some(42));
        assert_eq!(row.id().unwrap(), 7);
        assert_eq!(row.date().unwrap(), datetime!(2024-01-02 03:04 UTC));
        assert!(!row.is_filtered_out().unwrap());
        assert_eq!(
            row.text("Missing"),
            Err(SchemaError::MissingColumn("Missing".into()))
        );
        assert!(matches!(
            row.integer("Name"),
            Err(SchemaError::TypeMismatch { expected: "integer", .. })
        ));
    }
}
