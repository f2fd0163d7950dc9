//! Storage-side shapes of an aggregate: table descriptors, flat rows and the
//! grouped child rows of one root.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Nullable, ValueType};
use sea_orm::{DbErr, QueryResult, Value};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::query::FieldKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("{table}.{column} is missing")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table}.{column} does not hold a value of the expected type")]
    InvalidColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table}.{column}: {reason}")]
    InvalidValue {
        table: &'static str,
        column: &'static str,
        reason: String,
    },

    #[error("{table} row does not belong to root {root}")]
    OrphanChild { table: &'static str, root: Uuid },

    #[error("expected at most {expected} {table} row(s) per root, got {got}")]
    UnexpectedChildCount {
        table: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{table} record violates an aggregate invariant: {reason}")]
    Invariant { table: &'static str, reason: String },

    #[error("cannot serialize {table}.{column}: {reason}")]
    Serialization {
        table: &'static str,
        column: &'static str,
        reason: String,
    },
}

/// A stored column and its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Column {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove the root and its owned rows.
    Hard,
    /// Stamp `column` with the deletion time; flagged roots become invisible.
    Soft { column: &'static str },
}

/// Table holding one owned collection, keyed by the root id in `foreign_key`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildTable {
    pub table: &'static str,
    pub foreign_key: &'static str,
    /// Data columns, without the foreign key.
    pub columns: &'static [Column],
    /// Columns restoring the collection order on load.
    pub order_by: &'static [&'static str],
}

/// Static storage layout of one aggregate type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: &'static str,
    /// UUID primary key column; also listed in `columns`.
    pub primary_key: &'static str,
    pub version_column: &'static str,
    /// Root columns other than the version and the soft-delete marker.
    pub columns: &'static [Column],
    pub children: &'static [ChildTable],
    pub delete_policy: DeletePolicy,
}

impl EntityDescriptor {
    /// Soft-delete marker column, if the policy has one.
    #[must_use]
    pub fn soft_delete_column(&self) -> Option<&'static str> {
        match self.delete_policy {
            DeletePolicy::Hard => None,
            DeletePolicy::Soft { column } => Some(column),
        }
    }

    pub(crate) fn column_names(&self) -> impl Iterator<Item = &'static str> {
        self.columns.iter().map(|c| c.name)
    }
}

/// One flat storage row.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordRow {
    table: &'static str,
    values: BTreeMap<&'static str, Value>,
}

impl RecordRow {
    #[must_use]
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<Value>) {
        self.values.insert(column, value.into());
    }

    /// Store `value` as a JSON text column.
    ///
    /// # Errors
    /// `MappingError::Serialization` if `value` cannot be serialized.
    pub fn set_json<T: Serialize>(
        &mut self,
        column: &'static str,
        value: &T,
    ) -> Result<(), MappingError> {
        let text = serde_json::to_string(value).map_err(|e| MappingError::Serialization {
            table: self.table,
            column,
            reason: e.to_string(),
        })?;
        self.set(column, text);
        Ok(())
    }

    #[must_use]
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Raw bound value of a column.
    ///
    /// # Errors
    /// `MappingError::MissingColumn` if the column was never set.
    pub fn raw(&self, column: &'static str) -> Result<&Value, MappingError> {
        self.values
            .get(column)
            .ok_or(MappingError::MissingColumn {
                table: self.table,
                column,
            })
    }

    /// Typed value of a nullable column.
    ///
    /// # Errors
    /// `MissingColumn` if the column was never set, `InvalidColumn` on a type mismatch.
    pub fn get_opt<T>(&self, column: &'static str) -> Result<Option<T>, MappingError>
    where
        T: ValueType + Nullable,
    {
        let raw = self.raw(column)?.clone();
        <Option<T> as ValueType>::try_from(raw).map_err(|_| MappingError::InvalidColumn {
            table: self.table,
            column,
        })
    }

    /// Typed value of a required column.
    ///
    /// # Errors
    /// `MissingColumn` if absent or null, `InvalidColumn` on a type mismatch.
    pub fn get<T>(&self, column: &'static str) -> Result<T, MappingError>
    where
        T: ValueType + Nullable,
    {
        self.get_opt(column)?.ok_or(MappingError::MissingColumn {
            table: self.table,
            column,
        })
    }

    /// Deserialize a JSON text column.
    ///
    /// # Errors
    /// `MissingColumn`, `InvalidColumn` or `Serialization`.
    pub fn get_json<T: DeserializeOwned>(&self, column: &'static str) -> Result<T, MappingError> {
        let text: String = self.get(column)?;
        serde_json::from_str(&text).map_err(|e| MappingError::Serialization {
            table: self.table,
            column,
            reason: e.to_string(),
        })
    }

    /// Read `columns` from a query result row.
    pub(crate) fn read(
        table: &'static str,
        row: &QueryResult,
        columns: impl IntoIterator<Item = Column>,
    ) -> Result<Self, DbErr> {
        let mut out = RecordRow::new(table);
        for c in columns {
            let v: Value = match c.kind {
                FieldKind::String => row.try_get::<Option<String>>("", c.name)?.into(),
                FieldKind::I64 => row.try_get::<Option<i64>>("", c.name)?.into(),
                FieldKind::F64 => row.try_get::<Option<f64>>("", c.name)?.into(),
                FieldKind::Bool => row.try_get::<Option<bool>>("", c.name)?.into(),
                FieldKind::Uuid => row.try_get::<Option<Uuid>>("", c.name)?.into(),
                FieldKind::DateTimeUtc => row.try_get::<Option<DateTime<Utc>>>("", c.name)?.into(),
            };
            out.values.insert(c.name, v);
        }
        Ok(out)
    }
}

/// Flattened root row plus its concurrency version.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRecord {
    pub root: RecordRow,
    pub version: i64,
}

impl AggregateRecord {
    #[must_use]
    pub fn new(root: RecordRow, version: i64) -> Self {
        Self { root, version }
    }

    /// Root id stored under `descriptor.primary_key`.
    ///
    /// # Errors
    /// `MissingColumn` / `InvalidColumn` if the id is absent or not a UUID.
    pub fn id(&self, descriptor: &EntityDescriptor) -> Result<Uuid, MappingError> {
        self.root.get(descriptor.primary_key)
    }
}

/// Child rows of one root, grouped by table. Rows carry their foreign key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Children {
    rows: BTreeMap<&'static str, Vec<RecordRow>>,
}

impl Children {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: RecordRow) {
        self.rows.entry(row.table).or_default().push(row);
    }

    #[must_use]
    pub fn rows(&self, table: &str) -> &[RecordRow] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.values().all(Vec::is_empty)
    }

    /// Remove and return the rows of `child`, checking each belongs to `root`.
    ///
    /// # Errors
    /// `MappingError::OrphanChild` if a row's foreign key is missing or points at
    /// another root.
    pub fn take(&mut self, child: &ChildTable, root: Uuid) -> Result<Vec<RecordRow>, MappingError> {
        let rows = self.rows.remove(child.table).unwrap_or_default();
        for row in &rows {
            let owner: Option<Uuid> = row.get_opt(child.foreign_key).unwrap_or(None);
            if owner != Some(root) {
                return Err(MappingError::OrphanChild {
                    table: child.table,
                    root,
                });
            }
        }
        Ok(rows)
    }

    /// Like [`Children::take`] for one-to-one collections.
    ///
    /// # Errors
    /// `OrphanChild`, or `UnexpectedChildCount` when more than one row exists.
    pub fn take_one(
        &mut self,
        child: &ChildTable,
        root: Uuid,
    ) -> Result<Option<RecordRow>, MappingError> {
        let mut rows = self.take(child, root)?;
        if rows.len() > 1 {
            return Err(MappingError::UnexpectedChildCount {
                table: child.table,
                expected: 1,
                got: rows.len(),
            });
        }
        Ok(rows.pop())
    }
}
