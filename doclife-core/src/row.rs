// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat storage representation of a document or child row.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Value;

pub const NAME: &str = "name";
pub const OWNER: &str = "owner";
pub const CREATION: &str = "creation";
pub const MODIFIED: &str = "modified";
pub const MODIFIED_BY: &str = "modified_by";
pub const DOCSTATUS: &str = "docstatus";
pub const IDX: &str = "idx";
pub const PARENT: &str = "parent";
pub const PARENTTYPE: &str = "parenttype";
pub const PARENTFIELD: &str = "parentfield";
pub const DOCTYPE: &str = "doctype";

/// Columns every stored row carries next to its schema fields.
pub const STANDARD_COLUMNS: [&str; 10] = [
    NAME,
    OWNER,
    CREATION,
    MODIFIED,
    MODIFIED_BY,
    DOCSTATUS,
    IDX,
    PARENT,
    PARENTTYPE,
    PARENTFIELD,
];

/// Columns which are ignored when comparing two versions of the same row.
pub const AUDIT_COLUMNS: [&str; 3] = [MODIFIED, MODIFIED_BY, CREATION];

pub fn is_standard_column(column: &str) -> bool {
    column == DOCTYPE || STANDARD_COLUMNS.contains(&column)
}

pub fn is_audit_column(column: &str) -> bool {
    AUDIT_COLUMNS.contains(&column)
}

/// Column values of one stored row, ordered by column name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Text value of a column, `None` if missing or not text.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.0.insert(column.to_owned(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Overwrite the given columns, all other columns are kept.
    pub fn merge(&mut self, other: Row) {
        self.0.extend(other.0);
    }

    /// Name of the row, empty string if the row has none.
    pub fn name(&self) -> &str {
        self.get_str(NAME).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )
    }
}
