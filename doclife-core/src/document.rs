// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory representation of a record and its child rows.
use std::collections::BTreeMap;

use serde_json::Map;

use crate::error::DocumentBuildError;
use crate::row::{self, Row};
use crate::{DocStatus, Timestamp, Value};

/// One record of a doctype together with its child tables.
///
/// Standard columns are kept as typed attributes, schema fields live in an ordered map of scalar
/// values and child tables in a separate map of row collections. Child rows are documents
/// themselves which refer to their owner through `parent`, `parenttype` and `parentfield`; they
/// never hold a reference to the parent document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub doctype: String,
    pub name: Option<String>,
    pub docstatus: DocStatus,
    pub owner: Option<String>,
    pub creation: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub modified_by: Option<String>,
    pub parent: Option<String>,
    pub parenttype: Option<String>,
    pub parentfield: Option<String>,
    pub idx: u32,
    fields: BTreeMap<String, Value>,
    tables: BTreeMap<String, Vec<Document>>,
    local: bool,
    loaded_modified: Option<Timestamp>,
}

impl Document {
    /// Fresh, unsaved document without any values.
    pub fn new(doctype: &str) -> Self {
        Self {
            doctype: doctype.to_owned(),
            name: None,
            docstatus: DocStatus::Draft,
            owner: None,
            creation: None,
            modified: None,
            modified_by: None,
            parent: None,
            parenttype: None,
            parentfield: None,
            idx: 0,
            fields: BTreeMap::new(),
            tables: BTreeMap::new(),
            local: true,
            loaded_modified: None,
        }
    }

    /// Returns `true` if this document was never persisted.
    pub fn is_new(&self) -> bool {
        self.local
    }

    /// Returns `true` if this document is a row of a child table.
    pub fn is_child(&self) -> bool {
        self.parenttype.is_some()
    }

    /// Name of the document, empty string if none was resolved yet.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// `modified` timestamp as it was when the document was loaded or last saved.
    pub fn loaded_modified(&self) -> Option<Timestamp> {
        self.loaded_modified
    }

    /// Mark the document and all its children as persisted with the current `modified`.
    pub fn mark_persisted(&mut self) {
        self.local = false;
        self.loaded_modified = self.modified;
        for child in self.all_children_mut() {
            child.local = false;
            child.loaded_modified = child.modified;
        }
    }

    /// Mark the document as unsaved, used when a persisted copy becomes the base of a new one.
    pub fn mark_new(&mut self) {
        self.local = true;
        self.loaded_modified = None;
    }

    /// Value of a schema field.
    pub fn get(&self, fieldname: &str) -> Option<&Value> {
        self.fields.get(fieldname)
    }

    pub fn get_str(&self, fieldname: &str) -> Option<&str> {
        self.fields.get(fieldname).and_then(Value::as_str)
    }

    /// Value of a schema field or standard column, `Null` if not set.
    pub fn value(&self, fieldname: &str) -> Value {
        match fieldname {
            row::NAME => self.name.clone().into(),
            row::OWNER => self.owner.clone().into(),
            row::CREATION => self.creation.map(Timestamp::to_value).unwrap_or_default(),
            row::MODIFIED => self.modified.map(Timestamp::to_value).unwrap_or_default(),
            row::MODIFIED_BY => self.modified_by.clone().into(),
            row::DOCSTATUS => Value::Int(self.docstatus.as_i64()),
            row::IDX => Value::Int(self.idx as i64),
            row::PARENT => self.parent.clone().into(),
            row::PARENTTYPE => self.parenttype.clone().into(),
            row::PARENTFIELD => self.parentfield.clone().into(),
            row::DOCTYPE => Value::from(&self.doctype),
            _ => self.fields.get(fieldname).cloned().unwrap_or_default(),
        }
    }

    /// Set a schema field.
    pub fn set(&mut self, fieldname: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(fieldname.to_owned(), value.into());
        self
    }

    /// Set many schema fields at once.
    pub fn update<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (fieldname, value) in values {
            self.fields.insert(fieldname.into(), value.into());
        }
        self
    }

    pub fn remove(&mut self, fieldname: &str) -> Option<Value> {
        self.fields.remove(fieldname)
    }

    /// Schema fields with their values in field name order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Rows of a child table, empty if the table was never set.
    pub fn table(&self, fieldname: &str) -> &[Document] {
        self.tables
            .get(fieldname)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn table_mut(&mut self, fieldname: &str) -> &mut Vec<Document> {
        self.tables.entry(fieldname.to_owned()).or_default()
    }

    pub fn has_table(&self, fieldname: &str) -> bool {
        self.tables.contains_key(fieldname)
    }

    /// Replace all rows of a child table.
    pub fn set_table(&mut self, fieldname: &str, rows: Vec<Document>) {
        self.tables.insert(fieldname.to_owned(), rows);
        self.link_children_of(fieldname);
    }

    /// Child table names in order.
    pub fn table_names(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }

    /// Append a row to a child table and return it for further changes.
    pub fn append(&mut self, fieldname: &str, mut child: Document) -> &mut Document {
        let parenttype = self.doctype.clone();
        let parent = self.name.clone();
        let rows = self.tables.entry(fieldname.to_owned()).or_default();
        child.parent = parent;
        child.parenttype = Some(parenttype);
        child.parentfield = Some(fieldname.to_owned());
        child.idx = rows.len() as u32 + 1;
        rows.push(child);
        let last = rows.len() - 1;
        &mut rows[last]
    }

    /// Iterate over all rows of all child tables.
    pub fn all_children(&self) -> impl Iterator<Item = &Document> {
        self.tables.values().flatten()
    }

    pub fn all_children_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.tables.values_mut().flatten()
    }

    /// Point every child row at this document and renumber their positions.
    pub fn set_parent_in_children(&mut self) {
        let names: Vec<String> = self.tables.keys().cloned().collect();
        for fieldname in names {
            self.link_children_of(&fieldname);
        }
    }

    fn link_children_of(&mut self, fieldname: &str) {
        let parent = self.name.clone();
        let parenttype = self.doctype.clone();
        if let Some(rows) = self.tables.get_mut(fieldname) {
            for (index, child) in rows.iter_mut().enumerate() {
                child.parent = parent.clone();
                child.parenttype = Some(parenttype.clone());
                child.parentfield = Some(fieldname.to_owned());
                child.idx = index as u32 + 1;
            }
        }
    }

    /// Flat row with standard columns and scalar fields, child tables are not included.
    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .fields
            .iter()
            .map(|(fieldname, value)| (fieldname.clone(), value.clone()))
            .collect();
        for column in row::STANDARD_COLUMNS {
            if matches!(column, row::PARENT | row::PARENTTYPE | row::PARENTFIELD) && !self.is_child()
            {
                continue;
            }
            row.set(column, self.value(column));
        }
        row
    }

    /// Build a persisted document from a stored row, child tables are left empty.
    pub fn from_row(doctype: &str, row: Row) -> Result<Self, DocumentBuildError> {
        let mut document = Document::new(doctype);
        for (column, value) in row {
            document.set_column(&column, value)?;
        }
        document.mark_persisted();
        Ok(document)
    }

    /// Build a transient document from a JSON object.
    ///
    /// The object must contain a `doctype` key. Arrays are read as child tables whose entries are
    /// objects carrying their own `doctype`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DocumentBuildError> {
        let object = value.as_object().ok_or(DocumentBuildError::NotAnObject)?;
        let doctype = object
            .get(row::DOCTYPE)
            .and_then(serde_json::Value::as_str)
            .filter(|doctype| !doctype.is_empty())
            .ok_or(DocumentBuildError::MissingDocType)?;

        let mut document = Document::new(doctype);
        for (key, value) in object {
            if key == row::DOCTYPE {
                continue;
            }
            match value {
                serde_json::Value::Array(entries) => {
                    for (index, entry) in entries.iter().enumerate() {
                        if !entry.is_object() {
                            return Err(DocumentBuildError::InvalidRow(key.clone(), index));
                        }
                        let child = Document::from_json(entry)?;
                        document.append(key, child);
                    }
                    document.tables.entry(key.clone()).or_default();
                }
                value => {
                    let value = Value::from_json(value)
                        .map_err(|err| DocumentBuildError::InvalidValue(key.clone(), err))?;
                    document.set_column(key, value)?;
                }
            }
        }
        Ok(document)
    }

    /// JSON object with the doctype, standard columns, fields and child tables.
    pub fn as_json(&self) -> serde_json::Value {
        let mut object = Map::new();
        object.insert(row::DOCTYPE.to_owned(), self.doctype.clone().into());
        for (column, value) in self.to_row() {
            object.insert(column, value.to_json());
        }
        for (fieldname, rows) in &self.tables {
            object.insert(
                fieldname.clone(),
                rows.iter().map(Document::as_json).collect(),
            );
        }
        serde_json::Value::Object(object)
    }

    fn set_column(&mut self, column: &str, value: Value) -> Result<(), DocumentBuildError> {
        let text = value.as_str().map(str::to_owned);
        match column {
            row::NAME => self.name = text,
            row::OWNER => self.owner = text,
            row::MODIFIED_BY => self.modified_by = text,
            row::PARENT => self.parent = text,
            row::PARENTTYPE => self.parenttype = text,
            row::PARENTFIELD => self.parentfield = text,
            row::CREATION => self.creation = Self::timestamp_column(row::CREATION, &value)?,
            row::MODIFIED => self.modified = Self::timestamp_column(row::MODIFIED, &value)?,
            row::DOCSTATUS => {
                self.docstatus = match value {
                    Value::Null => DocStatus::Draft,
                    value => {
                        let status = value
                            .as_i64()
                            .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
                            .ok_or(DocumentBuildError::MalformedColumn(row::DOCSTATUS))?;
                        DocStatus::try_from(status)?
                    }
                }
            }
            row::IDX => {
                self.idx = match value {
                    Value::Null => 0,
                    value => value
                        .as_i64()
                        .and_then(|idx| u32::try_from(idx).ok())
                        .ok_or(DocumentBuildError::MalformedColumn(row::IDX))?,
                }
            }
            _ => {
                self.fields.insert(column.to_owned(), value);
            }
        }
        Ok(())
    }

    fn timestamp_column(
        column: &'static str,
        value: &Value,
    ) -> Result<Option<Timestamp>, DocumentBuildError> {
        if value.is_null() {
            return Ok(None);
        }
        Timestamp::from_value(value)
            .map(Some)
            .ok_or(DocumentBuildError::MalformedColumn(column))
    }
}
