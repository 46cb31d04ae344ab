// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of child rows between two versions of a document.
use std::collections::HashSet;

use doclife_core::row::AUDIT_COLUMNS;
use doclife_core::{DocTypeMeta, Document, Row};
use tracing::trace;

/// How a child row changed between the stored and the saved version of its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowChange {
    /// Row has no name yet or its name did not exist before.
    Inserted,

    /// Row existed before but is gone now.
    Deleted,

    /// Row exists in both versions and at least one non-audit column differs.
    Modified,

    Untouched,
}

/// Changes of one child table.
#[derive(Clone, Debug, PartialEq)]
pub struct TableDiff {
    pub fieldname: String,

    /// Rows which were removed, in their previous order.
    pub deleted: Vec<Document>,

    /// Classification of every current row, in table order.
    pub rows: Vec<RowChange>,
}

impl TableDiff {
    /// Returns `true` if no row was inserted, deleted or modified.
    pub fn is_untouched(&self) -> bool {
        self.deleted.is_empty() && self.rows.iter().all(|change| *change == RowChange::Untouched)
    }

    pub fn count(&self, change: RowChange) -> usize {
        match change {
            RowChange::Deleted => self.deleted.len(),
            change => self.rows.iter().filter(|row| **row == change).count(),
        }
    }
}

/// Row without the columns which are ignored when comparing two versions.
pub(crate) fn comparable_row(document: &Document) -> Row {
    let mut row = document.to_row();
    for column in AUDIT_COLUMNS {
        row.remove(column);
    }
    row
}

/// Diff one child table, rows are matched by name only.
pub fn diff_table(fieldname: &str, before: &[Document], after: &[Document]) -> TableDiff {
    let current: HashSet<&str> = after
        .iter()
        .filter_map(|row| row.name.as_deref())
        .collect();
    let deleted = before
        .iter()
        .filter(|row| !current.contains(row.name()))
        .cloned()
        .collect();

    let rows = after
        .iter()
        .map(|row| {
            let Some(name) = row.name.as_deref() else {
                return RowChange::Inserted;
            };
            match before.iter().find(|previous| previous.name() == name) {
                None => RowChange::Inserted,
                Some(previous) if comparable_row(previous) == comparable_row(row) => {
                    RowChange::Untouched
                }
                Some(_) => RowChange::Modified,
            }
        })
        .collect();

    TableDiff {
        fieldname: fieldname.to_owned(),
        deleted,
        rows,
    }
}

/// Diff all child tables of a document against its stored version.
///
/// Without a stored version every row counts as inserted.
pub fn diff_children(
    meta: &DocTypeMeta,
    before: Option<&Document>,
    after: &Document,
) -> Vec<TableDiff> {
    meta.table_fields()
        .map(|field| {
            let previous = before
                .map(|before| before.table(&field.fieldname))
                .unwrap_or_default();
            let diff = diff_table(&field.fieldname, previous, after.table(&field.fieldname));
            trace!(
                doctype = %after.doctype,
                table = %field.fieldname,
                inserted = diff.count(RowChange::Inserted),
                modified = diff.count(RowChange::Modified),
                deleted = diff.count(RowChange::Deleted),
                "classified child rows"
            );
            diff
        })
        .collect()
}
