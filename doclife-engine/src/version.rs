// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change history of doctypes which track changes.
use std::collections::BTreeSet;

use doclife_core::row::{CREATION, DOCSTATUS, IDX, MODIFIED, MODIFIED_BY, NAME, OWNER};
use doclife_core::{DocTypeMeta, Document, Row, Timestamp, Value};
use serde_json::json;

use crate::diff::{RowChange, TableDiff};
use crate::naming::make_hash_name;

/// Doctype of stored version rows.
pub const VERSION_DOCTYPE: &str = "Version";

fn field_changes<'a>(
    fieldnames: impl IntoIterator<Item = &'a String>,
    before: &Document,
    after: &Document,
) -> Vec<serde_json::Value> {
    fieldnames
        .into_iter()
        .filter_map(|fieldname| {
            let old = before.value(fieldname);
            let new = after.value(fieldname);
            (old != new).then(|| json!([fieldname, old.to_json(), new.to_json()]))
        })
        .collect()
}

/// Differences between the stored and the saved version of a document.
///
/// Returns `None` if nothing but audit columns changed.
pub fn version_data(
    meta: &DocTypeMeta,
    before: &Document,
    after: &Document,
    diffs: &[TableDiff],
) -> Option<serde_json::Value> {
    let fieldnames: Vec<&String> = meta
        .scalar_fields()
        .map(|field| &field.fieldname)
        .collect();
    let changed = field_changes(fieldnames, before, after);

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut row_changed = Vec::new();
    for diff in diffs {
        for row in &diff.deleted {
            removed.push(json!([diff.fieldname, row.as_json()]));
        }

        let previous = before.table(&diff.fieldname);
        for (row, change) in after.table(&diff.fieldname).iter().zip(&diff.rows) {
            match change {
                RowChange::Inserted => added.push(json!([diff.fieldname, row.as_json()])),
                RowChange::Modified => {
                    let Some(stored) = previous.iter().find(|stored| stored.name() == row.name())
                    else {
                        continue;
                    };
                    let fieldnames: BTreeSet<&String> = stored
                        .fields()
                        .chain(row.fields())
                        .map(|(fieldname, _)| fieldname)
                        .collect();
                    let changes = field_changes(fieldnames, stored, row);
                    if !changes.is_empty() {
                        row_changed.push(json!([diff.fieldname, row.idx, row.name(), changes]));
                    }
                }
                RowChange::Deleted | RowChange::Untouched => (),
            }
        }
    }

    if changed.is_empty() && added.is_empty() && removed.is_empty() && row_changed.is_empty() {
        return None;
    }
    Some(json!({
        "changed": changed,
        "added": added,
        "removed": removed,
        "row_changed": row_changed,
    }))
}

/// Row of a version referring to `doc`.
pub(crate) fn version_row(doc: &Document, data: &serde_json::Value, user: &str) -> Row {
    let now = Timestamp::now().to_value();
    [
        (NAME, Value::from(make_hash_name())),
        ("ref_doctype", Value::from(&doc.doctype)),
        ("docname", Value::from(doc.name())),
        ("data", Value::from(data.to_string())),
        (OWNER, Value::from(user)),
        (MODIFIED_BY, Value::from(user)),
        (CREATION, now.clone()),
        (MODIFIED, now),
        (DOCSTATUS, Value::Int(0)),
        (IDX, Value::Int(0)),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use doclife_core::Document;
    use doclife_core::test_utils::sales_order;
    use serde_json::json;

    use crate::diff::diff_children;

    use super::version_data;

    #[test]
    fn record_field_and_row_changes() {
        let meta = sales_order();
        let mut before = Document::new("Sales Order");
        before.set("customer", "ACME").set("remarks", "first");
        let row = before.append("items", Document::new("Sales Order Item"));
        row.name = Some("row-1".into());
        row.set("item_code", "WIDGET-1").set("qty", 1.0);

        let mut after = before.clone();
        let diffs = diff_children(&meta, Some(&before), &after);
        assert!(version_data(&meta, &before, &after, &diffs).is_none());

        after.set("remarks", "second");
        after.table_mut("items")[0].set("qty", 3.0);
        let diffs = diff_children(&meta, Some(&before), &after);
        let data = version_data(&meta, &before, &after, &diffs).unwrap();
        assert_eq!(data["changed"], json!([["remarks", "first", "second"]]));
        assert_eq!(data["row_changed"], json!([["items", 1, "row-1", [["qty", 1.0, 3.0]]]]));
        assert_eq!(data["added"], json!([]));
    }
}
