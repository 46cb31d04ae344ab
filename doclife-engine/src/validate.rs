// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation passes run on a document and all its child rows before it is persisted.
use std::sync::Arc;

use doclife_core::{DocTypeMeta, Document, FieldDef, FieldType, MetaProvider};

use crate::diff::{RowChange, diff_table};
use crate::error::DocumentError;

/// Child rows of a document together with the schema of their doctype.
fn child_rows<'a, P>(
    provider: &P,
    meta: &DocTypeMeta,
    doc: &'a Document,
) -> Vec<(Arc<DocTypeMeta>, &'a Document)>
where
    P: MetaProvider + ?Sized,
{
    let mut rows = Vec::new();
    for table in meta.table_fields() {
        let Some(child_meta) = table
            .options
            .as_deref()
            .and_then(|doctype| provider.get_meta(doctype))
        else {
            continue;
        };
        for row in doc.table(&table.fieldname) {
            rows.push((child_meta.clone(), row));
        }
    }
    rows
}

fn row_label(row: &Document, field: &FieldDef) -> String {
    format!("{} row {}: {}", row.doctype, row.idx, field.label())
}

/// Collect every missing mandatory value of the document and its child rows into one error.
pub(crate) fn check_mandatory<P>(
    provider: &P,
    meta: &DocTypeMeta,
    doc: &Document,
) -> Result<(), DocumentError>
where
    P: MetaProvider + ?Sized,
{
    let mut missing = Vec::new();
    for field in meta.fields.iter().filter(|field| field.reqd) {
        let empty = if field.is_table() {
            doc.table(&field.fieldname).is_empty()
        } else {
            doc.value(&field.fieldname).is_empty()
        };
        if empty {
            missing.push(field.label().to_owned());
        }
    }

    for (child_meta, row) in child_rows(provider, meta, doc) {
        for field in child_meta.scalar_fields().filter(|field| field.reqd) {
            if row.value(&field.fieldname).is_empty() {
                missing.push(row_label(row, field));
            }
        }
    }

    if missing.is_empty() {
        return Ok(());
    }
    Err(DocumentError::Mandatory {
        doctype: doc.doctype.clone(),
        name: doc.name().to_owned(),
        fields: missing,
    })
}

fn check_values(
    meta: &DocTypeMeta,
    doc: &Document,
    label: impl Fn(&FieldDef) -> String,
    negative: &mut Vec<String>,
) -> Result<(), DocumentError> {
    for field in meta.scalar_fields() {
        let value = doc.value(&field.fieldname);
        if value.is_empty() {
            continue;
        }

        if field.non_negative
            && field.fieldtype.is_numeric()
            && value.as_f64().is_some_and(|number| number < 0.0)
        {
            negative.push(label(field));
        }

        if let Some(max) = field.max_length()
            && let Some(text) = value.as_str()
            && text.chars().count() > max
        {
            return Err(DocumentError::Validation(format!(
                "{}: value is too long, at most {max} characters are allowed",
                label(field)
            )));
        }

        if field.fieldtype == FieldType::Select {
            let options = field.select_options();
            let text = value.to_string();
            if !options.is_empty() && !options.contains(&text.as_str()) {
                return Err(DocumentError::Validation(format!(
                    "{}: '{text}' is not one of {}",
                    label(field),
                    options.join(", ")
                )));
            }
        }
    }
    Ok(())
}

/// Check value constraints: non-negative numbers, maximum lengths and select options.
///
/// Negative values are reported together, the other constraints fail on the first violation.
pub(crate) fn validate_values<P>(
    provider: &P,
    meta: &DocTypeMeta,
    doc: &Document,
) -> Result<(), DocumentError>
where
    P: MetaProvider + ?Sized,
{
    let mut negative = Vec::new();
    check_values(meta, doc, |field| field.label().to_owned(), &mut negative)?;
    for (child_meta, row) in child_rows(provider, meta, doc) {
        check_values(&child_meta, row, |field| row_label(row, field), &mut negative)?;
    }

    if negative.is_empty() {
        return Ok(());
    }
    Err(DocumentError::NonNegative {
        doctype: doc.doctype.clone(),
        fields: negative,
    })
}

fn same_rows(before: &[Document], after: &[Document]) -> bool {
    before.len() == after.len()
        && before
            .iter()
            .zip(after)
            .all(|(previous, current)| previous.fields().eq(current.fields()))
}

/// Fields which can only be set once must keep their stored value.
///
/// Tables are compared by row count and the field values of every row.
pub(crate) fn validate_set_only_once(
    meta: &DocTypeMeta,
    doc: &Document,
    before: &Document,
) -> Result<(), DocumentError> {
    let changed: Vec<String> = meta
        .set_only_once_fields()
        .filter(|field| {
            if field.is_table() {
                !same_rows(before.table(&field.fieldname), doc.table(&field.fieldname))
            } else {
                before.value(&field.fieldname) != doc.value(&field.fieldname)
            }
        })
        .map(|field| field.label().to_owned())
        .collect();

    if changed.is_empty() {
        return Ok(());
    }
    Err(DocumentError::CannotChangeConstant {
        doctype: doc.doctype.clone(),
        fields: changed,
    })
}

/// Only fields flagged `allow_on_submit` may change on a submitted document.
///
/// Rows can only be added to or removed from tables which are flagged themselves, fields of
/// existing rows follow the flags of the child doctype.
pub(crate) fn validate_update_after_submit<P>(
    provider: &P,
    meta: &DocTypeMeta,
    doc: &Document,
    before: &Document,
) -> Result<(), DocumentError>
where
    P: MetaProvider + ?Sized,
{
    let mut changed = Vec::new();
    for field in meta.scalar_fields().filter(|field| !field.allow_on_submit) {
        if before.value(&field.fieldname) != doc.value(&field.fieldname) {
            changed.push(field.label().to_owned());
        }
    }

    for table in meta.table_fields() {
        let previous = before.table(&table.fieldname);
        let current = doc.table(&table.fieldname);
        let diff = diff_table(&table.fieldname, previous, current);
        if !table.allow_on_submit
            && (!diff.deleted.is_empty() || diff.rows.contains(&RowChange::Inserted))
        {
            changed.push(table.label().to_owned());
        }

        let Some(child_meta) = table
            .options
            .as_deref()
            .and_then(|doctype| provider.get_meta(doctype))
        else {
            continue;
        };
        for (row, change) in current.iter().zip(&diff.rows) {
            if *change != RowChange::Modified {
                continue;
            }
            let Some(stored) = previous.iter().find(|stored| stored.name() == row.name()) else {
                continue;
            };
            for field in child_meta
                .scalar_fields()
                .filter(|field| !field.allow_on_submit)
            {
                if stored.value(&field.fieldname) != row.value(&field.fieldname) {
                    changed.push(row_label(row, field));
                }
            }
        }
    }

    if changed.is_empty() {
        return Ok(());
    }
    Err(DocumentError::CannotChangeConstant {
        doctype: doc.doctype.clone(),
        fields: changed,
    })
}
