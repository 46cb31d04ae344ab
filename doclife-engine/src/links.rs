// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation of outgoing links and detection of incoming links.
use doclife_core::row::{DOCSTATUS, NAME, PARENT, PARENTTYPE};
use doclife_core::{DocStatus, DocTypeMeta, Document, FieldType, MetaProvider, Row, Value};
use doclife_store::{Filter, RowStore};
use tracing::debug;

use crate::error::{DocumentError, StoreResultExt};

/// Field which points at the cancelled document an amendment was created from.
pub const AMENDED_FROM: &str = "amended_from";

fn row_docstatus(row: &Row) -> DocStatus {
    row.get(DOCSTATUS)
        .and_then(Value::as_i64)
        .and_then(|status| DocStatus::try_from(status).ok())
        .unwrap_or_default()
}

#[derive(Default)]
struct LinkProblems {
    missing: Vec<String>,
    cancelled: Vec<String>,
}

async fn check_links<S, P>(
    store: &S,
    provider: &P,
    meta: &DocTypeMeta,
    doc: &Document,
    problems: &mut LinkProblems,
) -> Result<(), DocumentError>
where
    S: RowStore,
    P: MetaProvider + ?Sized,
{
    for field in meta.link_fields() {
        let value = doc.value(&field.fieldname);
        let Some(name) = value.as_str().filter(|name| !name.trim().is_empty()) else {
            continue;
        };
        let target = match field.fieldtype {
            FieldType::DynamicLink => field
                .options
                .as_deref()
                .and_then(|source| doc.get_str(source))
                .map(str::to_owned),
            _ => field.options.clone(),
        };
        let Some(target) = target.filter(|target| !target.is_empty()) else {
            continue;
        };

        let label = if doc.is_child() {
            format!("row {} {}: {name}", doc.idx, field.label())
        } else {
            format!("{}: {name}", field.label())
        };
        let Some(target_meta) = provider.get_meta(&target) else {
            problems.missing.push(label);
            continue;
        };
        if target_meta.is_single {
            if name != target {
                problems.missing.push(label);
            }
            continue;
        }

        match store.get_row(&target, name, false).await.or_store_err()? {
            None => problems.missing.push(label),
            Some(row)
                if target_meta.is_submittable
                    && field.fieldname != AMENDED_FROM
                    && row_docstatus(&row).is_cancelled() =>
            {
                problems.cancelled.push(label)
            }
            Some(_) => (),
        }
    }
    Ok(())
}

/// Every link of the document and its child rows must point at an existing document which is
/// not cancelled. `amended_from` may point at a cancelled document.
pub(crate) async fn validate_links<S, P>(
    store: &S,
    provider: &P,
    meta: &DocTypeMeta,
    doc: &Document,
) -> Result<(), DocumentError>
where
    S: RowStore,
    P: MetaProvider + ?Sized,
{
    let mut problems = LinkProblems::default();
    check_links(store, provider, meta, doc, &mut problems).await?;
    for table in meta.table_fields() {
        let Some(child_meta) = table
            .options
            .as_deref()
            .and_then(|doctype| provider.get_meta(doctype))
        else {
            continue;
        };
        for row in doc.table(&table.fieldname) {
            check_links(store, provider, &child_meta, row, &mut problems).await?;
        }
    }

    if !problems.missing.is_empty() {
        return Err(DocumentError::LinkValidation {
            doctype: doc.doctype.clone(),
            links: problems.missing,
        });
    }
    if !problems.cancelled.is_empty() {
        return Err(DocumentError::CancelledLink {
            doctype: doc.doctype.clone(),
            links: problems.cancelled,
        });
    }
    Ok(())
}

/// Fail if another document links to this one.
///
/// When cancelling only submitted documents block, when deleting every document which is not
/// cancelled does. Links from child rows count with the docstatus of their parent, rows of the
/// document itself and `amended_from` links are ignored.
pub(crate) async fn check_no_back_links<S, P>(
    store: &S,
    provider: &P,
    doc: &Document,
    for_cancel: bool,
) -> Result<(), DocumentError>
where
    S: RowStore,
    P: MetaProvider + ?Sized,
{
    let blocks = |status: DocStatus| {
        if for_cancel {
            status.is_submitted()
        } else {
            !status.is_cancelled()
        }
    };
    let linked = |linked_doctype: &str, linked_name: &str| DocumentError::LinkExists {
        doctype: doc.doctype.clone(),
        name: doc.name().to_owned(),
        linked_doctype: linked_doctype.to_owned(),
        linked_name: linked_name.to_owned(),
    };

    for (linked_meta, field) in provider.get_linked_fields(&doc.doctype) {
        if field.fieldname == AMENDED_FROM {
            continue;
        }

        if linked_meta.is_single {
            let single = store.get_single(&linked_meta.name).await.or_store_err()?;
            if !for_cancel
                && single.is_some_and(|row| row.get_str(&field.fieldname) == Some(doc.name()))
            {
                return Err(linked(&linked_meta.name, &linked_meta.name));
            }
            continue;
        }

        let mut filter = Filter::new().eq(&field.fieldname, doc.name());
        if field.fieldtype == FieldType::DynamicLink
            && let Some(source) = field.options.as_deref()
        {
            filter = filter.eq(source, doc.doctype.as_str());
        }

        for row in store
            .get_rows(&linked_meta.name, &filter)
            .await
            .or_store_err()?
        {
            let (doctype, name, status) = if linked_meta.is_table {
                let (Some(parenttype), Some(parent)) = (row.get_str(PARENTTYPE), row.get_str(PARENT))
                else {
                    continue;
                };
                if parenttype == doc.doctype && parent == doc.name() {
                    continue;
                }
                let status = store
                    .get_row(parenttype, parent, false)
                    .await
                    .or_store_err()?
                    .map(|row| row_docstatus(&row))
                    .unwrap_or_default();
                (parenttype.to_owned(), parent.to_owned(), status)
            } else {
                let name = row.get_str(NAME).unwrap_or_default();
                if linked_meta.name == doc.doctype && name == doc.name() {
                    continue;
                }
                (linked_meta.name.clone(), name.to_owned(), row_docstatus(&row))
            };

            if blocks(status) {
                debug!(
                    doctype = %doc.doctype,
                    name = doc.name(),
                    linked_doctype = %doctype,
                    linked_name = %name,
                    "document is linked"
                );
                return Err(linked(&doctype, &name));
            }
        }
    }
    Ok(())
}
