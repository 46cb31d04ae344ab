// SPDX-License-Identifier: MIT OR Apache-2.0

//! Global search index over fields flagged `in_global_search`.
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use doclife_core::{DocTypeMeta, Document, MetaProvider};

const SEPARATOR: &str = " ||| ";

/// Indexed content of one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchEntry {
    pub doctype: String,
    pub name: String,
    pub title: Option<String>,
    pub content: String,
}

/// Interface to a full-text index of documents.
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the entry of a document.
    fn update(&self, entry: SearchEntry);

    fn remove(&self, doctype: &str, name: &str);

    /// Entries whose content contains `text`, ignoring case.
    fn search(&self, text: &str) -> Vec<SearchEntry>;
}

/// Search index held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySearchIndex {
    entries: Arc<RwLock<BTreeMap<(String, String), SearchEntry>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, doctype: &str, name: &str) -> Option<SearchEntry> {
        self.entries
            .read()
            .expect("acquire shared read access on search index")
            .get(&(doctype.to_owned(), name.to_owned()))
            .cloned()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn update(&self, entry: SearchEntry) {
        self.entries
            .write()
            .expect("acquire exclusive write access on search index")
            .insert((entry.doctype.clone(), entry.name.clone()), entry);
    }

    fn remove(&self, doctype: &str, name: &str) {
        self.entries
            .write()
            .expect("acquire exclusive write access on search index")
            .remove(&(doctype.to_owned(), name.to_owned()));
    }

    fn search(&self, text: &str) -> Vec<SearchEntry> {
        let needle = text.to_lowercase();
        self.entries
            .read()
            .expect("acquire shared read access on search index")
            .values()
            .filter(|entry| entry.content.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

/// Pending change of the search index, applied once the transaction committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SearchUpdate {
    Update(SearchEntry),
    Remove { doctype: String, name: String },
}

impl SearchUpdate {
    pub fn apply(self, index: &dyn SearchIndex) {
        match self {
            SearchUpdate::Update(entry) => index.update(entry),
            SearchUpdate::Remove { doctype, name } => index.remove(&doctype, &name),
        }
    }
}

fn push_content(meta: &DocTypeMeta, doc: &Document, parts: &mut Vec<String>) {
    for field in meta.global_search_fields() {
        let value = doc.value(&field.fieldname);
        if !value.is_empty() {
            parts.push(format!("{} : {value}", field.label()));
        }
    }
}

/// Search index change for a saved document.
///
/// Cancelled and disabled documents are removed from the index, documents without any searchable
/// value are left out.
pub(crate) fn index_document<P>(provider: &P, meta: &DocTypeMeta, doc: &Document) -> Option<SearchUpdate>
where
    P: MetaProvider + ?Sized,
{
    if doc.docstatus.is_cancelled() || doc.value("disabled").as_bool() {
        return Some(SearchUpdate::Remove {
            doctype: doc.doctype.clone(),
            name: doc.name().to_owned(),
        });
    }

    let mut parts = Vec::new();
    push_content(meta, doc, &mut parts);
    for table in meta.table_fields() {
        let Some(child_meta) = table
            .options
            .as_deref()
            .and_then(|doctype| provider.get_meta(doctype))
        else {
            continue;
        };
        for row in doc.table(&table.fieldname) {
            push_content(&child_meta, row, &mut parts);
        }
    }
    if parts.is_empty() {
        return None;
    }

    let title = meta
        .title_field()
        .map(|field| doc.value(&field.fieldname))
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string());
    Some(SearchUpdate::Update(SearchEntry {
        doctype: doc.doctype.clone(),
        name: doc.name().to_owned(),
        title,
        content: parts.join(SEPARATOR),
    }))
}

#[cfg(test)]
mod tests {
    use doclife_core::test_utils::{fixture_provider, item};
    use doclife_core::{DocStatus, Document};

    use super::{MemorySearchIndex, SearchIndex, SearchUpdate, index_document};

    #[test]
    fn index_searchable_fields() {
        let provider = fixture_provider();
        let index = MemorySearchIndex::new();

        let mut doc = Document::new("Item");
        doc.name = Some("WIDGET-1".into());
        doc.set("item_code", "WIDGET-1").set("item_name", "Blue Widget");

        let update = index_document(&provider, &item(), &doc).unwrap();
        update.apply(&index);
        let entry = index.get("Item", "WIDGET-1").unwrap();
        assert_eq!(entry.content, "item_name : Blue Widget");
        assert_eq!(entry.title.as_deref(), Some("Blue Widget"));
        assert_eq!(index.search("blue").len(), 1);

        doc.set("disabled", 1);
        let update = index_document(&provider, &item(), &doc).unwrap();
        assert!(matches!(update, SearchUpdate::Remove { .. }));
        update.apply(&index);
        assert!(index.search("blue").is_empty());

        let mut cancelled = Document::new("Item");
        cancelled.docstatus = DocStatus::Cancelled;
        assert!(matches!(
            index_document(&provider, &item(), &cancelled),
            Some(SearchUpdate::Remove { .. })
        ));
    }
}
