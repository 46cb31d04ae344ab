// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to doctype schemas.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::schema::{DocTypeMeta, FieldDef, FieldType, PermRule, WorkflowDef};

/// Interface to look up the schema of a doctype.
///
/// Only `get_meta` and `doctypes` need to be provided, the remaining methods are views on the
/// returned schema.
pub trait MetaProvider: Send + Sync {
    /// Schema of the doctype or `None` if it is unknown.
    fn get_meta(&self, doctype: &str) -> Option<Arc<DocTypeMeta>>;

    /// Names of all known doctypes.
    fn doctypes(&self) -> Vec<String>;

    fn get_fields(&self, doctype: &str) -> Vec<FieldDef> {
        self.get_meta(doctype)
            .map(|meta| meta.fields.clone())
            .unwrap_or_default()
    }

    fn get_table_fields(&self, doctype: &str) -> Vec<FieldDef> {
        self.get_meta(doctype)
            .map(|meta| meta.table_fields().cloned().collect())
            .unwrap_or_default()
    }

    fn get_permissions(&self, doctype: &str) -> Vec<PermRule> {
        self.get_meta(doctype)
            .map(|meta| meta.permissions.clone())
            .unwrap_or_default()
    }

    fn get_workflow(&self, doctype: &str) -> Option<WorkflowDef> {
        self.get_meta(doctype).and_then(|meta| meta.workflow.clone())
    }

    /// Link fields of all doctypes which can point at documents of `doctype`.
    ///
    /// Static links are matched by their target, every dynamic link is a candidate as the target
    /// doctype is only known per document.
    fn get_linked_fields(&self, doctype: &str) -> Vec<(Arc<DocTypeMeta>, FieldDef)> {
        let mut linked = Vec::new();
        for name in self.doctypes() {
            let Some(meta) = self.get_meta(&name) else {
                continue;
            };
            for field in meta.link_fields() {
                let candidate = match field.fieldtype {
                    FieldType::Link => field.options.as_deref() == Some(doctype),
                    _ => true,
                };
                if candidate {
                    linked.push((meta.clone(), field.clone()));
                }
            }
        }
        linked
    }
}

impl<T> MetaProvider for Arc<T>
where
    T: MetaProvider + ?Sized,
{
    fn get_meta(&self, doctype: &str) -> Option<Arc<DocTypeMeta>> {
        self.as_ref().get_meta(doctype)
    }

    fn doctypes(&self) -> Vec<String> {
        self.as_ref().doctypes()
    }
}

/// Provider holding schemas in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetaProvider {
    doctypes: Arc<RwLock<HashMap<String, Arc<DocTypeMeta>>>>,
}

impl MemoryMetaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a schema.
    pub fn insert(&self, meta: DocTypeMeta) {
        let mut doctypes = self.write_doctypes();
        doctypes.insert(meta.name.clone(), Arc::new(meta));
    }

    pub fn remove(&self, doctype: &str) -> bool {
        let mut doctypes = self.write_doctypes();
        doctypes.remove(doctype).is_some()
    }

    fn read_doctypes(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<DocTypeMeta>>> {
        self.doctypes
            .read()
            .expect("acquire shared read access on meta provider")
    }

    fn write_doctypes(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<DocTypeMeta>>> {
        self.doctypes
            .write()
            .expect("acquire exclusive write access on meta provider")
    }
}

impl MetaProvider for MemoryMetaProvider {
    fn get_meta(&self, doctype: &str) -> Option<Arc<DocTypeMeta>> {
        self.read_doctypes().get(doctype).cloned()
    }

    fn doctypes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_doctypes().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Process-wide cache in front of another provider.
///
/// Schemas are fetched from the inner provider on the first miss and kept until they get
/// invalidated. A doctype which disappeared from the inner provider is dropped from the cache on
/// the next lookup after invalidation.
#[derive(Debug)]
pub struct MetaCache<P> {
    inner: P,
    cache: RwLock<HashMap<String, Arc<DocTypeMeta>>>,
}

impl<P> MetaCache<P>
where
    P: MetaProvider,
{
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop the cached schema of one doctype, for example after it was changed.
    pub fn invalidate(&self, doctype: &str) {
        debug!(doctype, "invalidate cached doctype schema");
        self.cache
            .write()
            .expect("acquire exclusive write access on meta cache")
            .remove(doctype);
    }

    pub fn clear(&self) {
        self.cache
            .write()
            .expect("acquire exclusive write access on meta cache")
            .clear();
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P> MetaProvider for MetaCache<P>
where
    P: MetaProvider,
{
    fn get_meta(&self, doctype: &str) -> Option<Arc<DocTypeMeta>> {
        if let Some(meta) = self
            .cache
            .read()
            .expect("acquire shared read access on meta cache")
            .get(doctype)
        {
            return Some(meta.clone());
        }

        let meta = self.inner.get_meta(doctype)?;
        debug!(doctype, "cache miss, fetched doctype schema");
        self.cache
            .write()
            .expect("acquire exclusive write access on meta cache")
            .insert(doctype.to_owned(), meta.clone());
        Some(meta)
    }

    fn doctypes(&self) -> Vec<String> {
        self.inner.doctypes()
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{DocTypeMeta, FieldDef, FieldType};

    use super::{MemoryMetaProvider, MetaCache, MetaProvider};

    #[test]
    fn cache_refetches_after_invalidation() {
        let provider = MemoryMetaProvider::new();
        provider.insert(DocTypeMeta::new("Item"));
        let cache = MetaCache::new(provider.clone());

        assert!(cache.get_meta("Item").unwrap().fields.is_empty());

        provider.insert(
            DocTypeMeta::new("Item").with_field(FieldDef::new("item_name", FieldType::Data)),
        );
        // Stale until invalidated.
        assert!(cache.get_meta("Item").unwrap().fields.is_empty());

        cache.invalidate("Item");
        assert_eq!(cache.get_fields("Item").len(), 1);
        assert!(cache.get_meta("Unknown").is_none());
    }

    #[test]
    fn linked_fields() {
        let provider = MemoryMetaProvider::new();
        provider.insert(DocTypeMeta::new("Item Group"));
        provider.insert(
            DocTypeMeta::new("Item")
                .with_field(FieldDef::link("item_group", "Item Group"))
                .with_field(FieldDef::link("brand", "Brand")),
        );
        provider.insert(
            DocTypeMeta::new("Comment")
                .with_field(FieldDef::new("reference_name", FieldType::DynamicLink)),
        );

        let linked = provider.get_linked_fields("Item Group");
        let names: Vec<(&str, &str)> = linked
            .iter()
            .map(|(meta, field)| (meta.name.as_str(), field.fieldname.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Comment", "reference_name"), ("Item", "item_group")]
        );
    }
}
