// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document engine: loading, construction and direct updates of documents.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use doclife_core::row::{MODIFIED, MODIFIED_BY};
use doclife_core::{
    DocTypeMeta, Document, DocumentBuildError, MetaCache, MetaProvider, PermType, Row, Timestamp,
    Value,
};
use doclife_store::{Filter, RowStore, Transaction};
use tokio::sync::broadcast;
use tracing::debug;

use crate::builder::EngineBuilder;
use crate::config::{Config, FieldUpdatePolicy};
use crate::context::{Actor, Context};
use crate::error::{DocumentError, StoreResultExt};
use crate::events::{Event, EventBus};
use crate::hooks::{DocEvent, HookContext, HookDispatcher, HookOutput};
use crate::links::AMENDED_FROM;
use crate::naming::make_hash_name;
use crate::permissions::{self, LevelAccess};
use crate::queue::ActionQueue;
use crate::remote::RemoteMethods;
use crate::search::SearchIndex;
use crate::transition::Action;

/// Doctype of comments recorded against documents.
pub const COMMENT_DOCTYPE: &str = "Comment";

/// Storage backends the engine can work with.
pub trait DocumentStore: RowStore + Transaction + Clone {}

impl<T> DocumentStore for T where T: RowStore + Transaction + Clone {}

/// Process-wide cache of loaded documents.
#[derive(Clone, Debug, Default)]
pub(crate) struct DocumentCache {
    documents: Arc<RwLock<HashMap<(String, String), Document>>>,
}

impl DocumentCache {
    pub fn get(&self, doctype: &str, name: &str) -> Option<Document> {
        self.documents
            .read()
            .expect("acquire shared read access on document cache")
            .get(&(doctype.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn insert(&self, doc: Document) {
        self.documents
            .write()
            .expect("acquire exclusive write access on document cache")
            .insert((doc.doctype.clone(), doc.name().to_owned()), doc);
    }

    pub fn invalidate(&self, doctype: &str, name: &str) {
        self.documents
            .write()
            .expect("acquire exclusive write access on document cache")
            .remove(&(doctype.to_owned(), name.to_owned()));
    }
}

/// Loads, validates and persists documents and runs their lifecycle hooks.
///
/// The engine is cheap to clone, all clones share the same store, schema cache, hooks, caches
/// and queues.
#[derive(Clone)]
pub struct Engine<S> {
    pub(crate) store: S,
    pub(crate) meta: Arc<MetaCache<Arc<dyn MetaProvider>>>,
    pub(crate) hooks: Arc<HookDispatcher>,
    pub(crate) search: Arc<dyn SearchIndex>,
    pub(crate) remote: Arc<RemoteMethods>,
    pub(crate) config: Arc<Config>,
    pub(crate) events: EventBus,
    pub(crate) cache: DocumentCache,
    pub(crate) queue: ActionQueue,
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S> Engine<S>
where
    S: DocumentStore,
{
    pub fn builder(store: S) -> EngineBuilder<S> {
        EngineBuilder::new(store)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn remote_methods(&self) -> &RemoteMethods {
        &self.remote
    }

    pub fn search_index(&self) -> &dyn SearchIndex {
        self.search.as_ref()
    }

    /// Subscribe to realtime events of committed changes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Schema of a doctype.
    pub fn meta(&self, doctype: &str) -> Result<Arc<DocTypeMeta>, DocumentError> {
        self.meta
            .get_meta(doctype)
            .ok_or_else(|| DocumentError::Meta(doctype.to_owned()))
    }

    /// Drop the cached schema of a doctype after it changed.
    pub fn invalidate_meta(&self, doctype: &str) {
        self.meta.invalidate(doctype);
    }

    pub fn has_permission(&self, actor: &Actor, doctype: &str, ptype: PermType) -> bool {
        self.meta(doctype)
            .is_ok_and(|meta| permissions::has_permission(&self.config, &meta, actor, ptype))
    }

    /// Set every field the actor can not read at its permission level to `Null`, including the
    /// fields of child rows.
    pub fn apply_fieldlevel_read_permissions(
        &self,
        actor: &Actor,
        doc: &mut Document,
    ) -> Result<(), DocumentError> {
        let meta = self.meta(&doc.doctype)?;
        let access = LevelAccess::new(&self.config, &meta, actor, PermType::Read);
        permissions::mask_unreadable_fields(self.meta.as_ref(), &meta, &access, doc);
        Ok(())
    }

    /// Fill unset fields of the document and its child rows with their schema defaults.
    pub(crate) fn set_defaults(&self, meta: &DocTypeMeta, doc: &mut Document) {
        fn apply(meta: &DocTypeMeta, doc: &mut Document) {
            for field in meta.scalar_fields() {
                if let Some(default) = &field.default
                    && doc.get(&field.fieldname).is_none_or(Value::is_null)
                {
                    doc.set(&field.fieldname, default.clone());
                }
            }
        }

        apply(meta, doc);
        for table in meta.table_fields() {
            let Some(child_meta) = table
                .options
                .as_deref()
                .and_then(|doctype| self.meta.get_meta(doctype))
            else {
                continue;
            };
            if doc.has_table(&table.fieldname) {
                for row in doc.table_mut(&table.fieldname) {
                    apply(&child_meta, row);
                }
            }
        }
    }

    /// Fresh document with schema defaults applied.
    pub fn new_doc(&self, doctype: &str) -> Result<Document, DocumentError> {
        let meta = self.meta(doctype)?;
        let mut doc = Document::new(doctype);
        self.set_defaults(&meta, &mut doc);
        Ok(doc)
    }

    /// Fresh child row for a table field of `parent`, appended to it.
    pub fn append_row<'a>(
        &self,
        parent: &'a mut Document,
        table: &str,
    ) -> Result<&'a mut Document, DocumentError> {
        let meta = self.meta(&parent.doctype)?;
        let child_doctype = meta
            .get_field(table)
            .filter(|field| field.is_table())
            .and_then(|field| field.options.clone())
            .ok_or_else(|| DocumentError::UnknownField {
                doctype: parent.doctype.clone(),
                fieldname: table.to_owned(),
            })?;
        let child = self.new_doc(&child_doctype)?;
        Ok(parent.append(table, child))
    }

    /// Build a transient document from a JSON object.
    ///
    /// Entries of table fields do not need to carry their doctype, it is taken from the schema.
    pub fn doc_from_json(&self, value: &serde_json::Value) -> Result<Document, DocumentError> {
        let object = value.as_object().ok_or(DocumentBuildError::NotAnObject)?;
        let doctype = object
            .get("doctype")
            .and_then(serde_json::Value::as_str)
            .ok_or(DocumentBuildError::MissingDocType)?;
        let meta = self.meta(doctype)?;

        let mut object = object.clone();
        for table in meta.table_fields() {
            let (Some(child_doctype), Some(serde_json::Value::Array(rows))) =
                (table.options.as_deref(), object.get_mut(&table.fieldname))
            else {
                continue;
            };
            for row in rows.iter_mut() {
                if let Some(row) = row.as_object_mut() {
                    row.entry("doctype")
                        .or_insert_with(|| child_doctype.into());
                }
            }
        }
        Ok(Document::from_json(&serde_json::Value::Object(object))?)
    }

    async fn load_children(
        &self,
        meta: &DocTypeMeta,
        doc: &mut Document,
    ) -> Result<(), DocumentError> {
        for table in meta.table_fields() {
            let Some(child_doctype) = table.options.as_deref() else {
                continue;
            };
            let filter = Filter::children_of(&doc.doctype, doc.name(), &table.fieldname);
            let rows = self
                .store
                .get_rows(child_doctype, &filter)
                .await
                .or_store_err()?;
            let children = rows
                .into_iter()
                .map(|row| Document::from_row(child_doctype, row))
                .collect::<Result<Vec<_>, _>>()?;
            doc.set_table(&table.fieldname, children);
        }
        doc.mark_persisted();
        Ok(())
    }

    /// Load a stored document with all its child rows.
    pub(crate) async fn load(
        &self,
        meta: &DocTypeMeta,
        name: &str,
        for_update: bool,
    ) -> Result<Document, DocumentError> {
        if name.chars().count() > self.config.max_name_length {
            return Err(DocumentError::InvalidName(format!(
                "'{name}' is longer than {} characters",
                self.config.max_name_length
            )));
        }

        let not_found = || DocumentError::NotFound {
            doctype: meta.name.clone(),
            name: name.to_owned(),
        };
        let row = if meta.is_single {
            self.store.get_single(&meta.name).await.or_store_err()?
        } else {
            self.store
                .get_row(&meta.name, name, for_update)
                .await
                .or_store_err()?
        };
        let mut doc = Document::from_row(&meta.name, row.ok_or_else(not_found)?)?;
        self.load_children(meta, &mut doc).await?;
        Ok(doc)
    }

    /// Load a document by name.
    pub async fn get_doc(&self, doctype: &str, name: &str) -> Result<Document, DocumentError> {
        let meta = self.meta(doctype)?;
        self.load(&meta, name, false).await
    }

    /// Load a document by name, locking its row for the running transaction.
    pub async fn get_doc_for_update(
        &self,
        doctype: &str,
        name: &str,
    ) -> Result<Document, DocumentError> {
        let meta = self.meta(doctype)?;
        self.load(&meta, name, true).await
    }

    /// Load the first document matching `filter`.
    pub async fn get_doc_by_filter(
        &self,
        doctype: &str,
        filter: &Filter,
    ) -> Result<Document, DocumentError> {
        let meta = self.meta(doctype)?;
        let rows = self.store.get_rows(doctype, filter).await.or_store_err()?;
        let Some(name) = rows.first().map(|row| row.name().to_owned()) else {
            return Err(DocumentError::NotFound {
                doctype: doctype.to_owned(),
                name: format!("{:?}", filter.conditions()),
            });
        };
        self.load(&meta, &name, false).await
    }

    /// Load the document of a single doctype.
    ///
    /// A single which was never saved yields a fresh document with defaults, named after its
    /// doctype.
    pub async fn get_single(&self, doctype: &str) -> Result<Document, DocumentError> {
        let meta = self.meta(doctype)?;
        if !meta.is_single {
            return Err(DocumentError::Validation(format!("{doctype} is not a single doctype")));
        }
        match self.load(&meta, doctype, false).await {
            Err(DocumentError::NotFound { .. }) => {
                let mut doc = self.new_doc(doctype)?;
                doc.name = Some(doctype.to_owned());
                Ok(doc)
            }
            result => result,
        }
    }

    /// Replace the document with its stored version.
    pub async fn reload(&self, doc: &mut Document) -> Result<(), DocumentError> {
        let meta = self.meta(&doc.doctype)?;
        *doc = self.load(&meta, doc.name(), false).await?;
        Ok(())
    }

    /// Load a document through the document cache.
    pub async fn get_cached_doc(
        &self,
        doctype: &str,
        name: &str,
    ) -> Result<Document, DocumentError> {
        if let Some(doc) = self.cache.get(doctype, name) {
            return Ok(doc);
        }
        let doc = self.get_doc(doctype, name).await?;
        self.cache.insert(doc.clone());
        Ok(doc)
    }

    /// Run the hooks of one event on a document outside of the lifecycle.
    pub fn run_method(
        &self,
        ctx: &Context,
        doc: &mut Document,
        event: DocEvent,
    ) -> Result<HookOutput, DocumentError> {
        self.hooks.run(&HookContext::new(&ctx.actor, event), doc)
    }

    /// Apply an update request to a document and save it.
    ///
    /// Unknown fields fail the request. Changes to read-only fields or fields of a permission
    /// level the actor can not write are dropped or rejected depending on the configured
    /// [`FieldUpdatePolicy`]. Standard columns in the payload are ignored.
    pub async fn apply_update(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
        payload: &serde_json::Value,
    ) -> Result<Action, DocumentError> {
        let object = payload.as_object().ok_or(DocumentBuildError::NotAnObject)?;
        let meta = self.meta(&doc.doctype)?;
        let access = if ctx.flags.ignore_permissions {
            LevelAccess::unrestricted()
        } else {
            LevelAccess::new(&self.config, &meta, &ctx.actor, PermType::Write)
        };

        for (key, value) in object {
            if key == "doctype" || doclife_core::row::is_standard_column(key) {
                continue;
            }
            let field = meta
                .get_field(key)
                .ok_or_else(|| DocumentError::UnknownField {
                    doctype: doc.doctype.clone(),
                    fieldname: key.clone(),
                })?;

            let protected = field.is_read_only() || !access.allows(field.permlevel);
            if field.is_table() {
                let rows = value.as_array().map(Vec::as_slice).unwrap_or_default();
                let rows =
                    self.update_rows(&access, doc.table(key), field.options.as_deref(), rows)?;
                if protected && !same_table(doc.table(key), &rows) {
                    self.protected_field(&meta, field.permlevel, key, field.is_read_only())?;
                    continue;
                }
                doc.set_table(key, rows);
            } else {
                let value = Value::from_json(value)
                    .map_err(|err| DocumentBuildError::InvalidValue(key.clone(), err))?;
                if protected && doc.value(key) != value {
                    self.protected_field(&meta, field.permlevel, key, field.is_read_only())?;
                    continue;
                }
                doc.set(key, value);
            }
        }

        self.save(ctx, doc).await
    }

    fn protected_field(
        &self,
        meta: &DocTypeMeta,
        permlevel: u8,
        fieldname: &str,
        read_only: bool,
    ) -> Result<(), DocumentError> {
        match self.config.field_update_policy {
            FieldUpdatePolicy::Revert => {
                debug!(doctype = %meta.name, field = fieldname, "ignore change of protected field");
                Ok(())
            }
            FieldUpdatePolicy::Reject if read_only => Err(DocumentError::ReadOnlyField {
                doctype: meta.name.clone(),
                fieldname: fieldname.to_owned(),
            }),
            FieldUpdatePolicy::Reject => Err(DocumentError::FieldPermission {
                doctype: meta.name.clone(),
                fieldname: fieldname.to_owned(),
                permlevel,
            }),
        }
    }

    /// Merge JSON rows into the current rows of a table, rows are matched by name.
    ///
    /// Changed fields of existing rows go through the same policy as parent fields when they are
    /// read-only or of a level the actor can not write.
    fn update_rows(
        &self,
        access: &LevelAccess,
        current: &[Document],
        child_doctype: Option<&str>,
        rows: &[serde_json::Value],
    ) -> Result<Vec<Document>, DocumentError> {
        let child_doctype = child_doctype.unwrap_or_default();
        let child_meta = self.meta(child_doctype)?;
        let mut updated = Vec::with_capacity(rows.len());
        for entry in rows {
            let mut entry = entry
                .as_object()
                .cloned()
                .ok_or(DocumentBuildError::NotAnObject)?;
            entry.insert("doctype".into(), child_doctype.into());
            let incoming = Document::from_json(&serde_json::Value::Object(entry))?;

            let existing = incoming
                .name
                .as_deref()
                .and_then(|name| current.iter().find(|row| row.name() == name));
            let row = match existing {
                Some(existing) => {
                    let mut row = existing.clone();
                    for (fieldname, value) in incoming.fields() {
                        if let Some(field) = child_meta.get_field(fieldname)
                            && (field.is_read_only() || !access.allows(field.permlevel))
                            && row.value(fieldname) != *value
                        {
                            self.protected_field(
                                &child_meta,
                                field.permlevel,
                                fieldname,
                                field.is_read_only(),
                            )?;
                            continue;
                        }
                        row.set(fieldname, value.clone());
                    }
                    row
                }
                None => {
                    let mut row = incoming;
                    self.set_defaults(&child_meta, &mut row);
                    row
                }
            };
            updated.push(row);
        }
        Ok(updated)
    }

    /// Write a value directly, skipping validation.
    ///
    /// `modified` is only bumped when asked for and the document is not being saved within
    /// `ctx` right now. `BeforeChange` and `OnChange` hooks still run.
    pub async fn db_set(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
        fieldname: &str,
        value: impl Into<Value>,
        update_modified: bool,
    ) -> Result<(), DocumentError> {
        let meta = self.meta(&doc.doctype)?;
        if !meta.has_field(fieldname) {
            return Err(DocumentError::UnknownField {
                doctype: doc.doctype.clone(),
                fieldname: fieldname.to_owned(),
            });
        }
        let value = value.into();

        let snapshot = doc.clone();
        let mark = ctx.mark();
        let permit = self.store.begin().await.or_store_err()?;
        let result = self
            .db_set_inner(ctx, &meta, doc, fieldname, value, update_modified)
            .await;
        self.finish(permit, ctx, doc, snapshot, mark, result).await
    }

    async fn db_set_inner(
        &self,
        ctx: &mut Context,
        meta: &DocTypeMeta,
        doc: &mut Document,
        fieldname: &str,
        value: Value,
        update_modified: bool,
    ) -> Result<(), DocumentError> {
        self.hooks
            .run(&HookContext::new(&ctx.actor, DocEvent::BeforeChange), doc)?;
        doc.set(fieldname, value.clone());

        let mut values = Row::new();
        values.set(fieldname, value);
        let bump = update_modified && !ctx.is_in_flight(&doc.doctype, doc.name());
        if bump {
            let modified = Timestamp::after(doc.modified);
            doc.modified = Some(modified);
            doc.modified_by = Some(ctx.actor.user.clone());
            values.set(MODIFIED, modified.to_value());
            values.set(MODIFIED_BY, ctx.actor.user.as_str());
        }

        if meta.is_single {
            let mut row = self
                .store
                .get_single(&meta.name)
                .await
                .or_store_err()?
                .unwrap_or_default();
            row.merge(values);
            self.store.set_single(&meta.name, row).await.or_store_err()?;
        } else if !self
            .store
            .update_row(&doc.doctype, doc.name(), values)
            .await
            .or_store_err()?
        {
            return Err(DocumentError::NotFound {
                doctype: doc.doctype.clone(),
                name: doc.name().to_owned(),
            });
        }
        if bump {
            doc.mark_persisted();
        }

        self.cache.invalidate(&doc.doctype, doc.name());
        self.notify_update(ctx, meta, doc);
        self.hooks
            .run(&HookContext::new(&ctx.actor, DocEvent::OnChange), doc)?;
        Ok(())
    }

    /// Draft copy of a cancelled document which amends it.
    ///
    /// Fields flagged `no_copy` are left out, `amended_from` points at the cancelled document.
    /// The name is resolved on insert.
    pub fn amend(&self, doc: &Document) -> Result<Document, DocumentError> {
        if !doc.docstatus.is_cancelled() {
            return Err(DocumentError::Validation(format!(
                "{} {} is not cancelled and can not be amended",
                doc.doctype,
                doc.name()
            )));
        }
        let meta = self.meta(&doc.doctype)?;
        if !meta.has_field(AMENDED_FROM) {
            return Err(DocumentError::Validation(format!(
                "{} documents can not be amended",
                doc.doctype
            )));
        }

        let mut amendment = copy_fields(&meta, doc);
        for table in meta.table_fields().filter(|table| !table.no_copy) {
            let Some(child_meta) = table
                .options
                .as_deref()
                .and_then(|doctype| self.meta.get_meta(doctype))
            else {
                continue;
            };
            let rows = doc
                .table(&table.fieldname)
                .iter()
                .map(|row| copy_fields(&child_meta, row))
                .collect();
            amendment.set_table(&table.fieldname, rows);
        }
        amendment.set(AMENDED_FROM, doc.name());
        Ok(amendment)
    }

    /// Record a comment against a document in its own transaction.
    pub async fn add_comment(
        &self,
        ctx: &mut Context,
        doctype: &str,
        name: &str,
        comment_type: &str,
        content: &str,
    ) -> Result<Document, DocumentError> {
        let now = Timestamp::now();
        let mut comment = Document::new(COMMENT_DOCTYPE);
        comment.name = Some(make_hash_name());
        comment.owner = Some(ctx.actor.user.clone());
        comment.modified_by = Some(ctx.actor.user.clone());
        comment.creation = Some(now);
        comment.modified = Some(now);
        comment
            .set("comment_type", comment_type)
            .set("reference_doctype", doctype)
            .set("reference_name", name)
            .set("content", content);

        let snapshot = comment.clone();
        let mark = ctx.mark();
        let permit = self.store.begin().await.or_store_err()?;
        let result = self.insert_comment(ctx, &comment, doctype, name).await;
        self.finish(permit, ctx, &mut comment, snapshot, mark, result)
            .await?;
        comment.mark_persisted();
        Ok(comment)
    }

    async fn insert_comment(
        &self,
        ctx: &mut Context,
        comment: &Document,
        doctype: &str,
        name: &str,
    ) -> Result<(), DocumentError> {
        if !self
            .store
            .insert_row(COMMENT_DOCTYPE, comment.to_row())
            .await
            .or_store_err()?
        {
            return Err(DocumentError::DuplicateEntry {
                doctype: COMMENT_DOCTYPE.to_owned(),
                name: comment.name().to_owned(),
            });
        }
        if self.config.notify_update {
            ctx.push_event(Event::DocUpdate {
                doctype: doctype.to_owned(),
                name: name.to_owned(),
                modified: None,
                user: ctx.actor.user.clone(),
            });
        }
        Ok(())
    }

    /// Commit or roll back the transaction of a lifecycle operation.
    ///
    /// On failure the document is restored to the state it had before the operation and side
    /// effects queued in the meantime are dropped.
    pub(crate) async fn finish<T>(
        &self,
        permit: <S as Transaction>::Permit,
        ctx: &mut Context,
        doc: &mut Document,
        snapshot: Document,
        mark: crate::context::PendingMark,
        result: Result<T, DocumentError>,
    ) -> Result<T, DocumentError> {
        match result {
            Ok(value) => {
                self.store.commit(permit).await.or_store_err()?;
                self.flush(ctx);
                Ok(value)
            }
            Err(err) => {
                debug!(doctype = %doc.doctype, name = doc.name(), "roll back: {err}");
                self.store.rollback(permit).await.or_store_err()?;
                *doc = snapshot;
                ctx.discard_since(mark);
                Err(err)
            }
        }
    }

    /// Apply side effects which waited for their transaction to commit.
    pub(crate) fn flush(&self, ctx: &mut Context) {
        for update in ctx.take_search_updates() {
            update.apply(self.search.as_ref());
        }
        self.events.publish(ctx.take_events());
    }

    /// Queue realtime events about a changed document.
    pub(crate) fn notify_update(&self, ctx: &mut Context, meta: &DocTypeMeta, doc: &Document) {
        if !self.config.notify_update || meta.is_table {
            return;
        }
        ctx.push_event(Event::DocUpdate {
            doctype: doc.doctype.clone(),
            name: doc.name().to_owned(),
            modified: doc.modified,
            user: ctx.actor.user.clone(),
        });
        if !meta.is_single {
            ctx.push_event(Event::ListUpdate {
                doctype: doc.doctype.clone(),
                name: doc.name().to_owned(),
                user: ctx.actor.user.clone(),
            });
        }
    }
}

fn copy_fields(meta: &DocTypeMeta, doc: &Document) -> Document {
    let mut copy = Document::new(&doc.doctype);
    for field in meta.scalar_fields().filter(|field| !field.no_copy) {
        if let Some(value) = doc.get(&field.fieldname) {
            copy.set(&field.fieldname, value.clone());
        }
    }
    copy
}

fn same_table(current: &[Document], updated: &[Document]) -> bool {
    current.len() == updated.len()
        && current
            .iter()
            .zip(updated)
            .all(|(row, other)| row.name == other.name && row.fields().eq(other.fields()))
}
