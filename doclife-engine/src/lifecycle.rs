// SPDX-License-Identifier: MIT OR Apache-2.0

//! Insert, save, submit and cancel.
//!
//! Every operation runs in its own store transaction. On success the transaction is committed and
//! realtime events and search index updates collected on the [`Context`] are applied, on failure
//! the transaction is rolled back and the document is restored to the values it had when the
//! operation was called.
use doclife_core::row::{NAME, PARENT};
use doclife_core::{DocStatus, DocTypeMeta, Document, PermType, Timestamp};
use doclife_store::{Filter, RowStore, Transaction};
use tracing::debug;

use crate::concurrency::check_if_latest;
use crate::context::Context;
use crate::diff::{RowChange, TableDiff, diff_children};
use crate::engine::{DocumentStore, Engine};
use crate::error::{DocumentError, StoreResultExt};
use crate::hooks::{DocEvent, HookContext};
use crate::permissions::{self, LevelAccess};
use crate::transition::{Action, resolve_action};
use crate::version::{VERSION_DOCTYPE, version_data, version_row};
use crate::{links, naming, search, validate, workflow};

/// Options of [`Engine::insert`].
#[derive(Clone, Debug, Default)]
pub struct InsertOptions {
    /// Use this name instead of the autoname rule of the doctype.
    pub set_name: Option<String>,

    /// Return `false` instead of failing when the name is taken already.
    pub ignore_if_duplicate: bool,
}

impl InsertOptions {
    pub fn with_name(name: &str) -> Self {
        Self {
            set_name: Some(name.to_owned()),
            ..Default::default()
        }
    }
}

fn before_save_events(action: Action) -> &'static [DocEvent] {
    match action {
        Action::Save => &[DocEvent::BeforeValidate, DocEvent::Validate, DocEvent::BeforeSave],
        Action::Submit => &[
            DocEvent::BeforeValidate,
            DocEvent::Validate,
            DocEvent::BeforeSubmit,
        ],
        Action::Cancel => &[DocEvent::BeforeCancel],
        Action::UpdateAfterSubmit => &[DocEvent::BeforeUpdateAfterSubmit],
    }
}

fn action_events(action: Action) -> &'static [DocEvent] {
    match action {
        Action::Save => &[DocEvent::OnUpdate],
        Action::Submit => &[DocEvent::OnUpdate, DocEvent::OnSubmit],
        Action::Cancel => &[DocEvent::OnCancel],
        Action::UpdateAfterSubmit => &[DocEvent::OnUpdateAfterSubmit],
    }
}

fn child_events(change: RowChange) -> &'static [DocEvent] {
    match change {
        RowChange::Inserted => &[DocEvent::AfterInsert, DocEvent::OnUpdate, DocEvent::OnChange],
        RowChange::Modified => &[DocEvent::OnUpdate, DocEvent::OnChange],
        RowChange::Deleted | RowChange::Untouched => &[],
    }
}

fn ensure_not_child(meta: &DocTypeMeta) -> Result<(), DocumentError> {
    if meta.is_table {
        return Err(DocumentError::Validation(format!(
            "{} rows can only be saved through their parent document",
            meta.name
        )));
    }
    Ok(())
}

fn ensure_submittable(meta: &DocTypeMeta, action: Action) -> Result<(), DocumentError> {
    if action != Action::Save && !meta.is_submittable {
        return Err(DocumentError::Validation(format!(
            "{} documents can not {action}",
            meta.name
        )));
    }
    Ok(())
}

impl<S> Engine<S>
where
    S: DocumentStore,
{
    /// Persist a new document and its child rows.
    ///
    /// Returns `false` if the name was taken already and [`InsertOptions::ignore_if_duplicate`]
    /// is set, nothing is written then.
    pub async fn insert(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
        options: InsertOptions,
    ) -> Result<bool, DocumentError> {
        let snapshot = doc.clone();
        let mark = ctx.mark();
        let permit = self.store.begin().await.or_store_err()?;
        let result = self.insert_inner(ctx, doc, &options).await;
        self.finish(permit, ctx, doc, snapshot, mark, result).await
    }

    async fn insert_inner(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
        options: &InsertOptions,
    ) -> Result<bool, DocumentError> {
        let meta = self.meta(&doc.doctype)?;
        ensure_not_child(&meta)?;
        permissions::check_permission(&self.config, ctx, &meta, doc.name(), PermType::Create)?;

        let action = resolve_action(&doc.doctype, doc.name(), None, doc.docstatus)?;
        ensure_submittable(&meta, action)?;
        if action != Action::Save {
            permissions::check_permission(
                &self.config,
                ctx,
                &meta,
                doc.name(),
                action.required_permission(),
            )?;
        }

        self.set_defaults(&meta, doc);
        let now = Timestamp::now();
        let user = ctx.actor.user.clone();
        let docstatus = doc.docstatus;
        let stamp = |document: &mut Document| {
            if document.owner.as_deref().is_none_or(str::is_empty) {
                document.owner = Some(user.clone());
            }
            document.creation = document.creation.or(Some(now));
            document.modified = Some(now);
            document.modified_by = Some(user.clone());
            document.docstatus = docstatus;
        };
        stamp(doc);
        doc.all_children_mut().for_each(stamp);

        self.hooks.run(
            &HookContext::new(&ctx.actor, DocEvent::BeforeInsert).with_action(Some(action)),
            doc,
        )?;

        if !ctx.flags.ignore_links {
            links::validate_links(&self.store, self.meta.as_ref(), &meta, doc).await?;
        }

        naming::set_new_name(
            &self.store,
            &self.config,
            &meta,
            doc,
            options.set_name.as_deref(),
        )
        .await?;
        debug!(doctype = %doc.doctype, name = doc.name(), %action, "insert document");

        let (doctype, name) = (doc.doctype.clone(), doc.name().to_owned());
        ctx.enter(&doctype, &name);
        let result = self.insert_named(ctx, &meta, doc, action, options).await;
        ctx.leave(&doctype, &name);
        result
    }

    async fn insert_named(
        &self,
        ctx: &mut Context,
        meta: &DocTypeMeta,
        doc: &mut Document,
        action: Action,
        options: &InsertOptions,
    ) -> Result<bool, DocumentError> {
        doc.set_parent_in_children();
        naming::set_child_names(doc);

        if !ctx.flags.ignore_permissions {
            let access = LevelAccess::new(&self.config, meta, &ctx.actor, PermType::Write);
            permissions::reset_inaccessible_fields(self.meta.as_ref(), meta, &access, doc, None);
        }

        self.run_before_save(ctx, doc, action, None)?;
        self.run_validation(ctx, meta, doc, action, None)?;

        if !self.db_insert(meta, doc).await? {
            if options.ignore_if_duplicate {
                debug!(doctype = %doc.doctype, name = doc.name(), "ignore duplicate insert");
                return Ok(false);
            }
            return Err(DocumentError::DuplicateEntry {
                doctype: doc.doctype.clone(),
                name: doc.name().to_owned(),
            });
        }
        doc.mark_persisted();

        self.hooks.run(
            &HookContext::new(&ctx.actor, DocEvent::AfterInsert).with_action(Some(action)),
            doc,
        )?;
        self.post_save(ctx, meta, doc, action, None, &[]).await?;
        Ok(true)
    }

    /// Insert the parent row and every child row, returns `false` if the parent name is taken.
    async fn db_insert(&self, meta: &DocTypeMeta, doc: &Document) -> Result<bool, DocumentError> {
        if meta.is_single {
            self.store
                .set_single(&meta.name, doc.to_row())
                .await
                .or_store_err()?;
        } else if !self
            .store
            .insert_row(&doc.doctype, doc.to_row())
            .await
            .or_store_err()?
        {
            return Ok(false);
        }

        for child in doc.all_children() {
            if !self
                .store
                .insert_row(&child.doctype, child.to_row())
                .await
                .or_store_err()?
            {
                return Err(DocumentError::DuplicateEntry {
                    doctype: child.doctype.clone(),
                    name: child.name().to_owned(),
                });
            }
        }
        Ok(true)
    }

    /// Save the document, inserting it if it was never persisted.
    ///
    /// Returns the action the change of docstatus resolved to.
    pub async fn save(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
    ) -> Result<Action, DocumentError> {
        if doc.is_new() {
            let action = resolve_action(&doc.doctype, doc.name(), None, doc.docstatus)?;
            self.insert(ctx, doc, InsertOptions::default()).await?;
            return Ok(action);
        }

        let (doctype, name) = (doc.doctype.clone(), doc.name().to_owned());
        if !ctx.enter(&doctype, &name) {
            return Err(DocumentError::Validation(format!(
                "{doctype} {name} is being saved already"
            )));
        }

        let snapshot = doc.clone();
        let mark = ctx.mark();
        let result = match self.store.begin().await.or_store_err() {
            Ok(permit) => {
                let result = self.save_inner(ctx, doc).await;
                self.finish(permit, ctx, doc, snapshot, mark, result).await
            }
            Err(err) => Err(err),
        };
        ctx.leave(&doctype, &name);
        result
    }

    async fn save_inner(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
    ) -> Result<Action, DocumentError> {
        let meta = self.meta(&doc.doctype)?;
        ensure_not_child(&meta)?;

        // Lock the stored row until the transaction ends.
        let before = self.load(&meta, doc.name(), true).await?;
        let action = check_if_latest(&before, doc)?;
        ensure_submittable(&meta, action)?;
        permissions::check_permission(
            &self.config,
            ctx,
            &meta,
            doc.name(),
            action.required_permission(),
        )?;
        debug!(doctype = %doc.doctype, name = doc.name(), %action, "save document");

        let user = ctx.actor.user.clone();
        let modified = Timestamp::after(before.modified);
        doc.owner = before.owner.clone();
        doc.creation = before.creation;
        doc.modified = Some(modified);
        doc.modified_by = Some(user.clone());

        doc.set_parent_in_children();
        let docstatus = doc.docstatus;
        for child in doc.all_children_mut() {
            child.docstatus = docstatus;
            if child.creation.is_none() {
                child.owner = Some(user.clone());
                child.creation = Some(modified);
                child.modified = Some(modified);
                child.modified_by = Some(user.clone());
            }
        }
        naming::set_child_names(doc);

        if !ctx.flags.ignore_permissions {
            let access = LevelAccess::new(&self.config, &meta, &ctx.actor, PermType::Write);
            permissions::reset_inaccessible_fields(
                self.meta.as_ref(),
                &meta,
                &access,
                doc,
                Some(&before),
            );
        }

        if action != Action::Cancel && !ctx.flags.ignore_links {
            links::validate_links(&self.store, self.meta.as_ref(), &meta, doc).await?;
        }

        self.run_before_save(ctx, doc, action, Some(&before))?;
        self.run_validation(ctx, &meta, doc, action, Some(&before))?;

        self.db_update(&meta, doc).await?;
        let diffs = diff_children(&meta, Some(&before), doc);
        self.sync_children(doc, &diffs).await?;
        doc.mark_persisted();

        self.run_child_cascade(ctx, doc, &diffs, action)?;
        self.post_save(ctx, &meta, doc, action, Some(&before), &diffs)
            .await?;
        Ok(action)
    }

    async fn db_update(&self, meta: &DocTypeMeta, doc: &Document) -> Result<(), DocumentError> {
        if meta.is_single {
            return self
                .store
                .set_single(&meta.name, doc.to_row())
                .await
                .or_store_err();
        }
        if !self
            .store
            .update_row(&doc.doctype, doc.name(), doc.to_row())
            .await
            .or_store_err()?
        {
            return Err(DocumentError::NotFound {
                doctype: doc.doctype.clone(),
                name: doc.name().to_owned(),
            });
        }
        Ok(())
    }

    /// Write the changes of every child table: removed rows are deleted, inserted and modified
    /// rows are written with a fresh `modified`, untouched rows are left alone.
    async fn sync_children(
        &self,
        doc: &mut Document,
        diffs: &[TableDiff],
    ) -> Result<(), DocumentError> {
        let parent = doc.name().to_owned();
        let modified = doc.modified;
        let modified_by = doc.modified_by.clone();

        for diff in diffs {
            for row in &diff.deleted {
                let filter = Filter::new().eq(NAME, row.name()).eq(PARENT, parent.as_str());
                self.store
                    .delete_rows(&row.doctype, &filter)
                    .await
                    .or_store_err()?;
            }

            for (row, change) in doc.table_mut(&diff.fieldname).iter_mut().zip(&diff.rows) {
                match change {
                    RowChange::Inserted => {
                        row.modified = modified;
                        row.modified_by = modified_by.clone();
                        if !self
                            .store
                            .insert_row(&row.doctype, row.to_row())
                            .await
                            .or_store_err()?
                        {
                            return Err(DocumentError::DuplicateEntry {
                                doctype: row.doctype.clone(),
                                name: row.name().to_owned(),
                            });
                        }
                    }
                    RowChange::Modified => {
                        row.modified = modified;
                        row.modified_by = modified_by.clone();
                        if !self
                            .store
                            .update_row(&row.doctype, row.name(), row.to_row())
                            .await
                            .or_store_err()?
                        {
                            self.store
                                .insert_row(&row.doctype, row.to_row())
                                .await
                                .or_store_err()?;
                        }
                    }
                    RowChange::Deleted | RowChange::Untouched => (),
                }
            }
        }
        Ok(())
    }

    /// Run the lifecycle hooks of changed child rows.
    ///
    /// Per table, removed rows get `OnTrash` and `AfterDelete` first. Then every current row in
    /// order: inserted rows get `AfterInsert`, `OnUpdate` and `OnChange`, modified rows get
    /// `OnUpdate` and `OnChange`.
    fn run_child_cascade(
        &self,
        ctx: &Context,
        doc: &mut Document,
        diffs: &[TableDiff],
        action: Action,
    ) -> Result<(), DocumentError> {
        if diffs.iter().all(TableDiff::is_untouched) {
            return Ok(());
        }

        let parent = doc.clone();
        let hook_ctx = HookContext::new(&ctx.actor, DocEvent::OnTrash)
            .with_action(Some(action))
            .with_parent(Some(&parent));

        for diff in diffs {
            for row in &diff.deleted {
                let mut row = row.clone();
                self.hooks.run(&hook_ctx.for_event(DocEvent::OnTrash), &mut row)?;
                self.hooks
                    .run(&hook_ctx.for_event(DocEvent::AfterDelete), &mut row)?;
            }

            for (row, change) in doc.table_mut(&diff.fieldname).iter_mut().zip(&diff.rows) {
                for event in child_events(*change) {
                    self.hooks.run(&hook_ctx.for_event(*event), row)?;
                }
            }
        }
        Ok(())
    }

    fn run_before_save(
        &self,
        ctx: &Context,
        doc: &mut Document,
        action: Action,
        before: Option<&Document>,
    ) -> Result<(), DocumentError> {
        if ctx.flags.ignore_validate {
            return Ok(());
        }
        let hook_ctx = HookContext::new(&ctx.actor, DocEvent::BeforeValidate)
            .with_action(Some(action))
            .with_before(before);
        for event in before_save_events(action) {
            self.hooks.run(&hook_ctx.for_event(*event), doc)?;
        }
        Ok(())
    }

    fn run_validation(
        &self,
        ctx: &Context,
        meta: &DocTypeMeta,
        doc: &mut Document,
        action: Action,
        before: Option<&Document>,
    ) -> Result<(), DocumentError> {
        if action != Action::Cancel {
            if !ctx.flags.ignore_mandatory {
                validate::check_mandatory(self.meta.as_ref(), meta, doc)?;
            }
            validate::validate_values(self.meta.as_ref(), meta, doc)?;
            if let Some(before) = before {
                validate::validate_set_only_once(meta, doc, before)?;
            }
        }

        workflow::validate_workflow(&self.config, &ctx.actor, meta, doc, before)?;

        if action == Action::UpdateAfterSubmit
            && let Some(before) = before
        {
            validate::validate_update_after_submit(self.meta.as_ref(), meta, doc, before)?;
        }
        Ok(())
    }

    /// Side effects of a successful insert or save, in this order: action hooks, cache
    /// invalidation, realtime events, search index, version snapshot and `OnChange`.
    async fn post_save(
        &self,
        ctx: &mut Context,
        meta: &DocTypeMeta,
        doc: &mut Document,
        action: Action,
        before: Option<&Document>,
        diffs: &[TableDiff],
    ) -> Result<(), DocumentError> {
        for event in action_events(action) {
            let hook_ctx = HookContext::new(&ctx.actor, *event)
                .with_action(Some(action))
                .with_before(before);
            self.hooks.run(&hook_ctx, doc)?;
        }
        if action == Action::Cancel && !ctx.flags.ignore_links {
            links::check_no_back_links(&self.store, self.meta.as_ref(), doc, true).await?;
        }

        self.cache.invalidate(&doc.doctype, doc.name());
        self.notify_update(ctx, meta, doc);

        if let Some(update) = search::index_document(self.meta.as_ref(), meta, doc) {
            ctx.push_search(update);
        }

        if meta.track_changes
            && !ctx.flags.ignore_version
            && let Some(before) = before
            && let Some(data) = version_data(meta, before, doc, diffs)
        {
            let row = version_row(doc, &data, &ctx.actor.user);
            self.store
                .insert_row(VERSION_DOCTYPE, row)
                .await
                .or_store_err()?;
        }

        let hook_ctx = HookContext::new(&ctx.actor, DocEvent::OnChange)
            .with_action(Some(action))
            .with_before(before);
        self.hooks.run(&hook_ctx, doc)?;
        Ok(())
    }

    /// Submit a draft document.
    pub async fn submit(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
    ) -> Result<Action, DocumentError> {
        self.save_as(ctx, doc, DocStatus::Submitted).await
    }

    /// Cancel a submitted document.
    ///
    /// Fails if a submitted document still links to it.
    pub async fn cancel(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
    ) -> Result<Action, DocumentError> {
        self.save_as(ctx, doc, DocStatus::Cancelled).await
    }

    async fn save_as(
        &self,
        ctx: &mut Context,
        doc: &mut Document,
        docstatus: DocStatus,
    ) -> Result<Action, DocumentError> {
        let previous = doc.docstatus;
        doc.docstatus = docstatus;
        let result = self.save(ctx, doc).await;
        if result.is_err() {
            doc.docstatus = previous;
        }
        result
    }
}
