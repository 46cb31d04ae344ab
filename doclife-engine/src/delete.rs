// SPDX-License-Identifier: MIT OR Apache-2.0

use doclife_core::row::NAME;
use doclife_core::{Document, PermType};
use doclife_store::{Filter, RowStore, Transaction};
use tracing::debug;

use crate::context::Context;
use crate::engine::{DocumentStore, Engine};
use crate::error::{DocumentError, StoreResultExt};
use crate::events::Event;
use crate::hooks::{DocEvent, HookContext};
use crate::links;
use crate::permissions;
use crate::search::SearchUpdate;

impl<S> Engine<S>
where
    S: DocumentStore,
{
    /// Delete a stored document together with its child rows.
    ///
    /// Submitted documents need to be cancelled first and no other document which is not
    /// cancelled may link to it. On success `doc` holds the deleted version.
    pub async fn delete(&self, ctx: &mut Context, doc: &mut Document) -> Result<(), DocumentError> {
        let snapshot = doc.clone();
        let mark = ctx.mark();
        let permit = self.store.begin().await.or_store_err()?;
        let result = self.delete_inner(ctx, doc).await;
        self.finish(permit, ctx, doc, snapshot, mark, result).await
    }

    /// Load and delete a document by name, returns the deleted version.
    pub async fn delete_doc(
        &self,
        ctx: &mut Context,
        doctype: &str,
        name: &str,
    ) -> Result<Document, DocumentError> {
        let mut doc = self.get_doc(doctype, name).await?;
        self.delete(ctx, &mut doc).await?;
        Ok(doc)
    }

    async fn delete_inner(&self, ctx: &mut Context, doc: &mut Document) -> Result<(), DocumentError> {
        let meta = self.meta(&doc.doctype)?;
        if meta.is_single || meta.is_table {
            return Err(DocumentError::Validation(format!(
                "{} documents can not be deleted",
                doc.doctype
            )));
        }
        permissions::check_permission(&self.config, ctx, &meta, doc.name(), PermType::Delete)?;

        *doc = self.load(&meta, doc.name(), true).await?;
        if doc.docstatus.is_submitted() {
            return Err(DocumentError::Validation(format!(
                "{} {} is submitted and needs to be cancelled before it can be deleted",
                doc.doctype,
                doc.name()
            )));
        }
        links::check_no_back_links(&self.store, self.meta.as_ref(), doc, false).await?;
        debug!(doctype = %doc.doctype, name = doc.name(), "delete document");

        self.run_delete_hooks(ctx, doc, DocEvent::OnTrash)?;

        for table in meta.table_fields() {
            let Some(child_doctype) = table.options.as_deref() else {
                continue;
            };
            let filter = Filter::children_of(&doc.doctype, doc.name(), &table.fieldname);
            self.store
                .delete_rows(child_doctype, &filter)
                .await
                .or_store_err()?;
        }
        let deleted = self
            .store
            .delete_rows(&doc.doctype, &Filter::new().eq(NAME, doc.name()))
            .await
            .or_store_err()?;
        if deleted == 0 {
            return Err(DocumentError::NotFound {
                doctype: doc.doctype.clone(),
                name: doc.name().to_owned(),
            });
        }

        self.run_delete_hooks(ctx, doc, DocEvent::AfterDelete)?;

        ctx.push_search(SearchUpdate::Remove {
            doctype: doc.doctype.clone(),
            name: doc.name().to_owned(),
        });
        self.cache.invalidate(&doc.doctype, doc.name());
        if self.config.notify_update {
            ctx.push_event(Event::ListUpdate {
                doctype: doc.doctype.clone(),
                name: doc.name().to_owned(),
                user: ctx.actor.user.clone(),
            });
        }
        Ok(())
    }

    /// `OnTrash` runs for the parent before its rows, `AfterDelete` for the rows first.
    fn run_delete_hooks(
        &self,
        ctx: &Context,
        doc: &mut Document,
        event: DocEvent,
    ) -> Result<(), DocumentError> {
        let hook_ctx = HookContext::new(&ctx.actor, event);
        if event == DocEvent::OnTrash {
            self.hooks.run(&hook_ctx, doc)?;
        }

        let parent = doc.clone();
        let child_ctx = hook_ctx.with_parent(Some(&parent));
        for child in doc.all_children_mut() {
            self.hooks.run(&child_ctx, child)?;
        }

        if event == DocEvent::AfterDelete {
            self.hooks.run(&hook_ctx, doc)?;
        }
        Ok(())
    }
}
