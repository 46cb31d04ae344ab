// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events, per-doctype controllers and registered handlers.
//!
//! Every doctype can have one [`Controller`] implementing any subset of the lifecycle callbacks,
//! callbacks which are not implemented fall back to a no-op. Next to controllers, handlers can be
//! registered per doctype and event (notifications, webhooks, scripts) or for all doctypes at
//! once. The [`HookDispatcher`] runs them in a fixed order and merges their outputs.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use doclife_core::Document;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::context::Actor;
use crate::error::{DocumentError, HookError};
use crate::transition::Action;

/// Doctype key of handlers registered for every doctype.
const WILDCARD: &str = "*";

/// Lifecycle event a hook is run for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocEvent {
    BeforeInsert,
    BeforeValidate,
    Validate,
    BeforeSave,
    BeforeSubmit,
    BeforeCancel,
    BeforeUpdateAfterSubmit,
    AfterInsert,
    OnUpdate,
    OnSubmit,
    OnCancel,
    OnUpdateAfterSubmit,
    OnChange,
    BeforeChange,
    OnTrash,
    AfterDelete,
}

impl DocEvent {
    pub const ALL: [DocEvent; 16] = [
        DocEvent::BeforeInsert,
        DocEvent::BeforeValidate,
        DocEvent::Validate,
        DocEvent::BeforeSave,
        DocEvent::BeforeSubmit,
        DocEvent::BeforeCancel,
        DocEvent::BeforeUpdateAfterSubmit,
        DocEvent::AfterInsert,
        DocEvent::OnUpdate,
        DocEvent::OnSubmit,
        DocEvent::OnCancel,
        DocEvent::OnUpdateAfterSubmit,
        DocEvent::OnChange,
        DocEvent::BeforeChange,
        DocEvent::OnTrash,
        DocEvent::AfterDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocEvent::BeforeInsert => "before_insert",
            DocEvent::BeforeValidate => "before_validate",
            DocEvent::Validate => "validate",
            DocEvent::BeforeSave => "before_save",
            DocEvent::BeforeSubmit => "before_submit",
            DocEvent::BeforeCancel => "before_cancel",
            DocEvent::BeforeUpdateAfterSubmit => "before_update_after_submit",
            DocEvent::AfterInsert => "after_insert",
            DocEvent::OnUpdate => "on_update",
            DocEvent::OnSubmit => "on_submit",
            DocEvent::OnCancel => "on_cancel",
            DocEvent::OnUpdateAfterSubmit => "on_update_after_submit",
            DocEvent::OnChange => "on_change",
            DocEvent::BeforeChange => "before_change",
            DocEvent::OnTrash => "on_trash",
            DocEvent::AfterDelete => "after_delete",
        }
    }
}

impl fmt::Display for DocEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Information handed to every hook next to the document itself.
#[derive(Clone, Copy, Debug)]
pub struct HookContext<'a> {
    pub actor: &'a Actor,
    pub event: DocEvent,

    /// Resolved lifecycle action, `None` outside of insert and save.
    pub action: Option<Action>,

    /// Stored state of the document before the running save.
    pub before: Option<&'a Document>,

    /// Owning document when the hook runs for a child row.
    pub parent: Option<&'a Document>,
}

impl<'a> HookContext<'a> {
    pub fn new(actor: &'a Actor, event: DocEvent) -> Self {
        Self {
            actor,
            event,
            action: None,
            before: None,
            parent: None,
        }
    }

    pub fn with_action(mut self, action: Option<Action>) -> Self {
        self.action = action;
        self
    }

    pub fn with_before(mut self, before: Option<&'a Document>) -> Self {
        self.before = before;
        self
    }

    pub fn with_parent(mut self, parent: Option<&'a Document>) -> Self {
        self.parent = parent;
        self
    }

    /// Same context for another event.
    pub fn for_event(mut self, event: DocEvent) -> Self {
        self.event = event;
        self
    }
}

pub type HookResult = Result<(), HookError>;

/// Lifecycle callbacks of one doctype.
///
/// All methods default to doing nothing.
#[allow(unused_variables)]
pub trait Controller: Send + Sync {
    fn before_insert(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn before_validate(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn validate(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn before_save(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn before_submit(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn before_cancel(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn before_update_after_submit(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn after_insert(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn on_update(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn on_submit(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn on_cancel(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn on_update_after_submit(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn on_change(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn before_change(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn on_trash(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }

    fn after_delete(&self, ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
        Ok(())
    }
}

fn call_controller(
    controller: &dyn Controller,
    ctx: &HookContext<'_>,
    doc: &mut Document,
) -> HookResult {
    match ctx.event {
        DocEvent::BeforeInsert => controller.before_insert(ctx, doc),
        DocEvent::BeforeValidate => controller.before_validate(ctx, doc),
        DocEvent::Validate => controller.validate(ctx, doc),
        DocEvent::BeforeSave => controller.before_save(ctx, doc),
        DocEvent::BeforeSubmit => controller.before_submit(ctx, doc),
        DocEvent::BeforeCancel => controller.before_cancel(ctx, doc),
        DocEvent::BeforeUpdateAfterSubmit => controller.before_update_after_submit(ctx, doc),
        DocEvent::AfterInsert => controller.after_insert(ctx, doc),
        DocEvent::OnUpdate => controller.on_update(ctx, doc),
        DocEvent::OnSubmit => controller.on_submit(ctx, doc),
        DocEvent::OnCancel => controller.on_cancel(ctx, doc),
        DocEvent::OnUpdateAfterSubmit => controller.on_update_after_submit(ctx, doc),
        DocEvent::OnChange => controller.on_change(ctx, doc),
        DocEvent::BeforeChange => controller.before_change(ctx, doc),
        DocEvent::OnTrash => controller.on_trash(ctx, doc),
        DocEvent::AfterDelete => controller.after_delete(ctx, doc),
    }
}

/// Handler registered for one event of a doctype, may return a JSON value to aggregate.
pub type DocHandler = dyn Fn(&HookContext<'_>, &mut Document) -> Result<Option<serde_json::Value>, HookError>
    + Send
    + Sync;

/// Aggregated output of all handlers run for one event.
///
/// JSON objects returned by handlers are merged key by key, later handlers overwrite earlier
/// ones. Any other returned value replaces the previous non-object output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HookOutput {
    merged: Map<String, serde_json::Value>,
    last: Option<serde_json::Value>,
}

impl HookOutput {
    pub fn merge(&mut self, value: serde_json::Value) {
        match value {
            serde_json::Value::Object(object) => self.merged.extend(object),
            value => self.last = Some(value),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.merged.get(key)
    }

    pub fn last(&self) -> Option<&serde_json::Value> {
        self.last.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty() && self.last.is_none()
    }
}

/// Registry of controllers and handlers.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    controllers: HashMap<String, Arc<dyn Controller>>,
    handlers: HashMap<(String, DocEvent), Vec<Arc<DocHandler>>>,
}

impl fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the controller of a doctype, replacing any previous one.
    pub fn register_controller(&mut self, doctype: &str, controller: impl Controller + 'static) {
        self.controllers
            .insert(doctype.to_owned(), Arc::new(controller));
    }

    /// Register a handler for one event of a doctype.
    pub fn register_handler<F>(&mut self, doctype: &str, event: DocEvent, handler: F)
    where
        F: Fn(&HookContext<'_>, &mut Document) -> Result<Option<serde_json::Value>, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers
            .entry((doctype.to_owned(), event))
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register a handler for one event of every doctype.
    pub fn register_wildcard<F>(&mut self, event: DocEvent, handler: F)
    where
        F: Fn(&HookContext<'_>, &mut Document) -> Result<Option<serde_json::Value>, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.register_handler(WILDCARD, event, handler);
    }

    pub fn has_controller(&self, doctype: &str) -> bool {
        self.controllers.contains_key(doctype)
    }

    /// Run the controller method, then the doctype handlers and finally the wildcard handlers for
    /// the event of `ctx`.
    ///
    /// Stops at the first failing hook. Having nothing registered is not an error.
    pub fn run(
        &self,
        ctx: &HookContext<'_>,
        doc: &mut Document,
    ) -> Result<HookOutput, DocumentError> {
        let wrap = |source: HookError, doctype: &str| DocumentError::Hook {
            event: ctx.event,
            doctype: doctype.to_owned(),
            source,
        };
        let doctype = doc.doctype.clone();
        let mut output = HookOutput::default();

        if let Some(controller) = self.controllers.get(&doctype) {
            call_controller(controller.as_ref(), ctx, doc).map_err(|err| wrap(err, &doctype))?;
        }

        for key in [doctype.as_str(), WILDCARD] {
            let Some(handlers) = self.handlers.get(&(key.to_owned(), ctx.event)) else {
                continue;
            };
            for handler in handlers {
                if let Some(value) = handler(ctx, doc).map_err(|err| wrap(err, &doctype))? {
                    output.merge(value);
                }
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use doclife_core::Document;
    use serde_json::json;

    use crate::context::Actor;
    use crate::error::{DocumentError, HookError};

    use super::{Controller, DocEvent, HookContext, HookDispatcher, HookResult};

    struct UppercaseTitle;

    impl Controller for UppercaseTitle {
        fn validate(&self, _ctx: &HookContext<'_>, doc: &mut Document) -> HookResult {
            let title = doc.get_str("title").unwrap_or_default().to_uppercase();
            doc.set("title", title);
            Ok(())
        }

        fn on_trash(&self, _ctx: &HookContext<'_>, _doc: &mut Document) -> HookResult {
            Err(HookError::Validation("can not delete".into()))
        }
    }

    #[test]
    fn run_in_order_and_merge_outputs() {
        let mut hooks = HookDispatcher::new();
        hooks.register_controller("Note", UppercaseTitle);
        hooks.register_handler("Note", DocEvent::Validate, |_ctx, doc| {
            assert_eq!(doc.get_str("title"), Some("HELLO"));
            Ok(Some(json!({ "webhook": "sent", "count": 1 })))
        });
        hooks.register_wildcard(DocEvent::Validate, |_ctx, _doc| {
            Ok(Some(json!({ "count": 2 })))
        });

        let actor = Actor::new("alice", ["Guest"]);
        let mut note = Document::new("Note");
        note.set("title", "hello");

        let output = hooks
            .run(&HookContext::new(&actor, DocEvent::Validate), &mut note)
            .unwrap();
        assert_eq!(output.get("webhook"), Some(&json!("sent")));
        assert_eq!(output.get("count"), Some(&json!(2)));
        assert!(output.last().is_none());
    }

    #[test]
    fn no_hooks_is_a_noop() {
        let hooks = HookDispatcher::new();
        let actor = Actor::new("alice", ["Guest"]);
        let mut note = Document::new("Note");

        let output = hooks
            .run(&HookContext::new(&actor, DocEvent::OnUpdate), &mut note)
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn propagate_failures() {
        let mut hooks = HookDispatcher::new();
        hooks.register_controller("Note", UppercaseTitle);
        let actor = Actor::new("alice", ["Guest"]);
        let mut note = Document::new("Note");

        assert_matches!(
            hooks.run(&HookContext::new(&actor, DocEvent::OnTrash), &mut note),
            Err(DocumentError::Hook {
                event: DocEvent::OnTrash,
                source: HookError::Validation(_),
                ..
            })
        );
    }
}
