// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use doclife_core::{Document, MemoryMetaProvider, MetaCache, MetaProvider};
use serde_json::Value as JsonValue;

use crate::config::{Config, FieldUpdatePolicy};
use crate::engine::{DocumentCache, DocumentStore, Engine};
use crate::error::HookError;
use crate::events::EventBus;
use crate::hooks::{Controller, DocEvent, HookContext, HookDispatcher};
use crate::queue::ActionQueue;
use crate::remote::RemoteMethods;
use crate::search::{MemorySearchIndex, SearchIndex};

/// Assembles an [`Engine`] from a store, a schema provider, hooks and configuration.
pub struct EngineBuilder<S> {
    store: S,
    meta_provider: Option<Arc<dyn MetaProvider>>,
    config: Config,
    hooks: HookDispatcher,
    search: Option<Arc<dyn SearchIndex>>,
    remote: RemoteMethods,
}

impl<S> EngineBuilder<S>
where
    S: DocumentStore,
{
    pub(crate) fn new(store: S) -> Self {
        EngineBuilder {
            store,
            meta_provider: None,
            config: Config::default(),
            hooks: HookDispatcher::new(),
            search: None,
            remote: RemoteMethods::new(),
        }
    }

    /// Source of doctype schemas, defaults to an empty in-memory provider.
    pub fn meta_provider(mut self, provider: impl MetaProvider + 'static) -> Self {
        self.meta_provider = Some(Arc::new(provider));
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn max_name_length(mut self, length: usize) -> Self {
        self.config.max_name_length = length;
        self
    }

    pub fn administrator(mut self, user: &str) -> Self {
        self.config.administrator = user.to_owned();
        self
    }

    pub fn field_update_policy(mut self, policy: FieldUpdatePolicy) -> Self {
        self.config.field_update_policy = policy;
        self
    }

    pub fn lock_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.lock_dir = path.into();
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration, retry_interval: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self.config.lock_retry_interval = retry_interval;
        self
    }

    pub fn notify_update(mut self, value: bool) -> Self {
        self.config.notify_update = value;
        self
    }

    pub fn controller(mut self, doctype: &str, controller: impl Controller + 'static) -> Self {
        self.hooks.register_controller(doctype, controller);
        self
    }

    pub fn handler<F>(mut self, doctype: &str, event: DocEvent, handler: F) -> Self
    where
        F: Fn(&HookContext<'_>, &mut Document) -> Result<Option<JsonValue>, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.register_handler(doctype, event, handler);
        self
    }

    pub fn wildcard_handler<F>(mut self, event: DocEvent, handler: F) -> Self
    where
        F: Fn(&HookContext<'_>, &mut Document) -> Result<Option<JsonValue>, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.register_wildcard(event, handler);
        self
    }

    /// Global search index to keep up to date, defaults to an in-memory index.
    pub fn search_index(mut self, index: impl SearchIndex + 'static) -> Self {
        self.search = Some(Arc::new(index));
        self
    }

    /// Allow the HTTP layer to call `method` on documents of `doctype`.
    pub fn remote_method(mut self, doctype: &str, method: &str) -> Self {
        self.remote.register(doctype, method);
        self
    }

    pub fn build(self) -> Engine<S> {
        let provider = self
            .meta_provider
            .unwrap_or_else(|| Arc::new(MemoryMetaProvider::new()));
        let search = self
            .search
            .unwrap_or_else(|| Arc::new(MemorySearchIndex::new()));

        Engine {
            store: self.store,
            meta: Arc::new(MetaCache::new(provider)),
            hooks: Arc::new(self.hooks),
            search,
            remote: Arc::new(self.remote),
            events: EventBus::new(self.config.event_capacity),
            config: Arc::new(self.config),
            cache: DocumentCache::default(),
            queue: ActionQueue::new(),
        }
    }
}
