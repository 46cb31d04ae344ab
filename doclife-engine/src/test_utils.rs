// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engines, actors and hook recorders for tests.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use doclife_core::Document;
use doclife_core::test_utils::{SALES_MANAGER, SALES_USER, STOCK_MANAGER, STOCK_USER, fixture_provider};
use doclife_store::MemoryStore;

use crate::builder::EngineBuilder;
use crate::context::{Actor, Context};
use crate::engine::Engine;
use crate::hooks::DocEvent;
use crate::lifecycle::InsertOptions;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Fresh lock directory which is not shared with other tests.
pub fn temp_lock_dir() -> PathBuf {
    std::env::temp_dir().join(format!("doclife-locks-{:016x}", rand::random::<u64>()))
}

pub fn administrator() -> Context {
    Context::new(Actor::new("Administrator", std::iter::empty()))
}

pub fn sales_user() -> Context {
    Context::new(Actor::new("sam@example.com", [SALES_USER]))
}

pub fn sales_manager() -> Context {
    Context::new(Actor::new("mia@example.com", [SALES_USER, SALES_MANAGER]))
}

pub fn stock_user() -> Context {
    Context::new(Actor::new("stu@example.com", [STOCK_USER]))
}

pub fn stock_manager() -> Context {
    Context::new(Actor::new("max@example.com", [STOCK_USER, STOCK_MANAGER]))
}

/// Hook calls as `(event, doctype, name)`.
pub type HookCalls = Arc<Mutex<Vec<(DocEvent, String, String)>>>;

/// Records every hook which runs, for all doctypes.
#[derive(Clone, Debug, Default)]
pub struct HookRecorder {
    calls: HookCalls,
}

impl HookRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wildcard handler for every event on the builder.
    pub fn register<S>(&self, mut builder: EngineBuilder<S>) -> EngineBuilder<S>
    where
        S: crate::engine::DocumentStore,
    {
        for event in DocEvent::ALL {
            let calls = self.calls.clone();
            builder = builder.wildcard_handler(event, move |ctx, doc| {
                calls
                    .lock()
                    .unwrap()
                    .push((ctx.event, doc.doctype.clone(), doc.name().to_owned()));
                Ok(None)
            });
        }
        builder
    }

    pub fn calls(&self) -> Vec<(DocEvent, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Events which ran for one document, in order.
    pub fn events_of(&self, doctype: &str, name: &str) -> Vec<DocEvent> {
        self.calls()
            .into_iter()
            .filter(|(_, calls_doctype, calls_name)| calls_doctype == doctype && calls_name == name)
            .map(|(event, _, _)| event)
            .collect()
    }

    /// Events which ran for any document of a doctype, in order.
    pub fn events_of_doctype(&self, doctype: &str) -> Vec<DocEvent> {
        self.calls()
            .into_iter()
            .filter(|(_, calls_doctype, _)| calls_doctype == doctype)
            .map(|(event, _, _)| event)
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// Builder with all fixture doctypes, an in-memory store and a private lock directory.
pub fn test_builder() -> EngineBuilder<MemoryStore> {
    Engine::builder(MemoryStore::new())
        .meta_provider(fixture_provider())
        .lock_dir(temp_lock_dir())
}

pub fn test_engine() -> Engine<MemoryStore> {
    setup_logging();
    test_builder().build()
}

/// Insert the documents other fixtures link to: item group "All Items", customer "ACME" and
/// the items "WIDGET-1" and "WIDGET-2".
pub async fn seed(engine: &Engine<MemoryStore>) {
    let mut ctx = administrator();
    let mut docs = vec![
        doc("Item Group", &[("item_group_name", "All Items")]),
        doc("Customer", &[("customer_name", "ACME")]),
        doc("Item", &[("item_code", "WIDGET-1"), ("item_name", "Blue Widget")]),
        doc("Item", &[("item_code", "WIDGET-2"), ("item_name", "Red Widget")]),
    ];
    for doc in docs.iter_mut() {
        engine
            .insert(&mut ctx, doc, InsertOptions::default())
            .await
            .unwrap();
    }
}

/// Transient document with text values.
pub fn doc(doctype: &str, values: &[(&str, &str)]) -> Document {
    let mut doc = Document::new(doctype);
    for (fieldname, value) in values {
        doc.set(fieldname, *value);
    }
    doc
}

/// Draft sales order for "ACME" with one row per item code.
pub fn sales_order(items: &[(&str, f64)]) -> Document {
    let mut order = doc(
        "Sales Order",
        &[("customer", "ACME"), ("delivery_date", "2025-01-31")],
    );
    for (item_code, qty) in items {
        order
            .append("items", Document::new("Sales Order Item"))
            .set("item_code", *item_code)
            .set("qty", *qty)
            .set("rate", 10.0);
    }
    order
}
