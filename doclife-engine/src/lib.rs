// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle engine for metadata-driven documents.
//!
//! The [`Engine`] drives documents described by a doctype schema through insert, save, submit,
//! cancel and delete. Every operation runs inside one store transaction: permissions are checked,
//! child tables are reconciled, links and mandatory fields are validated, controller hooks and
//! registered handlers are called in a fixed order and the document is written. Realtime events
//! and search index updates wait until the transaction committed, a failure rolls everything back
//! and leaves the in-memory document with the values it was called with.
//!
//! Lifecycle actions follow the docstatus of a document, see [`resolve_action`]:
//!
//! ```text
//! Draft (0) --save--> Draft (0) --submit--> Submitted (1) --cancel--> Cancelled (2)
//!                                           Submitted (1) --update after submit--> Submitted (1)
//! ```
//!
//! ## Example
//!
//! ```
//! # use doclife_core::{Autoname, DocTypeMeta, FieldDef, FieldType, MemoryMetaProvider, PermRule};
//! # use doclife_engine::{Actor, Context, Engine, InsertOptions};
//! # use doclife_store::MemoryStore;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), doclife_engine::DocumentError> {
//! let provider = MemoryMetaProvider::new();
//! provider.insert(
//!     DocTypeMeta::new("Customer")
//!         .with_autoname(Autoname::Field("customer_name".into()))
//!         .with_field(FieldDef::new("customer_name", FieldType::Data).reqd())
//!         .with_permission(PermRule::full("Sales User")),
//! );
//! let engine = Engine::builder(MemoryStore::new())
//!     .meta_provider(provider)
//!     .build();
//!
//! let mut ctx = Context::new(Actor::new("sam@example.com", ["Sales User"]));
//! let mut customer = engine.new_doc("Customer")?;
//! customer.set("customer_name", "ACME");
//! engine.insert(&mut ctx, &mut customer, InsertOptions::default()).await?;
//!
//! let stored = engine.get_doc("Customer", "ACME").await?;
//! assert_eq!(stored.get_str("customer_name"), Some("ACME"));
//! # Ok(())
//! # }
//! ```
pub mod builder;
mod concurrency;
pub mod config;
pub mod context;
mod delete;
pub mod diff;
pub mod engine;
pub mod error;
pub mod events;
pub mod hooks;
mod lifecycle;
mod links;
pub mod naming;
pub mod permissions;
pub mod queue;
pub mod remote;
pub mod search;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod transition;
mod validate;
pub mod version;
mod workflow;

pub use builder::EngineBuilder;
pub use concurrency::check_if_latest;
pub use config::{Config, FieldUpdatePolicy};
pub use context::{Actor, Context, Flags};
pub use diff::{RowChange, TableDiff, diff_children, diff_table};
pub use engine::{COMMENT_DOCTYPE, DocumentStore, Engine};
pub use error::{DocumentError, ErrorKind, HookError};
pub use events::Event;
pub use hooks::{
    Controller, DocEvent, DocHandler, HookContext, HookDispatcher, HookOutput, HookResult,
};
pub use lifecycle::InsertOptions;
pub use links::AMENDED_FROM;
pub use naming::{make_hash_name, parse_series, validate_name};
pub use permissions::{LevelAccess, has_permission};
pub use queue::{ActionOutcome, QueuedAction, lock_signature};
pub use remote::RemoteMethods;
pub use search::{MemorySearchIndex, SearchEntry, SearchIndex};
pub use transition::{Action, resolve_action};
pub use version::{VERSION_DOCTYPE, version_data};
