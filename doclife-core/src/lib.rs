// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model of a metadata-driven record engine.
//!
//! A doctype describes the fields, child tables, permission rules and workflow of a record type.
//! Documents are records of a doctype: typed standard columns (name, docstatus, audit columns),
//! an ordered mapping of scalar field values and zero or more child tables holding rows which are
//! documents themselves.
//!
//! Schemas are looked up through the [`MetaProvider`] trait. [`MemoryMetaProvider`] keeps them in
//! memory and [`MetaCache`] sits in front of any other provider as a process-wide cache which
//! re-fetches on a miss.
//!
//! ## Example
//!
//! ```
//! use doclife_core::{Document, Value};
//!
//! let mut order = Document::new("Sales Order");
//! order.set("customer", "ACME");
//! order
//!     .append("items", Document::new("Sales Order Item"))
//!     .set("item_code", "WIDGET-1")
//!     .set("qty", 2);
//!
//! assert!(order.is_new());
//! assert_eq!(order.table("items")[0].idx, 1);
//! assert_eq!(order.value("customer"), Value::from("ACME"));
//! ```
pub mod docstatus;
pub mod document;
pub mod error;
pub mod provider;
pub mod row;
pub mod schema;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod timestamp;
pub mod value;

pub use docstatus::DocStatus;
pub use document::Document;
pub use error::{DocStatusError, DocumentBuildError, ValueError};
pub use provider::{MemoryMetaProvider, MetaCache, MetaProvider};
pub use row::Row;
pub use schema::{
    Autoname, DocTypeMeta, FieldDef, FieldType, PermRule, PermType, WorkflowDef, WorkflowState,
    WorkflowTransition,
};
pub use timestamp::Timestamp;
pub use value::Value;
