// SPDX-License-Identifier: MIT OR Apache-2.0

//! Doctype definitions: fields, permission rules, naming and workflows.
mod doctype;
mod field;
mod permission;
mod workflow;

pub use doctype::{Autoname, DocTypeMeta};
pub use field::{DEFAULT_DATA_LENGTH, FieldDef, FieldType};
pub use permission::{PermRule, PermType, permlevel_access};
pub use workflow::{WorkflowDef, WorkflowState, WorkflowTransition};
