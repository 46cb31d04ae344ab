// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage gateway for documents.
//!
//! Rows live in tables named after their doctype and are addressed by their `name` column. Child
//! rows are stored in the table of their own doctype and point at their owner via the `parent`,
//! `parenttype` and `parentfield` columns. Single doctypes keep exactly one row outside of the
//! regular tables.
pub mod filter;
#[cfg(feature = "memory")]
pub mod memory;
pub mod rows;
mod traits;

pub use filter::{Condition, Filter};
#[cfg(feature = "memory")]
pub use memory::{MemoryStore, TransactionPermit};
pub use rows::RowStore;
pub use traits::Transaction;
