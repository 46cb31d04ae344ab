// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for values, rows and building documents from external data.
use thiserror::Error;

/// Errors converting external data into field values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("number {0} can not be represented as a field value")]
    UnsupportedNumber(String),

    #[error("arrays are only allowed for table fields")]
    UnexpectedArray,

    #[error("nested objects are only allowed as rows of table fields")]
    UnexpectedObject,
}

/// Integer does not map to any docstatus.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid docstatus {0}")]
pub struct DocStatusError(pub i64);

/// Errors building a document from a JSON mapping or a stored row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentBuildError {
    #[error("expected a JSON object to build a document from")]
    NotAnObject,

    #[error("\"doctype\" is a required key")]
    MissingDocType,

    #[error("field '{0}': {1}")]
    InvalidValue(String, ValueError),

    #[error("row {1} of table '{0}' is not a JSON object")]
    InvalidRow(String, usize),

    #[error("column '{0}' of stored row is malformed")]
    MalformedColumn(&'static str),

    #[error(transparent)]
    DocStatus(#[from] DocStatusError),
}
