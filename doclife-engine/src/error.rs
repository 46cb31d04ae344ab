// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use doclife_core::{DocStatus, DocumentBuildError, PermType, Timestamp};
use thiserror::Error;

use crate::hooks::DocEvent;

/// Errors of the document lifecycle.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Actor lacks a document-level capability.
    #[error("not permitted to {ptype} {doctype} {name}")]
    Permission {
        ptype: PermType,
        doctype: String,
        name: String,
    },

    /// Actor tried to change a field of a permission level it has no write access to.
    #[error("not permitted to change field '{fieldname}' of {doctype} (permission level {permlevel})")]
    FieldPermission {
        doctype: String,
        fieldname: String,
        permlevel: u8,
    },

    #[error("{doctype} {name} not found")]
    NotFound { doctype: String, name: String },

    /// Doctype is not known to the metadata provider.
    #[error("doctype {0} is not defined")]
    Meta(String),

    #[error("{doctype} {name} already exists")]
    DuplicateEntry { doctype: String, name: String },

    /// Document was changed by someone else since it was loaded.
    #[error(
        "{doctype} {name} has been modified after you have opened it ({stored:?}, {loaded:?}), please refresh to get the latest document"
    )]
    TimestampMismatch {
        doctype: String,
        name: String,
        stored: Option<Timestamp>,
        loaded: Option<Timestamp>,
    },

    /// All mandatory fields which were missing, including those of child rows.
    #[error("{doctype} {name}: value missing for {}", .fields.join(", "))]
    Mandatory {
        doctype: String,
        name: String,
        fields: Vec<String>,
    },

    #[error("{doctype} {name}: can not change docstatus from {from} to {to}")]
    DocstatusTransition {
        doctype: String,
        name: String,
        from: DocStatus,
        to: DocStatus,
    },

    #[error("{doctype}: not allowed to change {}", .fields.join(", "))]
    CannotChangeConstant { doctype: String, fields: Vec<String> },

    #[error("{doctype}: could not find {}", .links.join(", "))]
    LinkValidation { doctype: String, links: Vec<String> },

    #[error("{doctype}: can not link cancelled documents {}", .links.join(", "))]
    CancelledLink { doctype: String, links: Vec<String> },

    /// Another active document links to this one.
    #[error("{doctype} {name} is linked with {linked_doctype} {linked_name}")]
    LinkExists {
        doctype: String,
        name: String,
        linked_doctype: String,
        linked_name: String,
    },

    #[error("{doctype}: negative value not allowed for {}", .fields.join(", "))]
    NonNegative { doctype: String, fields: Vec<String> },

    #[error("field '{fieldname}' of {doctype} is read-only")]
    ReadOnlyField { doctype: String, fieldname: String },

    #[error("{doctype} has no field '{fieldname}'")]
    UnknownField { doctype: String, fieldname: String },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("{doctype}: workflow transition from '{from}' to '{to}' is not allowed")]
    WorkflowTransition {
        doctype: String,
        from: String,
        to: String,
    },

    /// Document is locked by a queued action.
    #[error("{doctype} {name} is locked and queued for execution, please try again later")]
    DocumentLocked { doctype: String, name: String },

    #[error("{doctype} has no remote method '{method}'")]
    UnknownMethod { doctype: String, method: String },

    #[error("{0}")]
    Validation(String),

    /// Controller or handler failed.
    #[error("{event} hook of {doctype} failed: {source}")]
    Hook {
        event: DocEvent,
        doctype: String,
        #[source]
        source: HookError,
    },

    #[error("store error: {0}")]
    Store(Box<dyn Error + Send + Sync>),

    #[error(transparent)]
    Value(#[from] DocumentBuildError),

    /// Accessing a lock file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub(crate) fn store(err: impl Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentError::Permission { .. } | DocumentError::FieldPermission { .. } => {
                ErrorKind::Permission
            }
            DocumentError::NotFound { .. }
            | DocumentError::Meta(_)
            | DocumentError::UnknownMethod { .. } => ErrorKind::DoesNotExist,
            DocumentError::DuplicateEntry { .. } => ErrorKind::DuplicateEntry,
            DocumentError::TimestampMismatch { .. } => ErrorKind::TimestampMismatch,
            DocumentError::Mandatory { .. } => ErrorKind::Mandatory,
            DocumentError::DocstatusTransition { .. } => ErrorKind::DocstatusTransition,
            DocumentError::CannotChangeConstant { .. } => ErrorKind::CannotChangeConstant,
            DocumentError::LinkValidation { .. } => ErrorKind::LinkValidation,
            DocumentError::CancelledLink { .. } => ErrorKind::CancelledLink,
            DocumentError::LinkExists { .. } => ErrorKind::LinkExists,
            DocumentError::NonNegative { .. } => ErrorKind::NonNegative,
            DocumentError::ReadOnlyField { .. } => ErrorKind::ReadOnlyField,
            DocumentError::UnknownField { .. } => ErrorKind::UnknownField,
            DocumentError::InvalidName(_) => ErrorKind::InvalidName,
            DocumentError::WorkflowTransition { .. } => ErrorKind::WorkflowTransition,
            DocumentError::DocumentLocked { .. } => ErrorKind::DocumentLocked,
            DocumentError::Validation(_) | DocumentError::Value(_) => ErrorKind::Validation,
            DocumentError::Hook { source, .. } => match source {
                HookError::Validation(_) => ErrorKind::Validation,
                HookError::Permission(_) => ErrorKind::Permission,
                HookError::Other(_) => ErrorKind::Internal,
            },
            DocumentError::Store(_) | DocumentError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Status code the HTTP layer answers with for this error.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}

/// Externally observable class of a `DocumentError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Permission,
    DoesNotExist,
    DuplicateEntry,
    TimestampMismatch,
    Mandatory,
    DocstatusTransition,
    CannotChangeConstant,
    LinkValidation,
    CancelledLink,
    LinkExists,
    NonNegative,
    ReadOnlyField,
    UnknownField,
    InvalidName,
    WorkflowTransition,
    DocumentLocked,
    Validation,
    Internal,
}

impl ErrorKind {
    /// Stable exception name of this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Permission => "PermissionError",
            ErrorKind::DoesNotExist => "DoesNotExistError",
            ErrorKind::DuplicateEntry => "DuplicateEntryError",
            ErrorKind::TimestampMismatch => "TimestampMismatchError",
            ErrorKind::Mandatory => "MandatoryError",
            ErrorKind::DocstatusTransition => "DocstatusTransitionError",
            ErrorKind::CannotChangeConstant => "CannotChangeConstantError",
            ErrorKind::LinkValidation => "LinkValidationError",
            ErrorKind::CancelledLink => "CancelledLinkError",
            ErrorKind::LinkExists => "LinkExistsError",
            ErrorKind::NonNegative => "NonNegativeError",
            ErrorKind::ReadOnlyField => "ReadOnlyFieldError",
            ErrorKind::UnknownField => "UnknownFieldError",
            ErrorKind::InvalidName => "InvalidNameError",
            ErrorKind::WorkflowTransition => "WorkflowTransitionError",
            ErrorKind::DocumentLocked => "DocumentLockedError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Internal => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Permission => 403,
            ErrorKind::DoesNotExist => 404,
            ErrorKind::ReadOnlyField => 405,
            ErrorKind::DuplicateEntry => 409,
            ErrorKind::DocumentLocked => 423,
            ErrorKind::Internal => 500,
            _ => 417,
        }
    }
}

/// Failure raised by a controller or registered handler.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Permission(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Converts store errors into `DocumentError`.
pub(crate) trait StoreResultExt<T> {
    fn or_store_err(self) -> Result<T, DocumentError>;
}

impl<T, E> StoreResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn or_store_err(self) -> Result<T, DocumentError> {
        self.map_err(DocumentError::store)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{DocumentError, ErrorKind, HookError};
    use crate::hooks::DocEvent;

    #[test]
    fn distinct_kinds_and_statuses() {
        let errors = [
            DocumentError::NotFound {
                doctype: "Item".into(),
                name: "X".into(),
            },
            DocumentError::DuplicateEntry {
                doctype: "Item".into(),
                name: "X".into(),
            },
            DocumentError::Mandatory {
                doctype: "Item".into(),
                name: "X".into(),
                fields: vec!["item_code".into(), "qty".into()],
            },
            DocumentError::ReadOnlyField {
                doctype: "Item".into(),
                fieldname: "stock_uom".into(),
            },
            DocumentError::DocumentLocked {
                doctype: "Item".into(),
                name: "X".into(),
            },
        ];
        let kinds: HashSet<&str> = errors.iter().map(|err| err.kind().as_str()).collect();
        assert_eq!(kinds.len(), errors.len());

        let statuses: Vec<u16> = errors.iter().map(DocumentError::http_status).collect();
        assert_eq!(statuses, vec![404, 409, 417, 405, 423]);

        assert_eq!(
            errors[2].to_string(),
            "Item X: value missing for item_code, qty"
        );
    }

    #[test]
    fn hook_errors_keep_their_class() {
        let err = DocumentError::Hook {
            event: DocEvent::Validate,
            doctype: "Item".into(),
            source: HookError::Permission("no".into()),
        };
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.http_status(), 403);

        let err = DocumentError::Hook {
            event: DocEvent::OnUpdate,
            doctype: "Item".into(),
            source: HookError::Other(anyhow::anyhow!("boom")),
        };
        assert_eq!(err.http_status(), 500);
    }
}
