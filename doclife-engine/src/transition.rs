// SPDX-License-Identifier: MIT OR Apache-2.0

//! Docstatus state machine.
use std::fmt;

use doclife_core::{DocStatus, PermType};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Lifecycle action resolved from the stored and the requested docstatus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Save,
    Submit,
    Cancel,
    UpdateAfterSubmit,
}

impl Action {
    /// Capability the actor needs to perform this action.
    pub fn required_permission(&self) -> PermType {
        match self {
            Action::Save => PermType::Write,
            Action::Submit | Action::UpdateAfterSubmit => PermType::Submit,
            Action::Cancel => PermType::Cancel,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Save => "save",
            Action::Submit => "submit",
            Action::Cancel => "cancel",
            Action::UpdateAfterSubmit => "update_after_submit",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve the action for moving a stored document from `stored` to `requested`.
///
/// `stored` is `None` for documents which are inserted, only `Draft` and `Submitted` are legal
/// starting points then.
pub fn resolve_action(
    doctype: &str,
    name: &str,
    stored: Option<DocStatus>,
    requested: DocStatus,
) -> Result<Action, DocumentError> {
    let from = stored.unwrap_or(DocStatus::Draft);
    let action = match (stored, requested) {
        (None, DocStatus::Draft) => Some(Action::Save),
        (None, DocStatus::Submitted) => Some(Action::Submit),
        (Some(DocStatus::Draft), DocStatus::Draft) => Some(Action::Save),
        (Some(DocStatus::Draft), DocStatus::Submitted) => Some(Action::Submit),
        (Some(DocStatus::Submitted), DocStatus::Submitted) => Some(Action::UpdateAfterSubmit),
        (Some(DocStatus::Submitted), DocStatus::Cancelled) => Some(Action::Cancel),
        _ => None,
    };
    action.ok_or_else(|| DocumentError::DocstatusTransition {
        doctype: doctype.to_owned(),
        name: name.to_owned(),
        from,
        to: requested,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use doclife_core::{DocStatus, PermType};

    use crate::error::DocumentError;

    use super::{Action, resolve_action};

    #[test]
    fn transition_table() {
        let legal = [
            (DocStatus::Draft, DocStatus::Draft, Action::Save, PermType::Write),
            (DocStatus::Draft, DocStatus::Submitted, Action::Submit, PermType::Submit),
            (
                DocStatus::Submitted,
                DocStatus::Submitted,
                Action::UpdateAfterSubmit,
                PermType::Submit,
            ),
            (DocStatus::Submitted, DocStatus::Cancelled, Action::Cancel, PermType::Cancel),
        ];
        for (stored, requested, action, ptype) in legal {
            let resolved = resolve_action("Sales Order", "SO-1", Some(stored), requested).unwrap();
            assert_eq!(resolved, action);
            assert_eq!(resolved.required_permission(), ptype);
        }

        let illegal = [
            (DocStatus::Draft, DocStatus::Cancelled),
            (DocStatus::Submitted, DocStatus::Draft),
            (DocStatus::Cancelled, DocStatus::Draft),
            (DocStatus::Cancelled, DocStatus::Submitted),
            (DocStatus::Cancelled, DocStatus::Cancelled),
        ];
        for (stored, requested) in illegal {
            assert_matches!(
                resolve_action("Sales Order", "SO-1", Some(stored), requested),
                Err(DocumentError::DocstatusTransition { from, to, .. })
                    if from == stored && to == requested
            );
        }
    }

    #[test]
    fn insert_transitions() {
        assert_eq!(
            resolve_action("Sales Order", "", None, DocStatus::Draft).unwrap(),
            Action::Save
        );
        assert_eq!(
            resolve_action("Sales Order", "", None, DocStatus::Submitted).unwrap(),
            Action::Submit
        );
        assert!(resolve_action("Sales Order", "", None, DocStatus::Cancelled).is_err());
    }
}
