// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic concurrency control of saves.
use doclife_core::Document;
use tracing::warn;

use crate::error::DocumentError;
use crate::transition::{Action, resolve_action};

/// Check that `doc` was loaded from the stored version and resolve the action of saving it.
///
/// The docstatus transition is checked first. The `modified` timestamp the document was loaded
/// with needs to match the stored one, otherwise someone else saved it in the meantime.
pub fn check_if_latest(stored: &Document, doc: &Document) -> Result<Action, DocumentError> {
    let action = resolve_action(
        &doc.doctype,
        doc.name(),
        Some(stored.docstatus),
        doc.docstatus,
    )?;

    let loaded = doc.loaded_modified();
    if stored.modified != loaded {
        warn!(
            doctype = %doc.doctype,
            name = doc.name(),
            stored = ?stored.modified,
            loaded = ?loaded,
            "document was modified concurrently"
        );
        return Err(DocumentError::TimestampMismatch {
            doctype: doc.doctype.clone(),
            name: doc.name().to_owned(),
            stored: stored.modified,
            loaded,
        });
    }
    Ok(action)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use doclife_core::{DocStatus, Document, Timestamp};

    use crate::error::DocumentError;
    use crate::transition::Action;

    use super::check_if_latest;

    fn stored(modified: u64, docstatus: DocStatus) -> Document {
        let mut doc = Document::new("Sales Order");
        doc.name = Some("SO-0001".into());
        doc.docstatus = docstatus;
        doc.modified = Some(Timestamp::from_micros(modified));
        doc.mark_persisted();
        doc
    }

    #[test]
    fn matching_timestamps() {
        let before = stored(10, DocStatus::Draft);
        let mut doc = before.clone();
        doc.set("customer", "ACME");
        assert_eq!(check_if_latest(&before, &doc).unwrap(), Action::Save);

        doc.docstatus = DocStatus::Submitted;
        assert_eq!(check_if_latest(&before, &doc).unwrap(), Action::Submit);
    }

    #[test]
    fn stale_copy_is_refused() {
        let loaded = stored(10, DocStatus::Draft);
        let before = stored(20, DocStatus::Draft);
        assert_matches!(
            check_if_latest(&before, &loaded),
            Err(DocumentError::TimestampMismatch { stored: Some(_), loaded: Some(_), .. })
        );
    }

    #[test]
    fn transition_is_checked_first() {
        let loaded = stored(10, DocStatus::Cancelled);
        let before = stored(20, DocStatus::Cancelled);
        assert_matches!(
            check_if_latest(&before, &loaded),
            Err(DocumentError::DocstatusTransition { .. })
        );
    }
}
